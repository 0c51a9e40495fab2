//! Device record and snapshot state (spec §3).

use crate::bdf::Bdf;

/// The three last-seen register snapshots for one device, initialized to
/// zero and mutated only by the Status Differ after a successful read
/// sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceSnapshot {
    pub device_status: u16,
    pub uncorrectable_errors: u32,
    pub correctable_errors: u32,
}

/// A device that survived preprocessing: identity plus capability offsets
/// and the snapshot state the differ reads and writes each poll.
///
/// `cap_exp` is never `None` for a record that made it past preprocessing
/// (spec Invariant 1) — [`crate::Monitor::init`] is the only place that
/// constructs one, and it only does so after [`crate::capability::find_pci_express_capability`]
/// succeeds.
#[derive(Debug, Clone)]
pub struct DeviceRecord {
    pub bdf: Bdf,
    pub cap_exp: u16,
    pub ecap_aer: Option<u16>,
    pub snapshot: DeviceSnapshot,
}

impl DeviceRecord {
    pub fn new(bdf: Bdf, cap_exp: u16, ecap_aer: Option<u16>) -> Self {
        Self {
            bdf,
            cap_exp,
            ecap_aer,
            snapshot: DeviceSnapshot::default(),
        }
    }
}
