//! Device Poll Loop (spec §4.D): open each surviving device, snapshot,
//! diff, close, in device-list order. Sequential, no concurrency between
//! devices (spec §5).

use crate::access::{Backend, ConfigSpace};
use crate::device::DeviceRecord;
use crate::differ;
use crate::differ::StatusEvent;

/// `ecap_aer + 0x00` header words follow the extended-capability layout;
/// the status/mask/severity registers sit at these fixed offsets from the
/// capability base (spec §4.C).
const DEVICE_STATUS_OFFSET: u64 = 0x0a;
const UNCOR_STATUS_OFFSET: u64 = 0x04;
const UNCOR_MASK_OFFSET: u64 = 0x08;
const UNCOR_SEVERITY_OFFSET: u64 = 0x0c;
const COR_STATUS_OFFSET: u64 = 0x10;
const COR_MASK_OFFSET: u64 = 0x14;

fn read_u16(cfg: &dyn ConfigSpace, pos: u64) -> Option<u16> {
    let mut buf = [0u8; 2];
    cfg.read(&mut buf, pos).then(|| u16::from_le_bytes(buf))
}

fn read_u32(cfg: &dyn ConfigSpace, pos: u64) -> Option<u32> {
    let mut buf = [0u8; 4];
    cfg.read(&mut buf, pos).then(|| u32::from_le_bytes(buf))
}

/// Result of polling one device: the events it produced, in catalog order
/// (device-status pass, then uncorrectable, then correctable).
pub struct DevicePollResult {
    pub events: Vec<StatusEvent>,
}

/// Open `record`'s device, run the device-status pass and, if an AER
/// capability is present, the two AER passes, then close. Returns `None`
/// on open failure — the caller is responsible for the FAILURE
/// notification (spec §4.A).
pub fn poll_device(
    backend: &dyn Backend,
    record: &mut DeviceRecord,
    persistent: bool,
    report_masked: bool,
) -> Option<DevicePollResult> {
    let handle = match backend.open(record.bdf) {
        Ok(h) => h,
        Err(e) => {
            log::warn!("failed to open device {}: {e}", record.bdf);
            return None;
        }
    };

    let mut events = Vec::new();

    if let Some(new_raw) = read_u16(&handle, record.cap_exp as u64 + DEVICE_STATUS_OFFSET) {
        let (new_snapshot, mut device_events) =
            differ::diff_device_status(record.snapshot.device_status, new_raw, persistent);
        record.snapshot.device_status = new_snapshot;
        events.append(&mut device_events);
    }

    if let Some(ecap_aer) = record.ecap_aer {
        let base = ecap_aer as u64;
        if let Some(new) = read_u32(&handle, base + UNCOR_STATUS_OFFSET) {
            let old = record.snapshot.uncorrectable_errors;
            let skip_read = new == old && (!persistent || new == 0);
            let (mask, severity_reg) = if skip_read {
                (0, 0)
            } else {
                (
                    read_u32(&handle, base + UNCOR_MASK_OFFSET).unwrap_or(0),
                    read_u32(&handle, base + UNCOR_SEVERITY_OFFSET).unwrap_or(0),
                )
            };
            let mut uncor_events = differ::diff_uncorrectable(
                old,
                new,
                mask,
                severity_reg,
                persistent,
                report_masked,
            );
            record.snapshot.uncorrectable_errors = new;
            events.append(&mut uncor_events);
        }

        if let Some(new) = read_u32(&handle, base + COR_STATUS_OFFSET) {
            let old = record.snapshot.correctable_errors;
            let skip_read = new == old && (!persistent || new == 0);
            let mask = if skip_read {
                0
            } else {
                read_u32(&handle, base + COR_MASK_OFFSET).unwrap_or(0)
            };
            let mut cor_events =
                differ::diff_correctable(old, new, mask, persistent, report_masked);
            record.snapshot.correctable_errors = new;
            events.append(&mut cor_events);
        }
    }

    log::debug!("polled device {}: {} event(s)", record.bdf, events.len());
    Some(DevicePollResult { events })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::access::DeviceHandle;
    use crate::bdf::Bdf;
    use crate::differ::EventKind;

    struct FakeBackend {
        bytes: RefCell<HashMap<u64, u8>>,
        fail_open: bool,
    }

    impl FakeBackend {
        fn new() -> Self {
            Self {
                bytes: RefCell::new(HashMap::new()),
                fail_open: false,
            }
        }

        fn set_u16(&self, pos: u64, value: u16) {
            for (i, byte) in value.to_le_bytes().iter().enumerate() {
                self.bytes.borrow_mut().insert(pos + i as u64, *byte);
            }
        }
    }

    struct FakeConfigSpace<'a> {
        bytes: &'a RefCell<HashMap<u64, u8>>,
    }

    impl<'a> ConfigSpace for FakeConfigSpace<'a> {
        fn read(&self, buf: &mut [u8], pos: u64) -> bool {
            let bytes = self.bytes.borrow();
            for (i, slot) in buf.iter_mut().enumerate() {
                match bytes.get(&(pos + i as u64)) {
                    Some(b) => *slot = *b,
                    None => return false,
                }
            }
            true
        }
    }

    impl Backend for FakeBackend {
        fn enumerate(&self) -> Result<Vec<Bdf>, crate::error::Error> {
            Ok(Vec::new())
        }

        fn open(&self, _bdf: Bdf) -> std::io::Result<DeviceHandle> {
            if self.fail_open {
                Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no such device"))
            } else {
                unreachable!("tests use poll_device_with_cfg instead of the real open path")
            }
        }
    }

    /// `poll_device` needs a real `DeviceHandle`/file, which the fake
    /// backend can't produce; exercise the read-and-diff logic directly
    /// against a `ConfigSpace` instead, mirroring what `poll_device` does
    /// internally once `open` succeeds.
    fn poll_with_cfg(
        cfg: &dyn ConfigSpace,
        record: &mut DeviceRecord,
        persistent: bool,
        report_masked: bool,
    ) -> Vec<StatusEvent> {
        let mut events = Vec::new();
        if let Some(new_raw) = read_u16(cfg, record.cap_exp as u64 + DEVICE_STATUS_OFFSET) {
            let (new_snapshot, mut device_events) =
                differ::diff_device_status(record.snapshot.device_status, new_raw, persistent);
            record.snapshot.device_status = new_snapshot;
            events.append(&mut device_events);
        }
        if let Some(ecap_aer) = record.ecap_aer {
            let base = ecap_aer as u64;
            if let Some(new) = read_u32(cfg, base + UNCOR_STATUS_OFFSET) {
                let old = record.snapshot.uncorrectable_errors;
                let mask = read_u32(cfg, base + UNCOR_MASK_OFFSET).unwrap_or(0);
                let severity_reg = read_u32(cfg, base + UNCOR_SEVERITY_OFFSET).unwrap_or(0);
                events.append(&mut differ::diff_uncorrectable(
                    old,
                    new,
                    mask,
                    severity_reg,
                    persistent,
                    report_masked,
                ));
                record.snapshot.uncorrectable_errors = new;
            }
            if let Some(new) = read_u32(cfg, base + COR_STATUS_OFFSET) {
                let old = record.snapshot.correctable_errors;
                let mask = read_u32(cfg, base + COR_MASK_OFFSET).unwrap_or(0);
                events.append(&mut differ::diff_correctable(
                    old,
                    new,
                    mask,
                    persistent,
                    report_masked,
                ));
                record.snapshot.correctable_errors = new;
            }
        }
        events
    }

    #[test]
    fn device_status_pass_runs_without_aer_capability() {
        let backend = FakeBackend::new();
        backend.set_u16(0x40 + DEVICE_STATUS_OFFSET, 0x0001);
        let cfg = FakeConfigSpace {
            bytes: &backend.bytes,
        };
        let mut record = DeviceRecord::new(Bdf::new(0, 1, 0, 0), 0x40, None);
        let events = poll_with_cfg(&cfg, &mut record, false, false);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Set);
        assert_eq!(record.snapshot.device_status, 0x0001);
    }

    #[test]
    fn open_failure_is_reported_to_caller() {
        let backend = FakeBackend {
            bytes: RefCell::new(HashMap::new()),
            fail_open: true,
        };
        let mut record = DeviceRecord::new(Bdf::new(0, 1, 0, 0), 0x40, None);
        let result = poll_device(&backend, &mut record, false, false);
        assert!(result.is_none());
    }
}
