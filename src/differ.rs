//! The Status Differ (spec §4.C): turns raw register snapshots into
//! set/cleared events. Pure functions, no I/O — the poll loop (§4.D) is the
//! only caller and owns the actual register reads.

use crate::catalog::{CorrectableErrorBit, DeviceStatusBit, UncorrectableErrorBit};
use crate::notification::{Severity, TypeInstance};

/// Device Status register mask: only the low 4 bits are meaningful.
pub const DEVICE_STATUS_MASK: u16 = 0x000f;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Set,
    Cleared,
}

/// Which register produced the event — used by the poll loop to phrase
/// the notification message (spec §8 S1/S3 give literal examples per
/// pass).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    DeviceStatus,
    Uncorrectable,
    Correctable,
}

/// One set/cleared transition, ready to be turned into a [crate::Notification].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub descriptor: String,
    pub kind: EventKind,
    pub type_instance: TypeInstance,
    pub severity: Severity,
    pub pass: Pass,
}

fn severity_for_device_status(bit: DeviceStatusBit) -> (Severity, TypeInstance) {
    match bit {
        DeviceStatusBit::FatalErrorDetected => (Severity::Failure, TypeInstance::Fatal),
        DeviceStatusBit::NonFatalErrorDetected => (Severity::Warning, TypeInstance::NonFatal),
        DeviceStatusBit::CorrectableErrorDetected => (Severity::Warning, TypeInstance::Correctable),
        DeviceStatusBit::UnsupportedRequestDetected => (Severity::Warning, TypeInstance::NonFatal),
    }
}

/// Diff the Device Status register. Returns the masked new value (the
/// caller stores this as the next snapshot) plus any events.
pub fn diff_device_status(old: u16, new_raw: u16, persistent: bool) -> (u16, Vec<StatusEvent>) {
    let new = new_raw & DEVICE_STATUS_MASK;
    let mut events = Vec::new();

    let skip = new == old && (!persistent || new == 0);
    if !skip {
        for bit in DeviceStatusBit::ORDER {
            let mask = bit.bit_mask();
            let set_in_new = new & mask != 0;
            let set_in_old = old & mask != 0;
            let (severity, type_instance) = severity_for_device_status(bit);
            if set_in_new && (persistent || !set_in_old) {
                events.push(StatusEvent {
                    descriptor: bit.to_string(),
                    kind: EventKind::Set,
                    type_instance,
                    severity,
                    pass: Pass::DeviceStatus,
                });
            } else if !set_in_new && set_in_old {
                events.push(StatusEvent {
                    descriptor: bit.to_string(),
                    kind: EventKind::Cleared,
                    type_instance,
                    severity: Severity::Okay,
                    pass: Pass::DeviceStatus,
                });
            }
        }
    }

    (new, events)
}

/// Diff the AER Uncorrectable Error Status register.
pub fn diff_uncorrectable(
    old: u32,
    new: u32,
    mask: u32,
    severity_reg: u32,
    persistent: bool,
    report_masked: bool,
) -> Vec<StatusEvent> {
    let mut events = Vec::new();

    let skip = new == old && (!persistent || new == 0);
    if skip {
        return events;
    }

    for bit in UncorrectableErrorBit::ORDER {
        let bm = bit.bit_mask();
        if mask & bm != 0 && !report_masked {
            continue;
        }
        let set_in_new = new & bm != 0;
        let set_in_old = old & bm != 0;
        if set_in_new && (persistent || !set_in_old) {
            let severity = if severity_reg & bm != 0 {
                Severity::Failure
            } else {
                Severity::Warning
            };
            let type_instance = if severity_reg & bm != 0 {
                TypeInstance::Fatal
            } else {
                TypeInstance::NonFatal
            };
            events.push(StatusEvent {
                descriptor: bit.to_string(),
                kind: EventKind::Set,
                type_instance,
                severity,
                pass: Pass::Uncorrectable,
            });
        } else if !set_in_new && set_in_old {
            events.push(StatusEvent {
                descriptor: bit.to_string(),
                kind: EventKind::Cleared,
                type_instance: TypeInstance::NonFatal,
                severity: Severity::Okay,
                pass: Pass::Uncorrectable,
            });
        }
    }

    events
}

/// Diff the AER Correctable Error Status register. No severity register:
/// every SET is a WARNING tagged `correctable`.
pub fn diff_correctable(old: u32, new: u32, mask: u32, persistent: bool, report_masked: bool) -> Vec<StatusEvent> {
    let mut events = Vec::new();

    let skip = new == old && (!persistent || new == 0);
    if skip {
        return events;
    }

    for bit in CorrectableErrorBit::ORDER {
        let bm = bit.bit_mask();
        if mask & bm != 0 && !report_masked {
            continue;
        }
        let set_in_new = new & bm != 0;
        let set_in_old = old & bm != 0;
        if set_in_new && (persistent || !set_in_old) {
            events.push(StatusEvent {
                descriptor: bit.to_string(),
                kind: EventKind::Set,
                type_instance: TypeInstance::Correctable,
                severity: Severity::Warning,
                pass: Pass::Correctable,
            });
        } else if !set_in_new && set_in_old {
            events.push(StatusEvent {
                descriptor: bit.to_string(),
                kind: EventKind::Cleared,
                type_instance: TypeInstance::Correctable,
                severity: Severity::Okay,
                pass: Pass::Correctable,
            });
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn s1_correctable_set_then_clear_default_mode() {
        let (snap1, events1) = diff_device_status(0, 0x0001, false);
        assert_eq!(snap1, 0x0001);
        assert_eq!(events1.len(), 1);
        assert_eq!(events1[0].kind, EventKind::Set);
        assert_eq!(events1[0].descriptor, "Correctable Error");
        assert_eq!(events1[0].type_instance, TypeInstance::Correctable);
        assert_eq!(events1[0].severity, Severity::Warning);

        let (snap2, events2) = diff_device_status(snap1, 0x0000, false);
        assert_eq!(snap2, 0x0000);
        assert_eq!(events2.len(), 1);
        assert_eq!(events2[0].kind, EventKind::Cleared);
        assert_eq!(events2[0].severity, Severity::Okay);
    }

    #[test]
    fn s2_persistent_repeat() {
        let (snap1, events1) = diff_device_status(0, 0x0004, true);
        assert_eq!(events1.len(), 1);
        assert_eq!(events1[0].kind, EventKind::Set);
        assert_eq!(events1[0].type_instance, TypeInstance::Fatal);
        assert_eq!(events1[0].severity, Severity::Failure);

        let (_snap2, events2) = diff_device_status(snap1, 0x0004, true);
        assert_eq!(events2.len(), 1);
        assert_eq!(events2[0].kind, EventKind::Set);
    }

    #[test]
    fn identical_snapshots_emit_nothing_in_default_mode() {
        let (_new, events) = diff_device_status(0x0002, 0x0002, false);
        assert!(events.is_empty());
    }

    #[test]
    fn s3_masked_aer_is_suppressed_unless_report_masked() {
        let internal = UncorrectableErrorBit::Internal.bit_mask();
        let events = diff_uncorrectable(0, internal, internal, 0, false, false);
        assert!(events.is_empty());

        let events = diff_uncorrectable(0, internal, internal, 0, false, true);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].descriptor, "Uncorrectable Internal Error");
        assert_eq!(events[0].severity, Severity::Warning);
        assert_eq!(events[0].type_instance, TypeInstance::NonFatal);
    }

    #[test]
    fn uncorrectable_severity_register_selects_fatal() {
        let bit = UncorrectableErrorBit::Dlp.bit_mask();
        let events = diff_uncorrectable(0, bit, 0, bit, false, false);
        assert_eq!(events[0].severity, Severity::Failure);
        assert_eq!(events[0].type_instance, TypeInstance::Fatal);
    }

    #[test]
    fn cleared_is_always_edge_even_when_persistent() {
        let bit = CorrectableErrorBit::BadTlp.bit_mask();
        let events = diff_correctable(bit, 0, 0, true, false);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Cleared);
        assert_eq!(events[0].severity, Severity::Okay);
    }
}
