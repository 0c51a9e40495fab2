//! Event Shaper (spec §4.F): turn one parsed log record into a
//! notification.

use crate::logparser::LogRecord;
use crate::notification::{Notification, Severity, TypeInstance};

const SEVERITY_FIELD: &str = "severity";
const DEVICE_FIELD: &str = "device";

/// Build the WARNING-or-FAILURE notification for one completed log
/// message. `host` and `plugin_instance` fall back to sensible defaults if
/// the record happens to omit the `device` field (an optional parser might
/// not define it at all).
pub fn shape(host: impl Into<String>, record: &LogRecord) -> Notification {
    let mut severity = Severity::Warning;
    let mut type_instance = TypeInstance::NonFatal;
    let mut plugin_instance = String::new();
    let mut annotations = Vec::new();

    for (name, value) in record {
        if name == SEVERITY_FIELD {
            let lower = value.to_lowercase();
            let is_non_fatal = lower.contains("non-fatal") || lower.contains("nonfatal");
            if is_non_fatal {
                type_instance = TypeInstance::NonFatal;
            } else if lower.contains("fatal") {
                severity = Severity::Failure;
                type_instance = TypeInstance::Fatal;
            } else {
                type_instance = TypeInstance::Correctable;
            }
            annotations.push((name.clone(), value.clone()));
        } else if name == DEVICE_FIELD {
            plugin_instance = value.clone();
        } else {
            annotations.push((name.clone(), value.clone()));
        }
    }

    let tag = match type_instance {
        TypeInstance::Fatal => "fatal",
        TypeInstance::NonFatal => "non_fatal",
        TypeInstance::Correctable => "correctable",
    };
    let message = format!("AER {tag} error reported in log");

    let mut notification = Notification::new(host, plugin_instance, type_instance, severity, message);
    for (key, value) in annotations {
        notification = notification.with_annotation(key, value);
    }
    notification
}
