//! The wire contract emitted notifications honor (spec §6).

use std::time::SystemTime;

use displaydoc::Display as DisplayDoc;

/// How bad a notification is.
#[derive(DisplayDoc, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// OKAY
    Okay,
    /// WARNING
    Warning,
    /// FAILURE
    Failure,
}

/// The `type_instance` slot of the wire contract.
#[derive(DisplayDoc, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeInstance {
    /// correctable
    Correctable,
    /// non_fatal
    NonFatal,
    /// fatal
    Fatal,
}

/// One notification, ready for the host's sink.
///
/// `plugin` and `type_` are fixed for this whole crate; `host` is supplied
/// by the host at [`crate::Monitor::init`] time since host-name discovery is
/// an out-of-scope collaborator (spec §1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub host: String,
    pub plugin: &'static str,
    pub type_: &'static str,
    pub plugin_instance: String,
    pub type_instance: TypeInstance,
    pub severity: Severity,
    pub message: String,
    pub time: SystemTime,
    pub annotations: Vec<(String, String)>,
}

impl Notification {
    pub(crate) fn new(
        host: impl Into<String>,
        plugin_instance: impl Into<String>,
        type_instance: TypeInstance,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            plugin: "pcie_errors",
            type_: "pcie_error",
            plugin_instance: plugin_instance.into(),
            type_instance,
            severity,
            message: message.into(),
            time: SystemTime::now(),
            annotations: Vec::new(),
        }
    }

    pub(crate) fn with_annotation(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.annotations.push((key.into(), value.into()));
        self
    }
}
