//! PCIe hardware error monitoring core (spec §1-§2).
//!
//! This crate is the part of a PCIe-error monitoring plugin that a host
//! monitoring framework loads, schedules, and drains notifications from. It
//! owns two independent detectors:
//!
//! - Live polling of PCI Express device config space (capability walking +
//!   differential status, [`capability`]/[`differ`]/[`poll`]).
//! - Tail-like parsing of a kernel log for `pcieport` AER lines
//!   ([`logparser`]/[`shaper`]).
//!
//! [`Monitor`] is the single entry point: [`Monitor::init`] validates
//! configuration, enumerates devices and installs log parsers;
//! [`Monitor::poll`] runs one device pass and one log pass and returns
//! whatever notifications resulted. Everything else — scheduling, the
//! notification sink, host-name discovery, config-file lexing — is the
//! host's job (spec §1).

pub mod access;
pub mod bdf;
pub mod capability;
pub mod catalog;
pub mod config;
pub mod device;
pub mod differ;
pub mod error;
pub mod logparser;
pub mod notification;
pub mod poll;
pub mod shaper;

pub use bdf::Bdf;
pub use config::{Config, Source};
pub use error::Error;
pub use notification::Notification;

use snafu::ensure;

use access::proc::ProcBackend;
use access::sysfs::SysfsBackend;
use access::Backend;
use capability::{find_aer_extended_capability, find_pci_express_capability};
use device::DeviceRecord;
use differ::{EventKind, Pass, StatusEvent};
use error::NoDevicesSnafu;
use logparser::{Parser, ParserJob};
use notification::{Severity, TypeInstance};

/// The wired-up monitor: device list, parser jobs, and the policy flags
/// from [`Config`] that [`poll::poll_device`] and [`shaper::shape`] need on
/// every call.
///
/// Deliberately `Send` (every field is) but not `Sync` — the host is
/// expected to drive `poll` from one dedicated thread (spec §5); sharing a
/// `&Monitor` across threads would let two callers race a `poll()` the type
/// system has no other way to forbid.
pub struct Monitor {
    host: String,
    backend: Option<Box<dyn Backend>>,
    devices: Vec<DeviceRecord>,
    report_masked: bool,
    persistent_notifications: bool,
    parser_jobs: Vec<ParserJob>,
}

impl Monitor {
    /// Validate `config`, enumerate and preprocess devices if polling is
    /// enabled, and install parser jobs if log reading is enabled (spec
    /// §4.G). Any failure here is fatal at init, matching §7.
    pub fn init(config: Config) -> Result<Self, Error> {
        config.validate()?;

        let backend: Option<Box<dyn Backend>> = match config.source {
            Source::Sysfs => Some(Box::new(SysfsBackend::new(config.access_dir.clone()))),
            Source::Proc => Some(Box::new(ProcBackend::new(config.access_dir.clone()))),
            Source::Disabled => None,
        };

        let mut devices = Vec::new();
        if let Some(backend) = backend.as_deref() {
            let bdfs = backend.enumerate()?;
            for bdf in bdfs {
                let handle = match backend.open(bdf) {
                    Ok(h) => h,
                    Err(e) => {
                        log::warn!("preprocessing: failed to open {bdf}: {e}");
                        continue;
                    }
                };
                match find_pci_express_capability(&handle) {
                    Some(cap_exp) => {
                        let ecap_aer = find_aer_extended_capability(&handle);
                        log::debug!(
                            "{bdf}: cap_exp=0x{cap_exp:x} ecap_aer={:?}",
                            ecap_aer.map(|o| format!("0x{o:x}"))
                        );
                        devices.push(DeviceRecord::new(bdf, cap_exp, ecap_aer));
                    }
                    None => {
                        log::debug!("{bdf}: not a PCIe device, dropping");
                    }
                }
            }
            ensure!(!devices.is_empty(), NoDevicesSnafu);
        }

        let mut parser_jobs = Vec::new();
        if config.read_log {
            let specs = if config.parsers.is_empty() {
                vec![config::default_parser()]
            } else {
                config.parsers.clone()
            };
            for spec in &specs {
                let parser = Parser::compile(spec)?;
                parser_jobs.push(ParserJob::new(
                    config.log_file.clone(),
                    parser,
                    config.first_full_read,
                ));
            }
        }

        Ok(Self {
            host: config.host,
            backend,
            devices,
            report_masked: config.report_masked,
            persistent_notifications: config.persistent_notifications,
            parser_jobs,
        })
    }

    /// One poll cycle: the device pass, then the log pass (spec §5 — "no
    /// ordering is guaranteed ... beyond device first, then log"). Never
    /// fails; per-device and per-parser errors become FAILURE
    /// notifications instead of propagating.
    pub fn poll(&mut self) -> Vec<Notification> {
        let mut notifications = Vec::new();
        let host = self.host.clone();

        if let Some(backend) = self.backend.as_deref() {
            for record in &mut self.devices {
                let bdf = record.bdf;
                match poll::poll_device(
                    backend,
                    record,
                    self.persistent_notifications,
                    self.report_masked,
                ) {
                    Some(result) => {
                        for event in &result.events {
                            notifications.push(event_notification(&host, bdf, event));
                        }
                    }
                    None => {
                        notifications.push(Notification::new(
                            host.clone(),
                            bdf.to_string(),
                            TypeInstance::NonFatal,
                            Severity::Failure,
                            "Failed to read device status",
                        ));
                    }
                }
            }
        }

        for job in &mut self.parser_jobs {
            match job.poll() {
                Ok(records) => {
                    for record in &records {
                        notifications.push(shaper::shape(host.clone(), record));
                    }
                }
                Err(e) => {
                    log::warn!("parser \"{}\": failed to read log file: {e}", job.name());
                    notifications.push(Notification::new(
                        host.clone(),
                        String::new(),
                        TypeInstance::NonFatal,
                        Severity::Failure,
                        "Failed to read from log file",
                    ));
                }
            }
        }

        notifications
    }
}

fn event_notification(host: &str, bdf: Bdf, event: &StatusEvent) -> Notification {
    let verb = match event.kind {
        EventKind::Set => "set",
        EventKind::Cleared => "cleared",
    };
    let message = match event.pass {
        Pass::DeviceStatus => format!("Device Status Error {verb}: {}", event.descriptor),
        Pass::Uncorrectable => format!("Uncorrectable Error {verb}: {}", event.descriptor),
        Pass::Correctable => format!("Correctable Error {verb}: {}", event.descriptor),
    };
    Notification::new(
        host.to_string(),
        bdf.to_string(),
        event.type_instance,
        event.severity,
        message,
    )
}
