//! Crate-wide error taxonomy.
//!
//! Only the failures that are fatal at init (§7: Configuration, Enumeration,
//! NoDevices) or that prevent a parser from ever running (a bad regex) show
//! up here. Per-device I/O failures and log-read failures are *not*
//! represented as `Error` variants — they are non-fatal and surface as
//! FAILURE notifications instead (see [`crate::notification`]).

use std::io;

use snafu::Snafu;

#[derive(Snafu, Debug)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// invalid configuration: {detail}
    Configuration { detail: String },

    /// failed to enumerate PCI devices
    Enumeration { source: io::Error },

    /// device enumeration and preprocessing yielded zero PCIe devices
    NoDevices,

    /// pattern "{name}" has an invalid regular expression
    Pattern { name: String, source: regex::Error },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
