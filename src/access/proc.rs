//! `/proc/bus/pci` backend.
//!
//! This backend has no domain information: every device is reported on
//! domain 0 (Design Notes §9, open question). A host with multiple domains
//! using this backend will see BDFs from different domains collide — that
//! is a preserved quirk of the original, not a bug introduced here.

use std::fs::{File, OpenOptions};
use std::path::PathBuf;

use snafu::ResultExt;

use crate::access::{Backend, DeviceHandle};
use crate::bdf::Bdf;
use crate::error::{Error, EnumerationSnafu};

pub const DEFAULT_ACCESS_DIR: &str = "/proc/bus/pci";

pub struct ProcBackend {
    access_dir: PathBuf,
}

impl ProcBackend {
    pub fn new(access_dir: Option<PathBuf>) -> Self {
        Self {
            access_dir: access_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_ACCESS_DIR)),
        }
    }

    fn devices_file(&self) -> PathBuf {
        self.access_dir.join("devices")
    }

    /// Decode the first whitespace-delimited hex token of a `devices` line
    /// into a BDF. High 8 bits of the 16-bit slot are the bus, bits 7..3 are
    /// the device, bits 2..0 are the function.
    fn parse_slot(token: &str) -> Option<Bdf> {
        let slot = u16::from_str_radix(token, 16).ok()?;
        let bus = (slot >> 8) as u8;
        let device = ((slot >> 3) & 0x1f) as u8;
        let function = (slot & 0x07) as u8;
        Some(Bdf::new(0, bus, device, function))
    }
}

impl Backend for ProcBackend {
    fn enumerate(&self) -> Result<Vec<Bdf>, Error> {
        let contents = std::fs::read_to_string(self.devices_file()).context(EnumerationSnafu)?;
        let mut devices = Vec::new();
        for line in contents.lines() {
            let Some(token) = line.split_whitespace().next() else {
                continue;
            };
            match Self::parse_slot(token) {
                Some(bdf) => devices.push(bdf),
                None => log::debug!("proc: skipping unparseable devices line {line:?}"),
            }
        }
        Ok(devices)
    }

    fn open(&self, bdf: Bdf) -> std::io::Result<DeviceHandle> {
        let path = self
            .access_dir
            .join(format!("{:02x}", bdf.bus))
            .join(format!("{:02x}.{:01x}", bdf.device, bdf.function));
        let file: File = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(DeviceHandle::new(file))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parse_slot_decodes_bus_device_function() {
        // bus=0x01, device=0x00, function=0x0 -> slot=0x0100
        assert_eq!(
            ProcBackend::parse_slot("0100").unwrap(),
            Bdf::new(0, 0x01, 0x00, 0x0)
        );
        // bus=0x02, device=0x03, function=0x1 -> slot = (0x02<<8)|(0x03<<3)|1 = 0x219
        assert_eq!(
            ProcBackend::parse_slot("0219").unwrap(),
            Bdf::new(0, 0x02, 0x03, 0x1)
        );
    }

    #[test]
    fn enumerate_reads_first_token_per_line() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("devices"),
            "0100\t8086\t1234\t0\t0\n0219\t8086\t5678\t0\t0\n",
        )
        .unwrap();
        let backend = ProcBackend::new(Some(dir.path().to_path_buf()));
        let devices = backend.enumerate().unwrap();
        assert_eq!(
            devices,
            vec![Bdf::new(0, 0x01, 0x00, 0x0), Bdf::new(0, 0x02, 0x03, 0x1)]
        );
    }
}
