//! `/sys/bus/pci` backend.

use std::fs::{File, OpenOptions};
use std::path::PathBuf;

use snafu::ResultExt;

use crate::access::{Backend, DeviceHandle};
use crate::bdf::Bdf;
use crate::error::{Error, EnumerationSnafu};

pub const DEFAULT_ACCESS_DIR: &str = "/sys/bus/pci";

pub struct SysfsBackend {
    access_dir: PathBuf,
}

impl SysfsBackend {
    pub fn new(access_dir: Option<PathBuf>) -> Self {
        Self {
            access_dir: access_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_ACCESS_DIR)),
        }
    }

    fn devices_dir(&self) -> PathBuf {
        self.access_dir.join("devices")
    }
}

impl Backend for SysfsBackend {
    fn enumerate(&self) -> Result<Vec<Bdf>, Error> {
        let dir = self.devices_dir();
        let entries = std::fs::read_dir(&dir).context(EnumerationSnafu)?;
        let mut devices = Vec::new();
        for entry in entries {
            let entry = entry.context(EnumerationSnafu)?;
            let name = entry.file_name();
            let name = match name.to_str() {
                Some(n) => n,
                None => continue,
            };
            if name.starts_with('.') {
                continue;
            }
            match name.parse::<Bdf>() {
                Ok(bdf) => devices.push(bdf),
                Err(_) => {
                    log::debug!("sysfs: skipping non-BDF entry {name}");
                }
            }
        }
        Ok(devices)
    }

    fn open(&self, bdf: Bdf) -> std::io::Result<DeviceHandle> {
        let path = self.devices_dir().join(bdf.to_string()).join("config");
        let file: File = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(DeviceHandle::new(file))
    }
}
