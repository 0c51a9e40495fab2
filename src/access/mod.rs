//! Access Backend (spec §4.A): enumerate PCI devices and read config-space
//! bytes at arbitrary offsets, via either `/proc/bus/pci` or
//! `/sys/bus/pci`. Two interchangeable implementations, chosen once at
//! bootstrap — a capability object rather than a global vtable of function
//! pointers (Design Notes §9).

pub mod proc;
pub mod sysfs;

use std::fs::File;
use std::os::unix::fs::FileExt;

use crate::bdf::Bdf;
use crate::error::Error;

/// Enumerates devices and opens their config space.
pub trait Backend {
    fn enumerate(&self) -> Result<Vec<Bdf>, Error>;
    fn open(&self, bdf: Bdf) -> std::io::Result<DeviceHandle>;
}

/// Positional, seek-free reads of a device's (or log file's) config space /
/// contents. A short read, I/O error, or EOF is uniformly a failure; the
/// spec treats the unspecified buffer contents as zero, so callers that
/// care about the result check the `bool`, not `buf`.
pub trait ConfigSpace {
    fn read(&self, buf: &mut [u8], pos: u64) -> bool;
}

/// An open config-space file handle. Closed unconditionally on drop;
/// a close error is logged but never propagated (spec §4.A).
pub struct DeviceHandle {
    file: File,
}

impl DeviceHandle {
    pub(crate) fn new(file: File) -> Self {
        Self { file }
    }
}

impl ConfigSpace for DeviceHandle {
    fn read(&self, buf: &mut [u8], pos: u64) -> bool {
        self.file.read_exact_at(buf, pos).is_ok()
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        // File::drop already closes the fd; sync_all surfaces write-back
        // errors the way the original backends log (but never propagate) a
        // close failure.
        if let Err(e) = self.file.sync_all() {
            log::warn!("error finalizing device config-space handle: {e}");
        }
    }
}
