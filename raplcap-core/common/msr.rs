use std::fs::File;
use std::io::ErrorKind;
use std::os::unix::io::{AsRawFd, IntoRawFd};
use std::path::Path;

use raplcap_raw::msr::{msr_path, msr_safe_path, open_msr_device, read_msr_at, write_msr_at};

use crate::error::{RaplcapError, Result};

/// An open MSR device for one CPU, used for positioned register access
#[derive(Debug)]
pub struct MsrHandle {
    file: File,
    cpu_id: u32,
}

impl MsrHandle {
    /// Open the MSR device for `cpu`
    ///
    /// Tries the `msr_safe` driver first and falls back on the standard
    /// `msr` driver. Only one attempt is made per path.
    pub fn open(device_root: &Path, cpu: u32, read_only: bool) -> Result<Self> {
        let safe_path = msr_safe_path(device_root, cpu);
        let file = match open_msr_device(&safe_path, cpu, read_only) {
            Ok(file) => file,
            Err(e) => {
                tracing::debug!("{}", e);
                tracing::info!("msr-safe not available, falling back on standard msr");

                let path = msr_path(device_root, cpu);
                open_msr_device(&path, cpu, read_only).map_err(|e| {
                    tracing::error!("{}", e);
                    if e.io_error().kind() == ErrorKind::NotFound {
                        tracing::warn!("Is the msr kernel module loaded?");
                    }
                    RaplcapError::DeviceUnavailable { cpu, source: e }
                })?
            }
        };

        tracing::info!("Opened MSR handle {} for core {}", file.as_raw_fd(), cpu);

        Ok(Self { file, cpu_id: cpu })
    }

    pub fn read(&self, addr: u64) -> Result<u64> {
        read_msr_at(&self.file, self.cpu_id, addr).map_err(|e| {
            tracing::error!("{}", e);
            e.into()
        })
    }

    pub fn write(&self, addr: u64, value: u64) -> Result<()> {
        write_msr_at(&self.file, self.cpu_id, addr, value).map_err(|e| {
            tracing::error!("{}", e);
            e.into()
        })
    }

    /// Close the device, reporting errors that dropping would swallow
    pub fn close(self) -> Result<()> {
        let fd = self.file.into_raw_fd();
        tracing::debug!("Closing MSR handle {} for core {}", fd, self.cpu_id);
        nix::unistd::close(fd).map_err(|e| {
            tracing::error!("Failed to close MSR handle for core {}: {}", self.cpu_id, e);
            e.into()
        })
    }

    pub fn cpu_id(&self) -> u32 {
        self.cpu_id
    }
}
