//! MSR (Model-Specific Register) read/write primitives
//!
//! Registers are accessed through the Linux `msr` (or `msr_safe`) driver,
//! which exposes each register of a CPU as 8 bytes at the register's address
//! in `/dev/cpu/<cpu>/msr`. All access here is positioned (`pread`/`pwrite`),
//! so a single open file can serve any number of registers without sharing a
//! cursor. Opening and caching device handles is left to higher layers.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

pub type Result<T> = std::result::Result<T, MsrError>;

/// Default location of the per-CPU MSR device directories
pub const DEFAULT_DEVICE_ROOT: &str = "/dev/cpu";

/// Errors that can occur during MSR operations
#[derive(Debug, thiserror::Error)]
pub enum MsrError {
    #[error("Failed to open MSR device {path} for CPU {cpu}: {source}")]
    OpenFailed {
        cpu: u32,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read MSR 0x{msr:X} on CPU {cpu}: {source}")]
    ReadFailed {
        cpu: u32,
        msr: u64,
        source: std::io::Error,
    },

    #[error("Failed to write MSR 0x{msr:X} on CPU {cpu}: {source}")]
    WriteFailed {
        cpu: u32,
        msr: u64,
        source: std::io::Error,
    },
}

impl MsrError {
    /// The underlying I/O error
    pub fn io_error(&self) -> &std::io::Error {
        match self {
            MsrError::OpenFailed { source, .. }
            | MsrError::ReadFailed { source, .. }
            | MsrError::WriteFailed { source, .. } => source,
        }
    }

    /// OS error code of the underlying I/O error, if there is one
    pub fn raw_os_error(&self) -> Option<i32> {
        self.io_error().raw_os_error()
    }
}

/// Path of the `msr_safe` device for `cpu` under `root`
pub fn msr_safe_path(root: &Path, cpu: u32) -> PathBuf {
    root.join(cpu.to_string()).join("msr_safe")
}

/// Path of the standard `msr` device for `cpu` under `root`
pub fn msr_path(root: &Path, cpu: u32) -> PathBuf {
    root.join(cpu.to_string()).join("msr")
}

/// Open an MSR device file for `cpu`
///
/// Opens for reading and writing unless `read_only` is set.
pub fn open_msr_device(path: &Path, cpu: u32, read_only: bool) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(!read_only)
        .open(path)
        .map_err(|source| MsrError::OpenFailed {
            cpu,
            path: path.to_path_buf(),
            source,
        })
}

/// Read a 64-bit value from an MSR through an open device
///
/// # Arguments
///
/// * `file` - Open MSR device of `cpu`
/// * `cpu` - CPU the device belongs to, for error reporting
/// * `msr` - MSR address (e.g., 0x610 for MSR_PKG_POWER_LIMIT)
///
/// # Errors
///
/// Returns [`MsrError::ReadFailed`] if fewer than 8 bytes could be read.
/// The driver reports `EIO` for registers the CPU does not implement.
pub fn read_msr_at(file: &File, cpu: u32, msr: u64) -> Result<u64> {
    let mut buffer = [0u8; 8];
    file.read_exact_at(&mut buffer, msr)
        .map_err(|source| MsrError::ReadFailed { cpu, msr, source })?;
    let value = u64::from_ne_bytes(buffer);
    tracing::debug!("MSR read: CPU {} MSR 0x{:08x} = 0x{:016x}", cpu, msr, value);
    Ok(value)
}

/// Write a 64-bit value to an MSR through an open device
///
/// # Safety
///
/// Writing incorrect values to MSRs can cause system instability or crashes.
/// Callers should only modify documented fields of a freshly read value.
pub fn write_msr_at(file: &File, cpu: u32, msr: u64, value: u64) -> Result<()> {
    tracing::debug!("MSR write: CPU {} MSR 0x{:08x} = 0x{:016x}", cpu, msr, value);
    file.write_all_at(&value.to_ne_bytes(), msr)
        .map_err(|source| MsrError::WriteFailed { cpu, msr, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_device(dir: &Path) -> PathBuf {
        let path = dir.join("msr");
        let file = File::create(&path).unwrap();
        file.set_len(0x1000).unwrap();
        path
    }

    #[test]
    fn test_msr_error_display() {
        let err = MsrError::OpenFailed {
            cpu: 0,
            path: PathBuf::from("/dev/cpu/0/msr"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(err.to_string().contains("Failed to open MSR device /dev/cpu/0/msr"));

        let err = MsrError::ReadFailed {
            cpu: 1,
            msr: 0x610,
            source: std::io::Error::from_raw_os_error(libc::EIO),
        };
        assert!(err.to_string().contains("MSR 0x610 on CPU 1"));
        assert_eq!(err.raw_os_error(), Some(libc::EIO));
    }

    #[test]
    fn test_device_paths() {
        let root = Path::new(DEFAULT_DEVICE_ROOT);
        assert_eq!(msr_safe_path(root, 3), PathBuf::from("/dev/cpu/3/msr_safe"));
        assert_eq!(msr_path(root, 12), PathBuf::from("/dev/cpu/12/msr"));
    }

    #[test]
    fn test_positioned_read_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = fake_device(dir.path());
        let file = open_msr_device(&path, 0, false).unwrap();

        write_msr_at(&file, 0, 0x610, 0x00DC_8168_00D8_8140).unwrap();
        write_msr_at(&file, 0, 0x606, 0xA0E03).unwrap();

        assert_eq!(read_msr_at(&file, 0, 0x610).unwrap(), 0x00DC_8168_00D8_8140);
        assert_eq!(read_msr_at(&file, 0, 0x606).unwrap(), 0xA0E03);
        assert_eq!(read_msr_at(&file, 0, 0x638).unwrap(), 0);
    }

    #[test]
    fn test_read_past_end_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = fake_device(dir.path());
        let file = open_msr_device(&path, 2, false).unwrap();

        let err = read_msr_at(&file, 2, 0x2000).unwrap_err();
        assert!(matches!(err, MsrError::ReadFailed { cpu: 2, msr: 0x2000, .. }));
    }

    #[test]
    fn test_read_only_device_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = fake_device(dir.path());
        let file = open_msr_device(&path, 0, true).unwrap();

        assert_eq!(read_msr_at(&file, 0, 0x610).unwrap(), 0);
        assert!(matches!(
            write_msr_at(&file, 0, 0x610, 1),
            Err(MsrError::WriteFailed { .. })
        ));
    }

    #[test]
    fn test_open_missing_device() {
        let dir = tempfile::tempdir().unwrap();
        let err = open_msr_device(&dir.path().join("missing"), 4, false).unwrap_err();
        assert_eq!(err.io_error().kind(), std::io::ErrorKind::NotFound);
    }
}
