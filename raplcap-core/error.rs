use thiserror::Error;

use raplcap_raw::MsrError;

#[derive(Error, Debug)]
pub enum RaplcapError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("RAPL context is not initialized")]
    NotInitialized,

    #[error("Socket {socket} is outside range [0, {nsockets})")]
    InvalidSocket { socket: u32, nsockets: u32 },

    #[error("No usable MSR device for CPU {cpu}: {source}")]
    DeviceUnavailable { cpu: u32, source: MsrError },

    #[error("Topology discovery failed: {0}")]
    TopologyError(String),

    #[error("MSR operation failed: {0}")]
    Msr(#[from] MsrError),

    #[error("Nix error: {0}")]
    NixError(#[from] nix::Error),
}

impl RaplcapError {
    /// errno-style classification of this error
    ///
    /// Argument and state errors map to `EINVAL`, topology errors to
    /// `ENODEV`, and I/O failures to the OS error that caused them.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            RaplcapError::ConfigError(_)
            | RaplcapError::NotInitialized
            | RaplcapError::InvalidSocket { .. } => Some(libc::EINVAL),
            RaplcapError::TopologyError(_) => Some(libc::ENODEV),
            RaplcapError::DeviceUnavailable { source, .. } | RaplcapError::Msr(source) => {
                source.raw_os_error()
            }
            RaplcapError::NixError(e) => Some(*e as i32),
        }
    }

    /// Whether the hardware rejected the register access with `EIO`
    ///
    /// The msr driver reports `EIO` when a CPU does not implement the
    /// requested register, i.e. the power domain does not exist.
    pub fn is_no_such_domain(&self) -> bool {
        matches!(self, RaplcapError::Msr(_)) && self.raw_os_error() == Some(libc::EIO)
    }
}

pub type Result<T> = std::result::Result<T, RaplcapError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn read_error(errno: i32) -> RaplcapError {
        RaplcapError::Msr(MsrError::ReadFailed {
            cpu: 0,
            msr: 0x640,
            source: io::Error::from_raw_os_error(errno),
        })
    }

    #[test]
    fn test_classification() {
        assert_eq!(
            RaplcapError::ConfigError("Unknown zone: 9".into()).raw_os_error(),
            Some(libc::EINVAL)
        );
        assert_eq!(
            RaplcapError::InvalidSocket {
                socket: 2,
                nsockets: 1
            }
            .raw_os_error(),
            Some(libc::EINVAL)
        );
        assert_eq!(
            RaplcapError::TopologyError("no sockets".into()).raw_os_error(),
            Some(libc::ENODEV)
        );
        assert_eq!(read_error(libc::EACCES).raw_os_error(), Some(libc::EACCES));
        assert_eq!(
            RaplcapError::NixError(nix::Error::EBADF).raw_os_error(),
            Some(libc::EBADF)
        );
    }

    #[test]
    fn test_no_such_domain() {
        assert!(read_error(libc::EIO).is_no_such_domain());
        assert!(!read_error(libc::EACCES).is_no_such_domain());
        assert!(!RaplcapError::NotInitialized.is_no_such_domain());

        let unavailable = RaplcapError::DeviceUnavailable {
            cpu: 0,
            source: MsrError::OpenFailed {
                cpu: 0,
                path: "/dev/cpu/0/msr".into(),
                source: io::Error::from_raw_os_error(libc::EIO),
            },
        };
        assert!(!unavailable.is_no_such_domain());
    }

    #[test]
    fn test_display() {
        let err = RaplcapError::InvalidSocket {
            socket: 4,
            nsockets: 2,
        };
        assert_eq!(err.to_string(), "Socket 4 is outside range [0, 2)");

        // Close failures surface through nix
        let err = RaplcapError::from(nix::Error::EBADF);
        assert!(err.to_string().starts_with("Nix error: "));
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
    }
}
