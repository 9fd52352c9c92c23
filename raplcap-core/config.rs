use std::path::PathBuf;

/// Environment variable carrying the read-only access hint
pub const ENV_RAPLCAP_READ_ONLY: &str = "RAPLCAP_READ_ONLY";

/// Default sysfs directory describing CPU topology
pub const DEFAULT_SYSFS_CPU_ROOT: &str = "/sys/devices/system/cpu";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory holding `<cpu>/msr_safe` and `<cpu>/msr`
    pub device_root: PathBuf,
    /// Directory holding `online` and `cpu<N>/topology/`
    pub sysfs_cpu_root: PathBuf,
    /// Open devices without write access
    pub read_only: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device_root: PathBuf::from(raplcap_raw::msr::DEFAULT_DEVICE_ROOT),
            sysfs_cpu_root: PathBuf::from(DEFAULT_SYSFS_CPU_ROOT),
            read_only: false,
        }
    }
}

impl Config {
    /// Default paths, with the read-only hint taken from the environment
    pub fn from_env() -> Self {
        let read_only = std::env::var(ENV_RAPLCAP_READ_ONLY)
            .map(|v| Self::parse_flag(&v))
            .unwrap_or(false);
        if read_only {
            tracing::debug!("Read-only access requested via {}", ENV_RAPLCAP_READ_ONLY);
        }

        Self {
            read_only,
            ..Self::default()
        }
    }

    /// Interpret a flag value; any non-zero integer or "true" enables it
    fn parse_flag(s: &str) -> bool {
        let s = s.trim();
        match s.parse::<i64>() {
            Ok(n) => n != 0,
            Err(_) => s.eq_ignore_ascii_case("true"),
        }
    }

    pub fn with_device_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.device_root = root.into();
        self
    }

    pub fn with_sysfs_cpu_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.sysfs_cpu_root = root.into();
        self
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.device_root, PathBuf::from("/dev/cpu"));
        assert_eq!(config.sysfs_cpu_root, PathBuf::from("/sys/devices/system/cpu"));
        assert!(!config.read_only);
    }

    #[test]
    fn test_parse_flag() {
        assert!(Config::parse_flag("1"));
        assert!(Config::parse_flag(" 2\n"));
        assert!(Config::parse_flag("TRUE"));
        assert!(!Config::parse_flag("0"));
        assert!(!Config::parse_flag(""));
        assert!(!Config::parse_flag("yes please"));
    }

    #[test]
    fn test_builders() {
        let config = Config::default()
            .with_device_root("/tmp/dev")
            .with_sysfs_cpu_root("/tmp/sys")
            .with_read_only(true);
        assert_eq!(config.device_root, PathBuf::from("/tmp/dev"));
        assert_eq!(config.sysfs_cpu_root, PathBuf::from("/tmp/sys"));
        assert!(config.read_only);
    }
}
