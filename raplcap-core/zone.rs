// Power zones and their register mapping

use std::fmt;
use std::str::FromStr;

use raplcap_raw::rapl::msr::*;

use crate::error::{RaplcapError, Result};

zone_table! {
    /// A RAPL power domain
    pub enum Zone {
        Package => ("PACKAGE", MSR_PKG_POWER_LIMIT, MSR_PKG_ENERGY_STATUS, true),
        Core => ("CORE", MSR_PP0_POWER_LIMIT, MSR_PP0_ENERGY_STATUS, false),
        Uncore => ("UNCORE", MSR_PP1_POWER_LIMIT, MSR_PP1_ENERGY_STATUS, false),
        Dram => ("DRAM", MSR_DRAM_POWER_LIMIT, MSR_DRAM_ENERGY_STATUS, false),
        Psys => ("PSYS", MSR_PLATFORM_POWER_LIMIT, MSR_PLATFORM_ENERGY_STATUS, true),
    }
}

impl Default for Zone {
    fn default() -> Self {
        Zone::Package
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<u32> for Zone {
    type Error = RaplcapError;

    fn try_from(value: u32) -> Result<Self> {
        Zone::all()
            .get(value as usize)
            .copied()
            .ok_or_else(|| RaplcapError::ConfigError(format!("Unknown zone: {value}")))
    }
}

impl FromStr for Zone {
    type Err = RaplcapError;

    fn from_str(s: &str) -> Result<Self> {
        Zone::all()
            .into_iter()
            .find(|zone| zone.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| RaplcapError::ConfigError(format!("Unknown zone: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_table() {
        assert_eq!(Zone::Package.power_limit_msr(), 0x610);
        assert_eq!(Zone::Core.power_limit_msr(), 0x638);
        assert_eq!(Zone::Uncore.power_limit_msr(), 0x640);
        assert_eq!(Zone::Dram.power_limit_msr(), 0x618);
        assert_eq!(Zone::Psys.power_limit_msr(), 0x65C);

        assert_eq!(Zone::Package.energy_status_msr(), 0x611);
        assert_eq!(Zone::Psys.energy_status_msr(), 0x64D);
    }

    #[test]
    fn test_short_term_support() {
        let short: Vec<Zone> = Zone::all()
            .into_iter()
            .filter(Zone::has_short_term)
            .collect();
        assert_eq!(short, vec![Zone::Package, Zone::Psys]);
    }

    #[test]
    fn test_try_from_index() {
        assert_eq!(Zone::try_from(0).unwrap(), Zone::Package);
        assert_eq!(Zone::try_from(4).unwrap(), Zone::Psys);
        assert!(matches!(
            Zone::try_from(5),
            Err(RaplcapError::ConfigError(_))
        ));
    }

    #[test]
    fn test_parse() {
        assert_eq!("PACKAGE".parse::<Zone>().unwrap(), Zone::Package);
        assert_eq!("dram".parse::<Zone>().unwrap(), Zone::Dram);
        assert_eq!("PSYS".parse::<Zone>().unwrap(), Zone::Psys);
        assert!(matches!(
            "GPU".parse::<Zone>(),
            Err(RaplcapError::ConfigError(_))
        ));
        assert_eq!(Zone::Uncore.to_string(), "UNCORE");
    }
}
