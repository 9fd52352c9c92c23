//! RAPL (Running Average Power Limit) register definitions
//!
//! Addresses and field layouts are shared by every Intel processor with RAPL
//! support since Sandy Bridge.
//!
//! ## References
//!
//! - Intel® 64 and IA-32 Architectures Software Developer's Manual, Volume 3B
//! - Section 14.9: Platform Specific Power Management Support

use crate::register::{BitField, RegisterLayout};

/// MSR addresses for RAPL
pub mod msr {
    /// RAPL Power Unit MSR - Defines energy, power, and time units
    pub const MSR_RAPL_POWER_UNIT: u64 = 0x606;

    /// Package Power Limit - Configure package power limits
    pub const MSR_PKG_POWER_LIMIT: u64 = 0x610;

    /// PP0 Power Limit - Core power limits
    pub const MSR_PP0_POWER_LIMIT: u64 = 0x638;

    /// PP1 Power Limit - May reflect to uncore devices
    pub const MSR_PP1_POWER_LIMIT: u64 = 0x640;

    /// DRAM Power Limit - Memory power limits
    pub const MSR_DRAM_POWER_LIMIT: u64 = 0x618;

    /// Platform (PSys) Power Limit - Skylake and newer
    pub const MSR_PLATFORM_POWER_LIMIT: u64 = 0x65C;

    /// Package Energy Status - Total package energy consumption
    pub const MSR_PKG_ENERGY_STATUS: u64 = 0x611;

    /// PP0 Energy Status - Core energy consumption
    pub const MSR_PP0_ENERGY_STATUS: u64 = 0x639;

    /// PP1 Energy Status - Uncore energy consumption
    pub const MSR_PP1_ENERGY_STATUS: u64 = 0x641;

    /// DRAM Energy Status - Memory controller energy consumption
    pub const MSR_DRAM_ENERGY_STATUS: u64 = 0x619;

    /// Platform Energy Status - Entire platform energy consumption
    pub const MSR_PLATFORM_ENERGY_STATUS: u64 = 0x64D;
}

/// Energy status counter, bits 0-31 of every energy status MSR
pub const ENERGY_COUNTER: BitField = BitField::new(0, 31);

/// Largest raw value of [`ENERGY_COUNTER`] before it wraps
pub const ENERGY_COUNTER_MAX: u64 = 0xFFFF_FFFF;

/// RAPL Power Unit Register layout
///
/// Defines the units for energy, power, and time measurements.
///
/// ## Register Format
///
/// | Bits   | Field        | Description                           |
/// |--------|--------------|---------------------------------------|
/// | 0-3    | power_units  | Power units (1/2^PU watts)           |
/// | 4-7    | reserved     |                                       |
/// | 8-12   | energy_units | Energy units (1/2^ESU joules)        |
/// | 13-15  | reserved     |                                       |
/// | 16-19  | time_units   | Time units (1/2^TU seconds)          |
/// | 20-63  | reserved     |                                       |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RaplPowerUnit {
    /// Power units: watts = value * (1.0 / 2^power_units)
    pub power_units: u8,

    /// Energy units: joules = value * (1.0 / 2^energy_units)
    pub energy_units: u8,

    /// Time units: seconds = value * (1.0 / 2^time_units)
    pub time_units: u8,
}

impl RaplPowerUnit {
    pub const POWER_UNITS: BitField = BitField::new(0, 3);
    pub const ENERGY_UNITS: BitField = BitField::new(8, 12);
    pub const TIME_UNITS: BitField = BitField::new(16, 19);

    /// Get power unit multiplier (watts per LSB)
    pub fn power_unit_multiplier(&self) -> f64 {
        1.0 / (1u64 << self.power_units) as f64
    }

    /// Get energy unit multiplier (joules per LSB)
    pub fn energy_unit_multiplier(&self) -> f64 {
        1.0 / (1u64 << self.energy_units) as f64
    }

    /// Get time unit multiplier (seconds per LSB)
    pub fn time_unit_multiplier(&self) -> f64 {
        1.0 / (1u64 << self.time_units) as f64
    }
}

impl RegisterLayout for RaplPowerUnit {
    fn to_msr_value(&self) -> u64 {
        let value = Self::POWER_UNITS.set(0, self.power_units as u64);
        let value = Self::ENERGY_UNITS.set(value, self.energy_units as u64);
        Self::TIME_UNITS.set(value, self.time_units as u64)
    }

    fn from_msr_value(value: u64) -> Self {
        Self {
            power_units: Self::POWER_UNITS.get(value) as u8,
            energy_units: Self::ENERGY_UNITS.get(value) as u8,
            time_units: Self::TIME_UNITS.get(value) as u8,
        }
    }
}

/// Bit layout of one constraint inside a power limit register
///
/// ## Register Format
///
/// | Bits   | Field          | Description                        |
/// |--------|----------------|------------------------------------|
/// | 0-14   | power_limit_1  | Power limit 1 (power units)       |
/// | 15     | enable_1       | Enable power limit 1              |
/// | 16     | clamp_1        | Clamp to power limit 1            |
/// | 17-21  | time_window_1  | Time window 1, exponent Y         |
/// | 22-23  | time_window_1  | Time window 1, fraction F         |
/// | 24-31  | reserved       |                                    |
/// | 32-46  | power_limit_2  | Power limit 2 (power units)       |
/// | 47     | enable_2       | Enable power limit 2              |
/// | 48     | clamp_2        | Clamp to power limit 2            |
/// | 49-53  | time_window_2  | Time window 2, exponent Y         |
/// | 54-55  | time_window_2  | Time window 2, fraction F         |
/// | 56-62  | reserved       |                                    |
/// | 63     | lock           | Lock register                     |
///
/// Only package and platform registers define the second (short term)
/// constraint; on the other domains those bits are reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstraintLayout {
    pub power: BitField,
    pub enable: BitField,
    pub clamp: BitField,
    /// Enable and clamp bits together
    pub enable_clamp: BitField,
    /// Full 7-bit time window, Y in the low 5 bits and F in the high 2
    pub time: BitField,
    pub time_y: BitField,
    pub time_f: BitField,
}

impl ConstraintLayout {
    const fn at(offset: u8) -> Self {
        Self {
            power: BitField::new(0, 14).shifted(offset),
            enable: BitField::bit(15).shifted(offset),
            clamp: BitField::bit(16).shifted(offset),
            enable_clamp: BitField::new(15, 16).shifted(offset),
            time: BitField::new(17, 23).shifted(offset),
            time_y: BitField::new(17, 21).shifted(offset),
            time_f: BitField::new(22, 23).shifted(offset),
        }
    }
}

/// Long term constraint (power limit 1)
pub const LONG_TERM: ConstraintLayout = ConstraintLayout::at(0);

/// Short term constraint (power limit 2)
pub const SHORT_TERM: ConstraintLayout = ConstraintLayout::at(32);

/// Lock bit, set until the next processor reset
pub const POWER_LIMIT_LOCK: BitField = BitField::bit(63);
