//! Conversion between physical quantities and RAPL register encodings
//!
//! Power fields are linear in the power unit. Time windows use the
//! exponent/fraction encoding documented by Intel (Section 14.9.3):
//!
//! ```text
//! seconds = 2^Y * (1 + F/4) * time_unit
//! ```
//!
//! with a 5-bit `Y` in the low bits of the field and a 2-bit `F` above it.
//! The package formula is used for the power planes as well, which matches
//! `rapl_compute_time_window_core` in the Linux kernel.

use crate::register::{extract_bits, insert_bits};

/// Largest raw power limit (15 bits)
pub const MSR_POWER_MAX: u64 = 0x7FFF;

/// Smallest time window in time units; below this log2 would go negative
const MSR_TIME_MIN: f64 = 1.0;

/// Largest time window in time units; keeps `Y` within 5 bits
const MSR_TIME_MAX: f64 = 0xFFFF_FFFF_u32 as f64;

/// Decode a raw power field into watts
pub fn from_msr_power(raw: u64, power_units: f64) -> f64 {
    raw as f64 * power_units
}

/// Encode watts into a raw 15-bit power field
///
/// Values above the field width are clamped to [`MSR_POWER_MAX`] with a
/// warning. `watts` must not be negative.
pub fn to_msr_power(watts: f64, power_units: f64) -> u64 {
    debug_assert!(watts >= 0.0);
    debug_assert!(power_units > 0.0);
    let mut raw = (watts / power_units) as u64;
    if raw > MSR_POWER_MAX {
        tracing::warn!(
            "Power limit too large: {:.12} W, using max: {:.12} W",
            watts,
            MSR_POWER_MAX as f64 * power_units
        );
        raw = MSR_POWER_MAX;
    }
    tracing::debug!(
        "to_msr_power: watts={:.12}, power_units={:.12}, raw=0x{:04X}",
        watts,
        power_units,
        raw
    );
    raw
}

/// Decode a time window from its exponent `y` and fraction `f`
pub fn from_msr_time(y: u64, f: u64, time_units: f64) -> f64 {
    tracing::debug!(
        "from_msr_time: y=0x{:02X}, f=0x{:X}, time_units={:.12}",
        y,
        f,
        time_units
    );
    (1u64 << y) as f64 * ((4 + f) as f64 / 4.0) * time_units
}

/// Decode a packed 7-bit time window field
pub fn from_msr_time_field(raw: u64, time_units: f64) -> f64 {
    from_msr_time(extract_bits(raw, 0, 4), extract_bits(raw, 5, 6), time_units)
}

/// Encode seconds into a packed 7-bit time window field
///
/// The window is clamped to `[1, 2^32 - 1]` time units, with a warning on
/// either bound. For windows of four or more time units the fractional part
/// of the window does not affect `F`, so precision is lost above that.
pub fn to_msr_time(seconds: f64, time_units: f64) -> u64 {
    debug_assert!(seconds > 0.0);
    debug_assert!(time_units > 0.0);
    let mut t = seconds / time_units;
    if t < MSR_TIME_MIN {
        tracing::warn!(
            "Time window too small: {:.12} sec, using min: {:.12} sec",
            seconds,
            time_units
        );
        t = MSR_TIME_MIN;
    } else if t > MSR_TIME_MAX {
        // precision loss at this extreme means the max is only approximated
        tracing::warn!(
            "Time window too large: {:.12} sec, trying max: {:.12} sec",
            seconds,
            MSR_TIME_MAX * time_units
        );
        t = MSR_TIME_MAX;
    }
    let y = (t as u64).ilog2() as u64;
    let f = ((4.0 * t) as u64 >> y) - 4;
    tracing::debug!(
        "to_msr_time: seconds={:.12}, time_units={:.12}, t={:.12}, y=0x{:02X}, f=0x{:X}",
        seconds,
        time_units,
        t,
        y,
        f
    );
    insert_bits(insert_bits(0, y, 0, 4), f, 5, 6)
}
