//! # raplcap-raw
//!
//! Hardware register definitions for Intel RAPL power capping.
//!
//! This crate provides the stateless half of the power capping stack:
//! bit-range primitives over raw 64-bit MSR words, the RAPL register
//! addresses and field layouts, conversion between watts/seconds and their
//! hardware encodings, and positioned MSR read/write through an open device.
//!
//! ## Usage
//!
//! ```ignore
//! use raplcap_raw::codec::to_msr_power;
//! use raplcap_raw::rapl::{msr::MSR_PKG_POWER_LIMIT, LONG_TERM};
//! use raplcap_raw::{read_msr_at, write_msr_at};
//!
//! let value = read_msr_at(&file, 0, MSR_PKG_POWER_LIMIT)?;
//! let value = LONG_TERM.power.set(value, to_msr_power(95.0, 0.125));
//! write_msr_at(&file, 0, MSR_PKG_POWER_LIMIT, value)?;
//! ```

pub mod codec;
pub mod msr;
pub mod rapl;
pub mod register;

// Re-export for convenience
pub use msr::{read_msr_at, write_msr_at, MsrError, Result};
pub use register::{extract_bits, insert_bits, BitField, RegisterLayout};
