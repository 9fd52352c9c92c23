//! Bit-range primitives and typed layouts for 64-bit MSR words
//!
//! Registers are handled as opaque `u64` words. Every field access goes
//! through [`extract_bits`] and [`insert_bits`] (or a [`BitField`] wrapping
//! them), so the hardware layout never depends on how the host lays out its
//! own data.

/// Mask covering bits `[0, last - first]`.
#[inline]
const fn low_mask(first: u8, last: u8) -> u64 {
    u64::MAX >> (63 - (last - first))
}

/// Return the value held in bits `[first, last]` (inclusive), shifted down to bit 0.
///
/// Requires `first <= last < 64`.
#[inline]
pub fn extract_bits(word: u64, first: u8, last: u8) -> u64 {
    debug_assert!(first <= last, "first bit {first} is past last bit {last}");
    debug_assert!(last < 64, "last bit {last} is out of range");
    (word >> first) & low_mask(first, last)
}

/// Return `word` with bits `[first, last]` (inclusive) replaced by the low bits of `value`.
///
/// Bits of `value` that do not fit in the range are discarded; every other
/// bit of `word` is preserved. Requires `first <= last < 64`.
#[inline]
pub fn insert_bits(word: u64, value: u64, first: u8, last: u8) -> u64 {
    debug_assert!(first <= last, "first bit {first} is past last bit {last}");
    debug_assert!(last < 64, "last bit {last} is out of range");
    let mask = low_mask(first, last) << first;
    (word & !mask) | ((value << first) & mask)
}

/// An inclusive bit range inside a 64-bit register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitField {
    pub first: u8,
    pub last: u8,
}

impl BitField {
    /// Create a field spanning bits `[first, last]`
    ///
    /// Panics at compile time when used in a const context with an invalid range.
    pub const fn new(first: u8, last: u8) -> Self {
        assert!(first <= last && last < 64);
        Self { first, last }
    }

    /// Single-bit field
    pub const fn bit(bit: u8) -> Self {
        Self::new(bit, bit)
    }

    /// Same width, moved up by `offset` bits
    pub const fn shifted(self, offset: u8) -> Self {
        Self::new(self.first + offset, self.last + offset)
    }

    pub const fn width(self) -> u32 {
        (self.last - self.first + 1) as u32
    }

    /// Largest value that fits in the field
    pub const fn max_value(self) -> u64 {
        low_mask(self.first, self.last)
    }

    pub fn get(self, word: u64) -> u64 {
        extract_bits(word, self.first, self.last)
    }

    pub fn set(self, word: u64, value: u64) -> u64 {
        insert_bits(word, value, self.first, self.last)
    }

    pub fn is_set(self, word: u64) -> bool {
        self.get(word) == self.max_value()
    }
}

/// Trait for register layouts that can be converted to/from raw MSR values
///
/// Implementations are expected to build on [`BitField`] so the conversion
/// stays a pure function of the raw word.
pub trait RegisterLayout: Sized {
    /// Convert this register layout to a raw MSR value
    fn to_msr_value(&self) -> u64;

    /// Parse a raw MSR value into this register layout
    fn from_msr_value(value: u64) -> Self;

    /// Validate that the register values are within acceptable ranges
    ///
    /// Returns `Ok(())` if valid, or an error message if invalid.
    fn validate(&self) -> Result<(), &'static str> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORDS: [u64; 5] = [
        0,
        u64::MAX,
        0x8000_0000_0000_0001,
        0x00DC_8168_00D8_8140,
        0x0123_4567_89AB_CDEF,
    ];

    #[test]
    fn test_extract_bits() {
        assert_eq!(extract_bits(0x00DC_8168_00D8_8140, 0, 14), 0x0140);
        assert_eq!(extract_bits(0x00DC_8168_00D9_8140, 15, 16), 0x3);
        assert_eq!(extract_bits(0x00DC_8168_00D8_8140, 15, 16), 0x1);
        assert_eq!(extract_bits(u64::MAX, 0, 63), u64::MAX);
        assert_eq!(extract_bits(1 << 63, 63, 63), 1);
    }

    #[test]
    fn test_insert_bits_keeps_other_bits() {
        let word = insert_bits(u64::MAX, 0, 15, 16);
        assert_eq!(word, u64::MAX & !(0x3 << 15));

        // Oversized values are truncated to the field width
        let word = insert_bits(0, 0xFF, 4, 5);
        assert_eq!(word, 0x30);

        assert_eq!(insert_bits(0x1234, 0xABCD, 0, 63), 0xABCD);
    }

    #[test]
    fn test_reinserting_extracted_bits_is_identity() {
        for &word in &WORDS {
            for first in 0..64u8 {
                for last in first..64u8 {
                    let value = extract_bits(word, first, last);
                    assert_eq!(insert_bits(word, value, first, last), word);
                }
            }
        }
    }

    #[test]
    fn test_extracting_inserted_value() {
        for &word in &WORDS {
            for first in 0..64u8 {
                for last in first..64u8 {
                    let value = 0x5A5A_5A5A_5A5A_5A5A & low_mask(first, last);
                    assert_eq!(extract_bits(insert_bits(word, value, first, last), first, last), value);
                }
            }
        }
    }

    #[test]
    fn test_bit_field() {
        const FIELD: BitField = BitField::new(17, 23);
        assert_eq!(FIELD.width(), 7);
        assert_eq!(FIELD.max_value(), 0x7F);
        assert_eq!(FIELD.shifted(32), BitField::new(49, 55));

        let word = FIELD.set(0, 0x6A);
        assert_eq!(word, 0x6A << 17);
        assert_eq!(FIELD.get(word), 0x6A);

        let pair = BitField::new(15, 16);
        assert!(pair.is_set(0x3 << 15));
        assert!(!pair.is_set(0x1 << 15));
        assert!(BitField::bit(63).is_set(1 << 63));
    }
}
