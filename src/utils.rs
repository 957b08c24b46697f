//! This module provides a set of shared, low-level utility functions used
//! throughout the analytics engine.
//!
//! Its primary responsibilities include:
//! 1.  Bit/byte size arithmetic that never overflows 32-bit intermediates.
//! 2.  Buffer-range checks used by argument validation.

//==================================================================================
// 1. Core Utility Functions
//==================================================================================

/// Number of bytes needed to hold `bits` bits.
#[inline]
pub fn bits_to_bytes(bits: u64) -> usize {
    bits.div_ceil(8) as usize
}

/// Number of bytes needed to hold `count` elements of `bit_width` bits each.
#[inline]
pub fn packed_size(count: u64, bit_width: u32) -> usize {
    bits_to_bytes(count * bit_width as u64)
}

/// Mask selecting the low `bits` bits of a `u32`.
#[inline]
pub fn low_mask(bits: u32) -> u32 {
    if bits >= 32 {
        u32::MAX
    } else {
        (1u32 << bits) - 1
    }
}

/// Returns true if the two byte ranges share at least one byte.
pub fn ranges_overlap(a: &[u8], b: &[u8]) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    let a_start = a.as_ptr() as usize;
    let b_start = b.as_ptr() as usize;
    a_start < b_start + b.len() && b_start < a_start + a.len()
}

//==================================================================================
// 2. Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_arithmetic() {
        assert_eq!(bits_to_bytes(0), 0);
        assert_eq!(bits_to_bytes(1), 1);
        assert_eq!(bits_to_bytes(16), 2);
        assert_eq!(packed_size(5, 3), 2);
        assert_eq!(packed_size(u32::MAX as u64, 32), (u32::MAX as usize) * 4);
        assert_eq!(low_mask(4), 0xF);
        assert_eq!(low_mask(32), u32::MAX);
    }

    #[test]
    fn test_ranges_overlap() {
        let buffer = [0u8; 16];
        assert!(ranges_overlap(&buffer[0..8], &buffer[4..12]));
        assert!(!ranges_overlap(&buffer[0..8], &buffer[8..16]));
        assert!(!ranges_overlap(&buffer[0..0], &buffer[0..16]));
    }
}
