//! Set construction kernels for `find_unique`.
//!
//! Each source lane is reduced to `(v >> shift) & mask` and the matching bit of
//! the set bitmap (LSB-first) is raised.

use bitvec::prelude::*;

use crate::types::{lane_bytes, Lane};

pub type FindUniqueFn = fn(src: &[u8], count: usize, shift: u32, mask: u32, set: &mut [u8]);

pub(crate) fn find_unique<T: Lane>(src: &[u8], count: usize, shift: u32, mask: u32, set: &mut [u8]) {
    let lanes: &[T] = bytemuck::cast_slice(&src[..count * T::BYTES]);
    let bits = set.view_bits_mut::<Lsb0>();
    for lane in lanes {
        let key = (lane.widen() >> shift) & mask;
        bits.set(key as usize, true);
    }
}

fn find_unique_invalid(_src: &[u8], _count: usize, _shift: u32, _mask: u32, _set: &mut [u8]) {
    debug_assert!(false, "find_unique kernel requested for an unsupported bit width");
}

/// Kernels indexed by source bit width.
pub(crate) fn table() -> [FindUniqueFn; 33] {
    let mut table: [FindUniqueFn; 33] = [find_unique_invalid as FindUniqueFn; 33];
    for (bit_width, slot) in table.iter_mut().enumerate().skip(1) {
        *slot = match lane_bytes(bit_width as u32) {
            1 => find_unique::<u8>,
            2 => find_unique::<u16>,
            _ => find_unique::<u32>,
        };
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marks_every_distinct_value() {
        let src = [1u8, 1, 2, 0, 1];
        let mut set = [0u8; 2];
        table()[4](&src, 5, 0, 0xF, &mut set);
        assert_eq!(set, [0b0000_0111, 0]);
    }

    #[test]
    fn test_drops_low_bits_before_indexing() {
        let src: Vec<u16> = vec![0x0100, 0x0300, 0x0301];
        let mut set = [0u8; 1];
        table()[12](bytemuck::cast_slice(&src), 3, 8, 0xF, &mut set);
        assert_eq!(set, [0b0000_1010]);
    }
}
