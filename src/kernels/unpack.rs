//! This module contains the pure, stateless kernels that unpack fixed-width
//! bit-packed elements into native lanes.
//!
//! One kernel is instantiated per (bit width, bit order). Little-endian streams
//! pack elements LSB-first, big-endian streams MSB-first. This module is PURE
//! RUST, uses `bitvec` for bit addressing and performs no allocation.

use bitvec::prelude::*;

use crate::types::Lane;

/// Unpacks `count` elements starting `start_bit` bits into `src`, writing native
/// lanes to the front of `dst`.
pub type UnpackFn = fn(src: &[u8], start_bit: usize, count: usize, dst: &mut [u8]);

//==================================================================================
// 1. Generic Core Logic
//==================================================================================

pub(crate) fn unpack_le<T: Lane, const W: usize>(
    src: &[u8],
    start_bit: usize,
    count: usize,
    dst: &mut [u8],
) {
    let bits = src.view_bits::<Lsb0>();
    let lanes: &mut [T] = bytemuck::cast_slice_mut(&mut dst[..count * T::BYTES]);
    for (i, lane) in lanes.iter_mut().enumerate() {
        let at = start_bit + i * W;
        *lane = T::from_u32(bits[at..at + W].load_le::<u32>());
    }
}

pub(crate) fn unpack_be<T: Lane, const W: usize>(
    src: &[u8],
    start_bit: usize,
    count: usize,
    dst: &mut [u8],
) {
    let bits = src.view_bits::<Msb0>();
    let lanes: &mut [T] = bytemuck::cast_slice_mut(&mut dst[..count * T::BYTES]);
    for (i, lane) in lanes.iter_mut().enumerate() {
        let at = start_bit + i * W;
        *lane = T::from_u32(bits[at..at + W].load_be::<u32>());
    }
}

pub(crate) fn unpack_invalid(_src: &[u8], _start_bit: usize, _count: usize, _dst: &mut [u8]) {
    debug_assert!(false, "unpack kernel requested for an unsupported bit width");
}

//==================================================================================
// 2. Table Construction
//==================================================================================

macro_rules! width_table {
    ($kernel:ident, $invalid:expr) => {
        [
            $invalid,
            $kernel::<u8, 1>, $kernel::<u8, 2>, $kernel::<u8, 3>, $kernel::<u8, 4>,
            $kernel::<u8, 5>, $kernel::<u8, 6>, $kernel::<u8, 7>, $kernel::<u8, 8>,
            $kernel::<u16, 9>, $kernel::<u16, 10>, $kernel::<u16, 11>, $kernel::<u16, 12>,
            $kernel::<u16, 13>, $kernel::<u16, 14>, $kernel::<u16, 15>, $kernel::<u16, 16>,
            $kernel::<u32, 17>, $kernel::<u32, 18>, $kernel::<u32, 19>, $kernel::<u32, 20>,
            $kernel::<u32, 21>, $kernel::<u32, 22>, $kernel::<u32, 23>, $kernel::<u32, 24>,
            $kernel::<u32, 25>, $kernel::<u32, 26>, $kernel::<u32, 27>, $kernel::<u32, 28>,
            $kernel::<u32, 29>, $kernel::<u32, 30>, $kernel::<u32, 31>, $kernel::<u32, 32>,
        ]
    };
}

/// Unpack kernels indexed by bit width, little-endian order.
pub(crate) fn le_table() -> [UnpackFn; 33] {
    width_table!(unpack_le, unpack_invalid)
}

/// Unpack kernels indexed by bit width, big-endian order.
pub(crate) fn be_table() -> [UnpackFn; 33] {
    width_table!(unpack_be, unpack_invalid)
}

//==================================================================================
// 3. Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpack_le_3_bit() {
        // 5, 6, 7, 1 packed LSB-first at 3 bits
        let src = [0b1111_0101u8, 0b0000_0011];
        let mut dst = [0u8; 4];
        le_table()[3](&src, 0, 4, &mut dst);
        assert_eq!(dst, [5, 6, 7, 1]);
    }

    #[test]
    fn test_unpack_be_4_bit_with_offset() {
        let src = [0x12u8, 0x34];
        let mut dst = [0u8; 3];
        be_table()[4](&src, 4, 3, &mut dst);
        assert_eq!(dst, [2, 3, 4]);
    }

    #[test]
    fn test_unpack_le_12_bit_into_u16_lanes() {
        let src = [0xBCu8, 0x0A, 0x00];
        let mut words = [0u16; 2];
        le_table()[12](&src, 0, 2, bytemuck::cast_slice_mut(&mut words));
        assert_eq!(words, [0xABC, 0]);
    }

    #[test]
    fn test_unpack_be_32_bit() {
        let src = [0x01u8, 0x02, 0x03, 0x04];
        let mut words = [0u32; 1];
        be_table()[32](&src, 0, 1, bytemuck::cast_slice_mut(&mut words));
        assert_eq!(words, [0x0102_0304]);
    }
}
