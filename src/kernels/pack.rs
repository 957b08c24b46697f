//! This module contains the pure, stateless kernels that pack native values
//! into a fixed-width bit stream at an arbitrary bit offset.
//!
//! Values wider than the output width are truncated to it; callers validate
//! widths before packing.

use bitvec::prelude::*;

use crate::types::Lanes;
use crate::utils::low_mask;

/// Packs every value of `values` at `W` bits each, starting `start_bit` bits
/// into `dst`.
pub type PackFn = fn(values: Lanes<'_>, dst: &mut [u8], start_bit: usize);

pub(crate) fn pack_le<const W: usize>(values: Lanes<'_>, dst: &mut [u8], start_bit: usize) {
    let bits = dst.view_bits_mut::<Lsb0>();
    let mask = low_mask(W as u32);
    for i in 0..values.len() {
        let at = start_bit + i * W;
        bits[at..at + W].store_le::<u32>(values.get(i) & mask);
    }
}

pub(crate) fn pack_be<const W: usize>(values: Lanes<'_>, dst: &mut [u8], start_bit: usize) {
    let bits = dst.view_bits_mut::<Msb0>();
    let mask = low_mask(W as u32);
    for i in 0..values.len() {
        let at = start_bit + i * W;
        bits[at..at + W].store_be::<u32>(values.get(i) & mask);
    }
}

pub(crate) fn pack_invalid(_values: Lanes<'_>, _dst: &mut [u8], _start_bit: usize) {
    debug_assert!(false, "pack kernel requested for an unsupported bit width");
}

macro_rules! output_width_table {
    ($kernel:ident, $invalid:expr) => {
        [
            $invalid,
            $kernel::<1>, $kernel::<2>, $kernel::<3>, $kernel::<4>,
            $kernel::<5>, $kernel::<6>, $kernel::<7>, $kernel::<8>,
            $kernel::<9>, $kernel::<10>, $kernel::<11>, $kernel::<12>,
            $kernel::<13>, $kernel::<14>, $kernel::<15>, $kernel::<16>,
            $kernel::<17>, $kernel::<18>, $kernel::<19>, $kernel::<20>,
            $kernel::<21>, $kernel::<22>, $kernel::<23>, $kernel::<24>,
            $kernel::<25>, $kernel::<26>, $kernel::<27>, $kernel::<28>,
            $kernel::<29>, $kernel::<30>, $kernel::<31>, $kernel::<32>,
        ]
    };
}

pub(crate) fn le_table() -> [PackFn; 33] {
    output_width_table!(pack_le, pack_invalid)
}

pub(crate) fn be_table() -> [PackFn; 33] {
    output_width_table!(pack_be, pack_invalid)
}
