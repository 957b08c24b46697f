//! Aggregate kernels: running min, max, sum and extremum index over produced
//! output chunks.
//!
//! On bitmaps, `min_value`/`max_value` are the first/last set positions and
//! `sum` is the popcount. On value arrays they are the min/max/sum of the values
//! and `index` is the position of the first minimum. Sums wrap modulo 2^32.

use bitvec::prelude::*;
use serde::{Deserialize, Serialize};

use crate::types::Lane;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregates {
    pub min_value: u32,
    pub max_value: u32,
    pub sum: u32,
    pub index: u32,
}

impl Default for Aggregates {
    fn default() -> Self {
        Self { min_value: u32::MAX, max_value: 0, sum: 0, index: 0 }
    }
}

/// Folds `count` elements of `chunk` into `acc`. `index_offset` is the output
/// position of the chunk's first element.
pub type AggregatesFn = fn(chunk: &[u8], count: usize, index_offset: u32, acc: &mut Aggregates);

pub(crate) fn aggregates_noop(_chunk: &[u8], _count: usize, _index_offset: u32, _acc: &mut Aggregates) {}

pub(crate) fn aggregates_bits(chunk: &[u8], count: usize, index_offset: u32, acc: &mut Aggregates) {
    let bits = &chunk.view_bits::<Lsb0>()[..count];
    for position in bits.iter_ones() {
        let index = index_offset.wrapping_add(position as u32);
        if acc.sum == 0 {
            acc.min_value = index;
        }
        acc.max_value = index;
        acc.sum = acc.sum.wrapping_add(1);
    }
}

pub(crate) fn aggregates_lanes<T: Lane>(chunk: &[u8], count: usize, index_offset: u32, acc: &mut Aggregates) {
    let lanes: &[T] = bytemuck::cast_slice(&chunk[..count * T::BYTES]);
    for (i, lane) in lanes.iter().enumerate() {
        let value = lane.widen();
        acc.sum = acc.sum.wrapping_add(value);
        if value > acc.max_value {
            acc.max_value = value;
        }
        if value < acc.min_value {
            acc.min_value = value;
            acc.index = index_offset.wrapping_add(i as u32);
        }
    }
}

/// 1-bit results held one per `u8` lane; folded like a bitmap.
pub(crate) fn aggregates_bit_lanes(chunk: &[u8], count: usize, index_offset: u32, acc: &mut Aggregates) {
    for (position, _) in chunk[..count].iter().enumerate().filter(|&(_, &b)| b != 0) {
        let index = index_offset.wrapping_add(position as u32);
        if acc.sum == 0 {
            acc.min_value = index;
        }
        acc.max_value = index;
        acc.sum = acc.sum.wrapping_add(1);
    }
}

/// Index 0 is the bitmap kernel, 1..=3 the `u8`/`u16`/`u32` lane kernels and
/// 4 the kernel for 1-bit values held in `u8` lanes.
pub(crate) fn table() -> [AggregatesFn; 5] {
    [
        aggregates_bits,
        aggregates_lanes::<u8>,
        aggregates_lanes::<u16>,
        aggregates_lanes::<u32>,
        aggregates_bit_lanes,
    ]
}
