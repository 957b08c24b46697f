//! Mask-driven compaction (`select`) and its inverse (`expand`).
//!
//! Masks are unpacked 1-bit streams: one `u8` lane per element, non-zero means
//! set.

use crate::types::Lane;

/// Copies `src[i]` for every set `mask[i]`, `i < count`, to the front of `dst`.
/// Returns the number of lanes written.
pub type SelectFn = fn(src: &[u8], mask: &[u8], count: usize, dst: &mut [u8]) -> usize;

/// Writes one lane per mask element to `dst`: the next source lane for a set
/// bit, zero otherwise. Returns the number of source lanes consumed.
pub type ExpandFn = fn(src: &[u8], mask: &[u8], count: usize, dst: &mut [u8]) -> usize;

pub(crate) fn select<T: Lane>(src: &[u8], mask: &[u8], count: usize, dst: &mut [u8]) -> usize {
    let lanes: &[T] = bytemuck::cast_slice(&src[..count * T::BYTES]);
    let out: &mut [T] = bytemuck::cast_slice_mut(&mut dst[..count * T::BYTES]);
    let mut written = 0;
    for (lane, &bit) in lanes.iter().zip(&mask[..count]) {
        if bit != 0 {
            out[written] = *lane;
            written += 1;
        }
    }
    written
}

pub(crate) fn expand<T: Lane>(src: &[u8], mask: &[u8], count: usize, dst: &mut [u8]) -> usize {
    let available = src.len() / T::BYTES;
    let lanes: &[T] = bytemuck::cast_slice(&src[..available * T::BYTES]);
    let out: &mut [T] = bytemuck::cast_slice_mut(&mut dst[..count * T::BYTES]);
    let mut consumed = 0;
    for (slot, &bit) in out.iter_mut().zip(&mask[..count]) {
        if bit != 0 {
            *slot = lanes[consumed];
            consumed += 1;
        } else {
            *slot = T::zero();
        }
    }
    consumed
}

pub(crate) fn select_table() -> [SelectFn; 3] {
    [select::<u8>, select::<u16>, select::<u32>]
}

pub(crate) fn expand_table() -> [ExpandFn; 3] {
    [expand::<u8>, expand::<u16>, expand::<u32>]
}
