//! Set membership kernels: look each reduced source value up in a set and
//! emit the hit as one output bit.

use bitvec::prelude::*;

use crate::types::Lane;

/// `set` holds one `u8` lane per set element (non-zero means present); bit `i`
/// of `dst` receives `set[(src[i] >> shift) & mask] != 0`.
pub type SetMembershipFn =
    fn(src: &[u8], count: usize, shift: u32, mask: u32, set: &[u8], dst: &mut [u8]);

pub(crate) fn set_membership<T: Lane>(
    src: &[u8],
    count: usize,
    shift: u32,
    mask: u32,
    set: &[u8],
    dst: &mut [u8],
) {
    let lanes: &[T] = bytemuck::cast_slice(&src[..count * T::BYTES]);
    let bits = &mut dst.view_bits_mut::<Lsb0>()[..count];
    for (mut bit, lane) in bits.iter_mut().zip(lanes) {
        let key = ((lane.widen() >> shift) & mask) as usize;
        *bit = set[key] != 0;
    }
}

pub(crate) fn table() -> [SetMembershipFn; 3] {
    [set_membership::<u8>, set_membership::<u16>, set_membership::<u32>]
}
