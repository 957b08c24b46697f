//! Native integer lanes.
//!
//! Every element decoded from a stream lands in the smallest of `u8`, `u16` or
//! `u32` that holds its bit width. Kernels are generic over `Lane`, and the
//! dispatcher instantiates them once per lane type.

use bytemuck::Pod;
use num_traits::{PrimInt, Unsigned};

use crate::error::AnalyticsError;

/// A fixed-width unsigned lane an element can be unpacked into.
pub trait Lane: Pod + PrimInt + Unsigned + Default {
    const BYTES: usize;

    /// Truncating conversion from a decoded value.
    fn from_u32(value: u32) -> Self;

    /// Zero-extends the lane to `u32`.
    fn widen(self) -> u32;

    /// Reads one lane from the front of `bytes` in the given byte order.
    fn read(bytes: &[u8], big_endian: bool) -> u32;
}

impl Lane for u8 {
    const BYTES: usize = 1;

    #[inline]
    fn from_u32(value: u32) -> Self {
        value as u8
    }

    #[inline]
    fn widen(self) -> u32 {
        self as u32
    }

    #[inline]
    fn read(bytes: &[u8], _big_endian: bool) -> u32 {
        bytes[0] as u32
    }
}

impl Lane for u16 {
    const BYTES: usize = 2;

    #[inline]
    fn from_u32(value: u32) -> Self {
        value as u16
    }

    #[inline]
    fn widen(self) -> u32 {
        self as u32
    }

    #[inline]
    fn read(bytes: &[u8], big_endian: bool) -> u32 {
        let raw = [bytes[0], bytes[1]];
        if big_endian {
            u16::from_be_bytes(raw) as u32
        } else {
            u16::from_le_bytes(raw) as u32
        }
    }
}

impl Lane for u32 {
    const BYTES: usize = 4;

    #[inline]
    fn from_u32(value: u32) -> Self {
        value
    }

    #[inline]
    fn widen(self) -> u32 {
        self
    }

    #[inline]
    fn read(bytes: &[u8], big_endian: bool) -> u32 {
        let raw = [bytes[0], bytes[1], bytes[2], bytes[3]];
        if big_endian {
            u32::from_be_bytes(raw)
        } else {
            u32::from_le_bytes(raw)
        }
    }
}

/// Byte width of the lane an element of `bit_width` bits is unpacked into.
pub fn lane_bytes(bit_width: u32) -> usize {
    match bit_width {
        0..=8 => 1,
        9..=16 => 2,
        _ => 4,
    }
}

/// Position of the lane type in lane-indexed dispatcher tables.
pub fn lane_index(bit_width: u32) -> usize {
    match lane_bytes(bit_width) {
        1 => 0,
        2 => 1,
        _ => 2,
    }
}

/// A read-only view over a run of unpacked lanes of any width.
#[derive(Debug, Clone, Copy)]
pub enum Lanes<'a> {
    U8(&'a [u8]),
    U16(&'a [u16]),
    U32(&'a [u32]),
}

impl<'a> Lanes<'a> {
    /// Reinterprets native-endian lane bytes; `bytes` must be lane aligned.
    pub fn from_bytes(bytes: &'a [u8], lane_bytes: usize) -> Result<Self, AnalyticsError> {
        match lane_bytes {
            1 => Ok(Lanes::U8(bytes)),
            2 => Ok(Lanes::U16(bytemuck::try_cast_slice(bytes)?)),
            4 => Ok(Lanes::U32(bytemuck::try_cast_slice(bytes)?)),
            other => Err(AnalyticsError::InternalError(format!("no lane of {} bytes", other))),
        }
    }

    #[inline]
    pub fn get(&self, index: usize) -> u32 {
        match self {
            Lanes::U8(v) => v[index] as u32,
            Lanes::U16(v) => v[index] as u32,
            Lanes::U32(v) => v[index],
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Lanes::U8(v) => v.len(),
            Lanes::U16(v) => v.len(),
            Lanes::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The sub-view `[start, end)`.
    pub fn slice(&self, start: usize, end: usize) -> Lanes<'a> {
        match self {
            Lanes::U8(v) => Lanes::U8(&v[start..end]),
            Lanes::U16(v) => Lanes::U16(&v[start..end]),
            Lanes::U32(v) => Lanes::U32(&v[start..end]),
        }
    }
}
