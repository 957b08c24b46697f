//! A bounded, reusable staging area between decoding and kernel application.
//!
//! The buffer does not own any stream data. It is sized once per call and
//! reused for every chunk; `max_elements_count` tells a producer how many
//! elements of the declared storage width fit.

use crate::error::AnalyticsError;
use crate::types::{lane_bytes, Lane, Lanes};

/// Byte scratch with a storage-width hint.
///
/// Backed by `u32` words so that lane views of any width are always aligned.
#[derive(Debug, Clone)]
pub struct LimitedBuffer {
    words: Vec<u32>,
    capacity: usize,
    element_bits: u32,
    byte_shift: usize,
}

impl LimitedBuffer {
    /// A buffer whose elements are native lanes for `bit_width`-bit values.
    pub fn for_lanes(capacity: usize, bit_width: u32) -> Self {
        Self::with_element_bits(capacity, lane_bytes(bit_width) as u32 * 8)
    }

    /// A buffer whose elements are single bits.
    pub fn for_bits(capacity: usize) -> Self {
        Self::with_element_bits(capacity, 1)
    }

    fn with_element_bits(capacity: usize, element_bits: u32) -> Self {
        let capacity = capacity.next_multiple_of(4);
        Self {
            words: vec![0u32; capacity / 4],
            capacity,
            element_bits,
            byte_shift: 0,
        }
    }

    /// Capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Storage bits per element: 1 for bitmaps, 8/16/32 for lanes.
    pub fn element_bits(&self) -> u32 {
        self.element_bits
    }

    /// How many elements fit after the current byte shift.
    pub fn max_elements_count(&self) -> usize {
        (self.capacity - self.byte_shift) * 8 / self.element_bits as usize
    }

    /// Reserves the first `bytes` bytes; the next producer writes after them.
    pub fn set_byte_shift(&mut self, bytes: usize) -> Result<(), AnalyticsError> {
        if bytes > self.capacity {
            return Err(AnalyticsError::InternalError(format!(
                "byte shift {} exceeds buffer capacity {}",
                bytes, self.capacity
            )));
        }
        self.byte_shift = bytes;
        Ok(())
    }

    pub fn byte_shift(&self) -> usize {
        self.byte_shift
    }

    /// Returns and clears the pending byte shift.
    pub(crate) fn take_byte_shift(&mut self) -> usize {
        std::mem::take(&mut self.byte_shift)
    }

    pub fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.words)
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.words)
    }

    /// Typed view of the whole buffer.
    pub fn lanes<T: Lane>(&self) -> &[T] {
        bytemuck::cast_slice(&self.words)
    }

    pub fn lanes_mut<T: Lane>(&mut self) -> &mut [T] {
        bytemuck::cast_slice_mut(&mut self.words)
    }

    /// Width-erased view of the first `count` lanes.
    pub fn view(&self, count: usize) -> Result<Lanes<'_>, AnalyticsError> {
        let lane = (self.element_bits / 8).max(1) as usize;
        let bytes = self.bytes().get(..count * lane).ok_or_else(|| {
            AnalyticsError::InternalError(format!("{} lanes exceed buffer capacity", count))
        })?;
        Lanes::from_bytes(bytes, lane)
    }

    /// Zeroes the whole buffer.
    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }
}
