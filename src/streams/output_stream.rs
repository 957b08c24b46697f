//! The encoding side of every analytic operation.
//!
//! An `OutputStream` appends produced elements to the caller's destination in
//! one of three shapes:
//! - a bitmap, one bit per input element, when the operation yields 1-bit
//!   results and the output width is nominal;
//! - a packed array at the nominal width, or zero-extended to a fixed
//!   8/16/32-bit width;
//! - an index vector of the positions of set bits, when 1-bit results meet a
//!   fixed output width. Indices are biased by `initial_output_index`.

use bitvec::prelude::*;

use crate::config::OutputBitWidth;
use crate::error::AnalyticsError;
use crate::execution::OutputDescriptor;
use crate::kernels::{KernelDispatcher, MAX_BIT_WIDTH};
use crate::types::Lanes;
use crate::utils::bits_to_bytes;

/// One produced chunk handed to `perform_pack`.
#[derive(Debug, Clone, Copy)]
pub enum PackSource<'b> {
    /// LSB-first bitmap.
    Bits(&'b [u8]),
    Lanes(Lanes<'b>),
}

pub struct OutputStreamBuilder<'a> {
    destination: &'a mut [u8],
    big_endian: bool,
    output_width: OutputBitWidth,
    nominal_bit_width: u32,
    initial_output_index: u32,
}

impl<'a> OutputStreamBuilder<'a> {
    pub fn big_endian(mut self, big_endian: bool) -> Self {
        self.big_endian = big_endian;
        self
    }

    /// `nominal_bit_width` is the width the operation naturally produces:
    /// 1 for filters, the source width for value-producing operations.
    pub fn bit_format(mut self, output_width: OutputBitWidth, nominal_bit_width: u32) -> Self {
        self.output_width = output_width;
        self.nominal_bit_width = nominal_bit_width;
        self
    }

    pub fn initial_output_index(mut self, index: u32) -> Self {
        self.initial_output_index = index;
        self
    }

    pub fn build(self) -> Result<OutputStream<'a>, AnalyticsError> {
        if !(1..=MAX_BIT_WIDTH).contains(&self.nominal_bit_width) {
            return Err(AnalyticsError::BitWidth(self.nominal_bit_width));
        }
        if let Some(fixed) = self.output_width.fixed_bits() {
            if self.nominal_bit_width > 1 && fixed < self.nominal_bit_width {
                return Err(AnalyticsError::OutFormat(format!(
                    "{}-bit output cannot hold {}-bit elements",
                    fixed, self.nominal_bit_width
                )));
            }
        }
        Ok(OutputStream {
            destination: self.destination,
            big_endian: self.big_endian,
            output_width: self.output_width,
            nominal_bit_width: self.nominal_bit_width,
            initial_output_index: self.initial_output_index,
            bits_written: 0,
            elements_seen: 0,
            elements_written: 0,
            indices: Vec::new(),
        })
    }
}

pub struct OutputStream<'a> {
    destination: &'a mut [u8],
    big_endian: bool,
    output_width: OutputBitWidth,
    nominal_bit_width: u32,
    initial_output_index: u32,
    bits_written: u64,
    /// Nominal elements handed in so far; the position base for indices.
    elements_seen: u64,
    elements_written: u64,
    indices: Vec<u32>,
}

impl<'a> OutputStream<'a> {
    pub fn builder(destination: &'a mut [u8]) -> OutputStreamBuilder<'a> {
        OutputStreamBuilder {
            destination,
            big_endian: false,
            output_width: OutputBitWidth::Nominal,
            nominal_bit_width: 1,
            initial_output_index: 0,
        }
    }

    /// Width of the emitted elements; 1 means a bitmap.
    pub fn bit_width(&self) -> u32 {
        self.output_width.fixed_bits().unwrap_or(self.nominal_bit_width)
    }

    pub fn output_width(&self) -> OutputBitWidth {
        self.output_width
    }

    pub fn is_big_endian(&self) -> bool {
        self.big_endian
    }

    /// True if set bits are emitted as their positions.
    pub fn is_index_output(&self) -> bool {
        self.nominal_bit_width == 1 && self.output_width != OutputBitWidth::Nominal
    }

    pub fn initial_output_index(&self) -> u32 {
        self.initial_output_index
    }

    pub fn bytes_written(&self) -> usize {
        bits_to_bytes(self.bits_written)
    }

    pub fn elements_written(&self) -> u64 {
        self.elements_written
    }

    /// Valid bits in the last written byte of a bitmap, 0 if it is full or
    /// the output is not a bitmap.
    pub fn last_bit_offset(&self) -> u32 {
        if self.bit_width() == 1 {
            (self.bits_written & 7) as u32
        } else {
            0
        }
    }

    pub fn capacity(&self) -> usize {
        self.destination.len()
    }

    pub fn describe(&self) -> OutputDescriptor {
        OutputDescriptor {
            capacity: self.destination.len(),
            output_width: self.output_width,
            nominal_bit_width: self.nominal_bit_width,
            big_endian: self.big_endian,
            initial_output_index: self.initial_output_index,
        }
    }

    pub(crate) fn destination_mut(&mut self) -> &mut [u8] {
        &mut *self.destination
    }

    /// Appends `count` elements of `source`.
    pub fn perform_pack(
        &mut self,
        dispatcher: &KernelDispatcher,
        source: PackSource<'_>,
        count: usize,
    ) -> Result<(), AnalyticsError> {
        if count == 0 {
            return Ok(());
        }
        if self.is_index_output() {
            return self.pack_indices(dispatcher, source, count);
        }

        let width = self.bit_width();
        let bits = count as u64 * width as u64;
        self.reserve(bits)?;
        let start = self.bits_written as usize;
        match source {
            PackSource::Bits(bitmap) => {
                debug_assert_eq!(width, 1, "bitmap chunk sent to a {}-bit output", width);
                let src = &bitmap.view_bits::<Lsb0>()[..count];
                if self.big_endian {
                    let dst = &mut self.destination.view_bits_mut::<Msb0>()[start..start + count];
                    for (i, bit) in src.iter().by_vals().enumerate() {
                        dst.set(i, bit);
                    }
                } else {
                    self.destination.view_bits_mut::<Lsb0>()[start..start + count].copy_from_bitslice(src);
                }
            }
            PackSource::Lanes(lanes) => {
                let pack = dispatcher.pack(self.big_endian, width);
                pack(lanes.slice(0, count), self.destination, start);
            }
        }
        self.bits_written += bits;
        self.elements_seen += count as u64;
        self.elements_written += count as u64;
        Ok(())
    }

    fn reserve(&self, bits: u64) -> Result<(), AnalyticsError> {
        if self.bits_written + bits > self.destination.len() as u64 * 8 {
            return Err(AnalyticsError::DestinationIsShort);
        }
        Ok(())
    }

    fn pack_indices(
        &mut self,
        dispatcher: &KernelDispatcher,
        source: PackSource<'_>,
        count: usize,
    ) -> Result<(), AnalyticsError> {
        let base = self.initial_output_index as u64 + self.elements_seen;
        let max = self.output_width.max_index();
        self.indices.clear();

        let mut push = |position: usize| -> Result<(), AnalyticsError> {
            let index = base + position as u64;
            if index > max {
                return Err(AnalyticsError::OutputOverflow { index, max });
            }
            self.indices.push(index as u32);
            Ok(())
        };
        match source {
            PackSource::Bits(bitmap) => {
                for position in bitmap.view_bits::<Lsb0>()[..count].iter_ones() {
                    push(position)?;
                }
            }
            PackSource::Lanes(lanes) => {
                for position in (0..count).filter(|&i| lanes.get(i) != 0) {
                    push(position)?;
                }
            }
        }

        let width = self.bit_width();
        let bits = self.indices.len() as u64 * width as u64;
        self.reserve(bits)?;
        let pack = dispatcher.pack(self.big_endian, width);
        pack(Lanes::U32(&self.indices), self.destination, self.bits_written as usize);

        self.bits_written += bits;
        self.elements_seen += count as u64;
        self.elements_written += self.indices.len() as u64;
        Ok(())
    }

    /// Forgets everything written; the destination bytes are left as they are.
    pub fn rewind(&mut self) {
        self.bits_written = 0;
        self.elements_seen = 0;
        self.elements_written = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatcher() -> &'static KernelDispatcher {
        KernelDispatcher::global()
    }

    #[test]
    fn test_bitmap_chunks_are_concatenated() {
        let mut dest = [0u8; 2];
        let mut out = OutputStream::builder(&mut dest).build().unwrap();
        out.perform_pack(dispatcher(), PackSource::Bits(&[0b101]), 3).unwrap();
        out.perform_pack(dispatcher(), PackSource::Bits(&[0b11]), 2).unwrap();
        assert_eq!(out.bytes_written(), 1);
        assert_eq!(out.last_bit_offset(), 5);
        assert_eq!(dest[0], 0b11101);
    }

    #[test]
    fn test_big_endian_bitmap_is_msb_first() {
        let mut dest = [0u8; 1];
        let mut out = OutputStream::builder(&mut dest).big_endian(true).build().unwrap();
        out.perform_pack(dispatcher(), PackSource::Bits(&[0b01]), 2).unwrap();
        assert_eq!(dest[0], 0b1000_0000);
    }

    #[test]
    fn test_index_output_is_biased_and_bounded() {
        let mut dest = [0u8; 8];
        let mut out = OutputStream::builder(&mut dest)
            .bit_format(OutputBitWidth::Bits16, 1)
            .initial_output_index(100)
            .build()
            .unwrap();
        out.perform_pack(dispatcher(), PackSource::Bits(&[0b1001]), 4).unwrap();
        out.perform_pack(dispatcher(), PackSource::Bits(&[0b10]), 2).unwrap();
        assert_eq!(out.elements_written(), 3);
        assert_eq!(out.bytes_written(), 6);
        assert_eq!(out.last_bit_offset(), 0);
        assert_eq!(&dest[..6], &[100, 0, 103, 0, 105, 0]);

        let mut small = [0u8; 4];
        let mut out = OutputStream::builder(&mut small)
            .bit_format(OutputBitWidth::Bits8, 1)
            .initial_output_index(255)
            .build()
            .unwrap();
        let result = out.perform_pack(dispatcher(), PackSource::Bits(&[0b10]), 2);
        assert_eq!(result, Err(AnalyticsError::OutputOverflow { index: 256, max: 255 }));
    }

    #[test]
    fn test_lanes_are_zero_extended() {
        let values = [1u8, 200];
        let mut dest = [0u8; 8];
        let mut out = OutputStream::builder(&mut dest)
            .bit_format(OutputBitWidth::Bits32, 8)
            .big_endian(true)
            .build()
            .unwrap();
        out.perform_pack(dispatcher(), PackSource::Lanes(Lanes::U8(&values)), 2).unwrap();
        assert_eq!(dest, [0, 0, 0, 1, 0, 0, 0, 200]);
    }

    #[test]
    fn test_nominal_lanes_repack_at_source_width() {
        let values = [5u8, 6, 7, 1];
        let mut dest = [0u8; 2];
        let mut out = OutputStream::builder(&mut dest).bit_format(OutputBitWidth::Nominal, 3).build().unwrap();
        out.perform_pack(dispatcher(), PackSource::Lanes(Lanes::U8(&values)), 4).unwrap();
        assert_eq!(out.last_bit_offset(), 0);
        drop(out);
        assert_eq!(dest, [0b1111_0101, 0b0000_0011]);
    }

    #[test]
    fn test_destination_is_short() {
        let values = [1u16, 2, 3];
        let mut dest = [0u8; 4];
        let mut out = OutputStream::builder(&mut dest).bit_format(OutputBitWidth::Nominal, 16).build().unwrap();
        let result = out.perform_pack(dispatcher(), PackSource::Lanes(Lanes::U16(&values)), 3);
        assert_eq!(result, Err(AnalyticsError::DestinationIsShort));
    }

    #[test]
    fn test_fixed_width_narrower_than_elements() {
        let mut dest = [0u8; 4];
        let result = OutputStream::builder(&mut dest).bit_format(OutputBitWidth::Bits8, 12).build();
        assert!(matches!(result, Err(AnalyticsError::OutFormat(_))));
    }
}
