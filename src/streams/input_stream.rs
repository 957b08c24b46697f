//! The decoding side of every analytic operation.
//!
//! An `InputStream` turns a caller byte range in one of the supported on-wire
//! formats into native lanes, one scratch buffer at a time. It optionally sits
//! behind a DEFLATE-family decoder, owns the checksum accumulation over the
//! bytes it consumes, and can be rewound to its construction state.

use crate::config::{CompressionWrapper, CrcVariant, DecompressEndPolicy};
use crate::error::AnalyticsError;
use crate::execution::SourceDescriptor;
use crate::kernels::{KernelDispatcher, MAX_BIT_WIDTH};
use crate::streams::checksums::ChecksumAccumulator;
use crate::streams::inflate::InflateSource;
use crate::streams::limited_buffer::LimitedBuffer;
use crate::streams::prle::PrleDecoder;
use crate::streams::source_reader::SourceReader;
use crate::types::{lane_bytes, StreamFormat};
use crate::utils::packed_size;

//==================================================================================
// 1. Results & Builder
//==================================================================================

/// What one `unpack` call produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnpackResult {
    pub unpacked_elements: usize,
    /// Bytes of native lanes written to the scratch buffer.
    pub unpacked_bytes: usize,
}

#[derive(Debug, Clone, Copy)]
struct Compression {
    wrapper: CompressionWrapper,
    end_policy: DecompressEndPolicy,
    window_size: usize,
}

/// Configures an `InputStream` over one source range.
pub struct InputStreamBuilder<'a> {
    source: &'a [u8],
    format: StreamFormat,
    bit_width: u32,
    element_count: Option<u32>,
    prologue_bytes: u32,
    compression: Option<Compression>,
    crc: CrcVariant,
    omit_checksums: bool,
    omit_aggregates: bool,
}

impl<'a> InputStreamBuilder<'a> {
    /// Declares the wire format. For uncompressed parquet RLE the width is
    /// read from the stream and `bit_width` is ignored.
    pub fn stream_format(mut self, format: StreamFormat, bit_width: u32) -> Self {
        self.format = format;
        self.bit_width = bit_width;
        self
    }

    pub fn element_count(mut self, count: u32) -> Self {
        self.element_count = Some(count);
        self
    }

    pub fn ignore_prologue_bytes(mut self, bytes: u32) -> Self {
        self.prologue_bytes = bytes;
        self
    }

    /// Marks the source as compressed.
    pub fn compressed(mut self, wrapper: CompressionWrapper, end_policy: DecompressEndPolicy) -> Self {
        let window_size = self.compression.map_or(32 * 1024, |c| c.window_size);
        self.compression = Some(Compression { wrapper, end_policy, window_size });
        self
    }

    /// Decoded bytes requested from the decompressor per pull.
    pub fn decompress_window(mut self, bytes: usize) -> Self {
        if let Some(c) = self.compression.as_mut() {
            c.window_size = bytes;
        }
        self
    }

    pub fn crc_variant(mut self, crc: CrcVariant) -> Self {
        self.crc = crc;
        self
    }

    pub fn omit_checksums(mut self, omit: bool) -> Self {
        self.omit_checksums = omit;
        self
    }

    pub fn omit_aggregates(mut self, omit: bool) -> Self {
        self.omit_aggregates = omit;
        self
    }

    pub fn build(self) -> Result<InputStream<'a>, AnalyticsError> {
        let checksums = (!self.omit_checksums).then(|| ChecksumAccumulator::new(self.crc));
        let prologue = self.prologue_bytes as usize;

        let bit_width = match (self.format, self.compression) {
            (StreamFormat::ParquetRle, None) => {
                if prologue > self.source.len() {
                    return Err(AnalyticsError::DropBytes {
                        requested: self.prologue_bytes,
                        available: self.source.len(),
                    });
                }
                let header = *self.source.get(prologue).ok_or(AnalyticsError::SourceIsShort)?;
                header as u32
            }
            _ => self.bit_width,
        };
        if !(1..=MAX_BIT_WIDTH).contains(&bit_width) {
            return Err(AnalyticsError::BitWidth(bit_width));
        }

        let reader = match self.compression {
            Some(c) => {
                let inflate = InflateSource::new(self.source, c.wrapper, c.end_policy)?;
                SourceReader::inflating(self.source, inflate, c.window_size, checksums)
            }
            None => {
                if prologue > self.source.len() {
                    return Err(AnalyticsError::DropBytes {
                        requested: self.prologue_bytes,
                        available: self.source.len(),
                    });
                }
                SourceReader::raw(self.source, checksums)
            }
        };

        let payload = self.source.len().saturating_sub(prologue);
        let element_count = match self.element_count {
            Some(count) => count,
            None if self.compression.is_none() && !self.format.is_self_describing() => {
                (payload as u64 * 8 / bit_width as u64).min(u32::MAX as u64) as u32
            }
            None => {
                return Err(AnalyticsError::InvalidParam(format!(
                    "element count is required for {} streams",
                    if self.compression.is_some() { "compressed" } else { "parquet RLE" }
                )))
            }
        };

        if self.compression.is_none()
            && !self.format.is_self_describing()
            && packed_size(element_count as u64, bit_width) > payload
        {
            return Err(AnalyticsError::SourceIsShort);
        }

        log::debug!(
            "input stream: format={} bit_width={} elements={} compressed={}",
            self.format,
            bit_width,
            element_count,
            self.compression.is_some()
        );

        Ok(InputStream {
            reader,
            format: self.format,
            bit_width,
            element_count,
            elements_processed: 0,
            prologue_bytes: self.prologue_bytes,
            prologue_skipped: false,
            prle: PrleDecoder::default(),
            omit_aggregates: self.omit_aggregates,
            omit_checksums: self.omit_checksums,
            crc_variant: self.crc,
            crc: 0,
            xor: 0,
        })
    }
}

//==================================================================================
// 2. The Stream
//==================================================================================

pub struct InputStream<'a> {
    reader: SourceReader<'a>,
    format: StreamFormat,
    bit_width: u32,
    element_count: u32,
    elements_processed: u32,
    prologue_bytes: u32,
    prologue_skipped: bool,
    prle: PrleDecoder,
    omit_aggregates: bool,
    omit_checksums: bool,
    crc_variant: CrcVariant,
    crc: u32,
    xor: u32,
}

impl<'a> InputStream<'a> {
    pub fn builder(source: &'a [u8]) -> InputStreamBuilder<'a> {
        InputStreamBuilder {
            source,
            format: StreamFormat::LittleEndian,
            bit_width: 8,
            element_count: None,
            prologue_bytes: 0,
            compression: None,
            crc: CrcVariant::default(),
            omit_checksums: false,
            omit_aggregates: false,
        }
    }

    pub fn bit_width(&self) -> u32 {
        self.bit_width
    }

    pub fn stream_format(&self) -> StreamFormat {
        self.format
    }

    pub fn is_compressed(&self) -> bool {
        self.reader.is_compressed()
    }

    pub fn element_count(&self) -> u32 {
        self.element_count
    }

    pub fn elements_left(&self) -> u32 {
        self.element_count - self.elements_processed
    }

    pub fn is_processed(&self) -> bool {
        self.elements_left() == 0
    }

    /// Marks `count` further elements as consumed without decoding them.
    pub fn add_elements_processed(&mut self, count: u32) {
        self.elements_processed = self.element_count.min(self.elements_processed.saturating_add(count));
    }

    pub fn are_aggregates_disabled(&self) -> bool {
        self.omit_aggregates
    }

    pub fn are_checksums_disabled(&self) -> bool {
        self.omit_checksums
    }

    pub fn crc_variant(&self) -> CrcVariant {
        self.crc_variant
    }

    /// Byte order of packed elements; parquet RLE packs little-endian.
    fn is_big_endian(&self) -> bool {
        self.format == StreamFormat::BigEndian
    }

    /// Discards the prologue and, for parquet RLE, the bit width header.
    pub fn skip_prologue(&mut self) -> Result<(), AnalyticsError> {
        if self.prologue_skipped {
            return Ok(());
        }
        let prologue_bits = self.prologue_bytes as u64 * 8;
        if !self.reader.fill(prologue_bits)? {
            return Err(AnalyticsError::DropBytes {
                requested: self.prologue_bytes,
                available: (self.reader.available_bits() / 8) as usize,
            });
        }
        self.reader.advance_bits(prologue_bits);

        if self.format == StreamFormat::ParquetRle {
            if !self.reader.fill(8)? {
                return Err(AnalyticsError::SourceIsShort);
            }
            let header = self.reader.current().0[0] as u32;
            if header != self.bit_width {
                return Err(AnalyticsError::PrleFormat(format!(
                    "stream declares {}-bit elements, expected {}",
                    header, self.bit_width
                )));
            }
            self.reader.advance_bits(8);
        }
        self.prologue_skipped = true;
        Ok(())
    }

    /// Decodes as many elements as fit after the buffer's byte shift.
    pub fn unpack(
        &mut self,
        dispatcher: &KernelDispatcher,
        buffer: &mut LimitedBuffer,
    ) -> Result<UnpackResult, AnalyticsError> {
        self.unpack_up_to(dispatcher, buffer, usize::MAX)
    }

    /// Like `unpack`, but decodes at most `limit` elements.
    pub fn unpack_up_to(
        &mut self,
        dispatcher: &KernelDispatcher,
        buffer: &mut LimitedBuffer,
        limit: usize,
    ) -> Result<UnpackResult, AnalyticsError> {
        self.skip_prologue()?;

        let lane = lane_bytes(self.bit_width);
        debug_assert_eq!(buffer.element_bits() as usize, lane * 8, "scratch lanes do not match the stream");
        let shift = buffer.take_byte_shift();
        let room = (buffer.capacity() - shift) / lane;
        let count = (self.elements_left() as usize).min(limit).min(room);
        if count == 0 {
            return Ok(UnpackResult::default());
        }
        let dst = &mut buffer.bytes_mut()[shift..shift + count * lane];

        if self.format == StreamFormat::ParquetRle {
            let unpack = dispatcher.unpack(false, self.bit_width);
            self.prle.decode(&mut self.reader, unpack, self.bit_width, count, dst)?;
        } else {
            let bits = count as u64 * self.bit_width as u64;
            if !self.reader.fill(bits)? {
                return Err(AnalyticsError::SourceIsShort);
            }
            let unpack = dispatcher.unpack(self.is_big_endian(), self.bit_width);
            let (src, start_bit) = self.reader.current();
            unpack(src, start_bit, count, dst);
            self.reader.advance_bits(bits);
        }

        self.elements_processed += count as u32;
        checkpoint!("event" = "unpack", "elements" = count, "left" = self.elements_left());
        Ok(UnpackResult { unpacked_elements: count, unpacked_bytes: count * lane })
    }

    /// The next `bytes` raw bytes at the cursor, without consuming them.
    /// Used by pipelines that read byte-aligned counters in place.
    pub(crate) fn peek_bytes(&mut self, bytes: usize) -> Result<&[u8], AnalyticsError> {
        self.skip_prologue()?;
        self.reader.align_to_byte();
        if !self.reader.fill(bytes as u64 * 8)? {
            return Err(AnalyticsError::SourceIsShort);
        }
        Ok(&self.reader.current().0[..bytes])
    }

    /// Moves the cursor forward by `bytes` whole bytes.
    pub(crate) fn shift_current_ptr(&mut self, bytes: usize) {
        self.reader.advance_bits(bytes as u64 * 8);
    }

    /// Applies progress made outside this process, e.g. by an accelerator that
    /// failed part-way. Only byte-addressable packed streams can carry it.
    pub(crate) fn apply_external_progress(&mut self, bytes_consumed: usize) -> Result<(), AnalyticsError> {
        if bytes_consumed == 0 || self.is_compressed() || self.format.is_self_describing() {
            return Ok(());
        }
        self.skip_prologue()?;
        let consumed = bytes_consumed.min((self.reader.available_bits() / 8) as usize);
        let elements = (consumed as u64 * 8 / self.bit_width as u64) as u32;
        let elements = elements.min(self.elements_left());
        self.reader.advance_bits(elements as u64 * self.bit_width as u64);
        self.add_elements_processed(elements);
        Ok(())
    }

    /// Finalizes CRC and XOR over every byte consumed so far.
    pub fn calculate_checksums(&mut self) {
        if let Some(acc) = self.reader.finalize_checksums() {
            self.crc = acc.crc();
            self.xor = acc.xor();
        }
    }

    pub fn crc_checksum(&self) -> u32 {
        self.crc
    }

    pub fn xor_checksum(&self) -> u32 {
        self.xor
    }

    /// Compressed (or raw) source bytes consumed so far, prologue included.
    pub fn source_bytes_consumed(&self) -> usize {
        self.reader.source_bytes_consumed()
    }

    /// The stream as an accelerator descriptor sees it.
    pub fn describe(&self) -> SourceDescriptor<'a> {
        SourceDescriptor {
            bytes: self.reader.source(),
            format: self.format,
            bit_width: self.bit_width,
            element_count: self.element_count,
            compressed: self.is_compressed(),
            prologue_bytes: self.prologue_bytes,
            big_endian: self.is_big_endian(),
        }
    }

    /// Returns the stream to the state `build` left it in.
    pub fn rewind(&mut self) {
        self.reader.rewind();
        self.prle.reset();
        self.elements_processed = 0;
        self.prologue_skipped = false;
        self.crc = 0;
        self.xor = 0;
    }
}
