//! Parquet RLE / bit-packed hybrid decoding.
//!
//! After the one-byte bit width header the stream is a sequence of groups,
//! each introduced by a ULEB128 header `h`:
//! - `h & 1 == 1`: `h >> 1` blocks of eight values bit-packed little-endian.
//! - `h & 1 == 0`: a run of `h >> 1` copies of one value stored in
//!   `ceil(bit_width / 8)` little-endian bytes.
//!
//! The decoder is resumable at any element: a group cut by the end of the
//! caller's buffer is parked and continued by the next call.

use std::io::Cursor;

use crate::error::AnalyticsError;
use crate::kernels::leb128;
use crate::kernels::UnpackFn;
use crate::streams::source_reader::SourceReader;
use crate::types::lane_bytes;
use crate::utils::low_mask;

/// Longest ULEB128 encoding of a `u32` group header.
const MAX_HEADER_BYTES: u64 = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Group {
    #[default]
    Idle,
    Run { value: u32, remaining: u64 },
    Packed { remaining: u64 },
}

#[derive(Debug, Clone, Default)]
pub(crate) struct PrleDecoder {
    group: Group,
}

fn truncated() -> AnalyticsError {
    AnalyticsError::PrleFormat("stream ends inside a group".to_string())
}

fn fill_lanes(dst: &mut [u8], lane: usize, value: u32, count: usize) {
    match lane {
        1 => dst[..count].fill(value as u8),
        2 => {
            for chunk in dst[..count * 2].chunks_exact_mut(2) {
                chunk.copy_from_slice(&(value as u16).to_ne_bytes());
            }
        }
        _ => {
            for chunk in dst[..count * 4].chunks_exact_mut(4) {
                chunk.copy_from_slice(&value.to_ne_bytes());
            }
        }
    }
}

impl PrleDecoder {
    pub fn reset(&mut self) {
        self.group = Group::Idle;
    }

    /// Decodes exactly `count` elements into native lanes at the front of `dst`.
    pub fn decode(
        &mut self,
        reader: &mut SourceReader<'_>,
        unpack: UnpackFn,
        bit_width: u32,
        count: usize,
        dst: &mut [u8],
    ) -> Result<(), AnalyticsError> {
        let lane = lane_bytes(bit_width);
        let mut produced = 0usize;

        while produced < count {
            match self.group {
                Group::Idle => self.group = Self::read_header(reader, bit_width)?,
                Group::Run { value, remaining } => {
                    let n = remaining.min((count - produced) as u64) as usize;
                    fill_lanes(&mut dst[produced * lane..], lane, value, n);
                    produced += n;
                    self.group = match remaining - n as u64 {
                        0 => Group::Idle,
                        left => Group::Run { value, remaining: left },
                    };
                }
                Group::Packed { remaining } => {
                    let n = remaining.min((count - produced) as u64) as usize;
                    let bits = n as u64 * bit_width as u64;
                    if !reader.fill(bits)? {
                        return Err(truncated());
                    }
                    let (bytes, start_bit) = reader.current();
                    unpack(bytes, start_bit, n, &mut dst[produced * lane..]);
                    reader.advance_bits(bits);
                    produced += n;
                    self.group = match remaining - n as u64 {
                        0 => Group::Idle,
                        left => Group::Packed { remaining: left },
                    };
                }
            }
        }
        Ok(())
    }

    fn read_header(reader: &mut SourceReader<'_>, bit_width: u32) -> Result<Group, AnalyticsError> {
        reader.fill(MAX_HEADER_BYTES * 8)?;
        let (bytes, start_bit) = reader.current();
        debug_assert_eq!(start_bit, 0, "group headers are byte aligned");
        if bytes.is_empty() {
            return Err(AnalyticsError::PrleFormat(
                "stream ends before the declared element count".to_string(),
            ));
        }
        let mut cursor = Cursor::new(bytes);
        let header: u32 = leb128::decode_one(&mut cursor)?;
        reader.advance_bits(cursor.position() * 8);

        let count = (header >> 1) as u64;
        if header & 1 == 1 {
            if count == 0 {
                return Err(AnalyticsError::PrleFormat("empty bit-packed group".to_string()));
            }
            return Ok(Group::Packed { remaining: count * 8 });
        }

        if count == 0 {
            return Err(AnalyticsError::PrleFormat("run of zero repeats".to_string()));
        }
        let value_bytes = bit_width.div_ceil(8) as usize;
        if !reader.fill(value_bytes as u64 * 8)? {
            return Err(truncated());
        }
        let (bytes, _) = reader.current();
        let mut raw = [0u8; 4];
        raw[..value_bytes].copy_from_slice(&bytes[..value_bytes]);
        reader.advance_bits(value_bytes as u64 * 8);
        let value = u32::from_le_bytes(raw) & low_mask(bit_width);
        Ok(Group::Run { value, remaining: count })
    }
}

//==================================================================================
// Test helpers
//==================================================================================

/// Builds a parquet RLE stream (header byte included) for tests across the crate.
#[cfg(test)]
pub(crate) mod encode {
    use crate::kernels::leb128;

    pub enum Chunk<'v> {
        Run(u32, u32),
        Packed(&'v [u32]),
    }

    pub fn prle(bit_width: u32, chunks: &[Chunk<'_>]) -> Vec<u8> {
        let mut out = vec![bit_width as u8];
        for chunk in chunks {
            match chunk {
                Chunk::Run(value, repeats) => {
                    leb128::encode_one(repeats << 1, &mut out).unwrap();
                    let bytes = value.to_le_bytes();
                    out.extend_from_slice(&bytes[..bit_width.div_ceil(8) as usize]);
                }
                Chunk::Packed(values) => {
                    let groups = values.len().div_ceil(8);
                    leb128::encode_one(((groups as u32) << 1) | 1, &mut out).unwrap();
                    let mut packed = vec![0u8; groups * bit_width as usize];
                    for (i, &v) in values.iter().enumerate() {
                        for b in 0..bit_width as usize {
                            if (v >> b) & 1 == 1 {
                                let bit = i * bit_width as usize + b;
                                packed[bit / 8] |= 1 << (bit % 8);
                            }
                        }
                    }
                    out.extend_from_slice(&packed);
                }
            }
        }
        out
    }
}
