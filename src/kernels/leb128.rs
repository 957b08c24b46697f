//! This module contains the pure, stateless kernels for ULEB128 (unsigned
//! Little-Endian Base 128) variable-length integers, as used by parquet-RLE
//! group headers. It is fully panic-free.

use num_traits::{PrimInt, Unsigned};
use std::io::Cursor;

use crate::error::AnalyticsError;

//==================================================================================
// 1. Public API for Single-Value Operations
//==================================================================================

/// Encodes a single unsigned integer into a LEB128 byte sequence, appending to `buffer`.
pub fn encode_one<T>(value: T, buffer: &mut Vec<u8>) -> Result<(), AnalyticsError>
where
    T: PrimInt + Unsigned,
{
    let zero = T::zero();
    let seven_bit_mask = T::from(0x7F)
        .ok_or_else(|| AnalyticsError::InternalError("7-bit mask does not fit type".to_string()))?;

    let mut current_value = value;
    loop {
        let mut byte = (current_value & seven_bit_mask)
            .to_u8()
            .ok_or_else(|| AnalyticsError::InternalError("LEB128 digit does not fit u8".to_string()))?;
        current_value = current_value >> 7;
        if current_value != zero {
            byte |= 0x80;
        }
        buffer.push(byte);

        if current_value == zero {
            break;
        }
    }
    Ok(())
}

/// Decodes a single unsigned integer from a LEB128 byte stream cursor.
///
/// # Errors
/// `PrleFormat` if the buffer ends mid-value or the value overflows `T`.
pub fn decode_one<T>(cursor: &mut Cursor<&[u8]>) -> Result<T, AnalyticsError>
where
    T: PrimInt + Unsigned,
{
    let mut result = T::zero();
    let mut shift = 0;
    let total_bits = std::mem::size_of::<T>() * 8;

    loop {
        let pos = cursor.position() as usize;
        let byte = *cursor
            .get_ref()
            .get(pos)
            .ok_or_else(|| AnalyticsError::PrleFormat("group header is truncated".to_string()))?;
        cursor.set_position((pos + 1) as u64);

        if shift >= total_bits {
            return Err(AnalyticsError::PrleFormat("group header overflows".to_string()));
        }
        let payload = T::from(byte & 0x7F)
            .ok_or_else(|| AnalyticsError::InternalError("7-bit payload does not fit type".to_string()))?;
        result = result | (payload << shift);

        if byte & 0x80 == 0 {
            // The last digit must not carry bits beyond the type's width.
            if shift + 7 > total_bits && (byte >> (total_bits - shift)) > 0 {
                return Err(AnalyticsError::PrleFormat("group header overflows".to_string()));
            }
            return Ok(result);
        }

        shift += 7;
    }
}

//==================================================================================
// 2. Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leb128_roundtrip_u32() {
        for value in [0u32, 1, 127, 128, 300, 16_384, u32::MAX] {
            let mut encoded = Vec::new();
            encode_one(value, &mut encoded).unwrap();
            let mut cursor = Cursor::new(encoded.as_slice());
            assert_eq!(decode_one::<u32>(&mut cursor).unwrap(), value);
            assert_eq!(cursor.position() as usize, encoded.len());
        }
    }

    #[test]
    fn test_decode_truncated_buffer() {
        let bytes = [0x80u8, 0x80];
        let mut cursor = Cursor::new(&bytes[..]);
        let result = decode_one::<u32>(&mut cursor);
        assert!(matches!(result, Err(AnalyticsError::PrleFormat(msg)) if msg.contains("truncated")));
    }

    #[test]
    fn test_decode_overflow_error() {
        let bytes = [0xFFu8, 0xFF, 0xFF, 0xFF, 0x7F];
        let mut cursor = Cursor::new(&bytes[..]);
        assert!(matches!(decode_one::<u32>(&mut cursor), Err(AnalyticsError::PrleFormat(_))));
    }
}
