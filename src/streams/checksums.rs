//! Streaming CRC-32 / CRC-32C and XOR checksum accumulation.
//!
//! The accumulator is fed byte runs in stream order and produces the same
//! result no matter how the bytes were split across calls.

use crate::config::CrcVariant;

/// Reflected Castagnoli polynomial.
const CRC32C_POLY: u32 = 0x82F6_3B78;

const CRC32C_TABLE: [u32; 256] = build_crc32c_table();

const fn build_crc32c_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ CRC32C_POLY } else { crc >> 1 };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

fn crc32c_extend(mut state: u32, bytes: &[u8]) -> u32 {
    for &b in bytes {
        state = CRC32C_TABLE[((state ^ b as u32) & 0xFF) as usize] ^ (state >> 8);
    }
    state
}

/// Running checksums over the bytes consumed from one input stream.
#[derive(Debug, Clone)]
pub struct ChecksumAccumulator {
    variant: CrcVariant,
    gzip: crc32fast::Hasher,
    crc32c_state: u32,
    xor: u16,
    odd_byte: Option<u8>,
    bytes_fed: u64,
}

impl ChecksumAccumulator {
    pub fn new(variant: CrcVariant) -> Self {
        Self {
            variant,
            gzip: crc32fast::Hasher::new(),
            crc32c_state: !0u32,
            xor: 0,
            odd_byte: None,
            bytes_fed: 0,
        }
    }

    pub fn variant(&self) -> CrcVariant {
        self.variant
    }

    /// Total bytes fed so far.
    pub fn bytes_fed(&self) -> u64 {
        self.bytes_fed
    }

    pub fn update(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        match self.variant {
            CrcVariant::Gzip => self.gzip.update(bytes),
            CrcVariant::Crc32c => self.crc32c_state = crc32c_extend(self.crc32c_state, bytes),
        }
        self.update_xor(bytes);
        self.bytes_fed += bytes.len() as u64;
    }

    fn update_xor(&mut self, mut bytes: &[u8]) {
        if let Some(low) = self.odd_byte.take() {
            self.xor ^= u16::from_le_bytes([low, bytes[0]]);
            bytes = &bytes[1..];
        }
        let mut words = bytes.chunks_exact(2);
        for word in &mut words {
            self.xor ^= u16::from_le_bytes([word[0], word[1]]);
        }
        if let [last] = words.remainder() {
            self.odd_byte = Some(*last);
        }
    }

    /// CRC of everything fed so far.
    pub fn crc(&self) -> u32 {
        match self.variant {
            CrcVariant::Gzip => self.gzip.clone().finalize(),
            CrcVariant::Crc32c => !self.crc32c_state,
        }
    }

    /// XOR of 16-bit little-endian words; an unpaired last byte is zero-extended.
    pub fn xor(&self) -> u32 {
        let tail = self.odd_byte.map_or(0, |b| b as u16);
        (self.xor ^ tail) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_check_values() {
        let mut gzip = ChecksumAccumulator::new(CrcVariant::Gzip);
        gzip.update(b"123456789");
        assert_eq!(gzip.crc(), 0xCBF4_3926);

        let mut castagnoli = ChecksumAccumulator::new(CrcVariant::Crc32c);
        castagnoli.update(b"123456789");
        assert_eq!(castagnoli.crc(), 0xE306_9283);
    }

    #[test]
    fn test_xor_pairs_bytes_little_endian() {
        let mut acc = ChecksumAccumulator::new(CrcVariant::Gzip);
        acc.update(&[0x01, 0x02, 0x10, 0x20, 0xFF]);
        assert_eq!(acc.xor(), (0x0201 ^ 0x2010 ^ 0x00FF) as u32);
    }

    #[test]
    fn test_split_feeding_matches_single_feed() {
        let data: Vec<u8> = (0..=255u8).cycle().take(1001).collect();
        for variant in [CrcVariant::Gzip, CrcVariant::Crc32c] {
            let mut whole = ChecksumAccumulator::new(variant);
            whole.update(&data);

            let mut pieces = ChecksumAccumulator::new(variant);
            for chunk in data.chunks(7) {
                pieces.update(chunk);
            }
            assert_eq!(whole.crc(), pieces.crc());
            assert_eq!(whole.xor(), pieces.xor());
            assert_eq!(pieces.bytes_fed(), 1001);
        }
    }
}
