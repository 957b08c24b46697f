//! Bit cursor over the decoded bytes of one input stream.
//!
//! For raw sources the view is the caller's slice and nothing is copied. For
//! compressed sources decoded bytes are pulled into a window that is compacted
//! as the cursor moves past whole bytes. Every byte leaving the window (and, at
//! finalization, every byte the cursor has touched) is fed to the checksum
//! accumulator exactly once, in stream order.

use crate::error::AnalyticsError;
use crate::streams::checksums::ChecksumAccumulator;
use crate::streams::inflate::InflateSource;

pub(crate) struct SourceReader<'a> {
    source: &'a [u8],
    inflate: Option<InflateSource<'a>>,
    window: Vec<u8>,
    window_size: usize,
    pos: usize,
    bit: usize,
    /// Decoded bytes dropped from the front of `window`.
    drained: u64,
    /// Decoded bytes already fed to `checksums`.
    hashed: u64,
    checksums: Option<ChecksumAccumulator>,
}

impl<'a> SourceReader<'a> {
    pub fn raw(source: &'a [u8], checksums: Option<ChecksumAccumulator>) -> Self {
        Self {
            source,
            inflate: None,
            window: Vec::new(),
            window_size: 0,
            pos: 0,
            bit: 0,
            drained: 0,
            hashed: 0,
            checksums,
        }
    }

    pub fn inflating(
        source: &'a [u8],
        inflate: InflateSource<'a>,
        window_size: usize,
        checksums: Option<ChecksumAccumulator>,
    ) -> Self {
        Self {
            source,
            inflate: Some(inflate),
            window: Vec::with_capacity(window_size),
            window_size: window_size.max(1),
            pos: 0,
            bit: 0,
            drained: 0,
            hashed: 0,
            checksums,
        }
    }

    /// The caller's bytes, compressed or not.
    pub fn source(&self) -> &'a [u8] {
        self.source
    }

    fn view(&self) -> &[u8] {
        match self.inflate {
            Some(_) => &self.window,
            None => self.source,
        }
    }

    pub fn is_compressed(&self) -> bool {
        self.inflate.is_some()
    }

    /// Position of the cursor, in bits from the start of the decoded stream.
    pub fn bit_position(&self) -> u64 {
        (self.drained + self.pos as u64) * 8 + self.bit as u64
    }

    /// Bits between the cursor and the end of what is currently decoded.
    pub fn available_bits(&self) -> u64 {
        (self.view().len() - self.pos) as u64 * 8 - self.bit as u64
    }

    /// Makes at least `bits` bits available after the cursor if the source
    /// holds them. Returns false if the source ends first.
    pub fn fill(&mut self, bits: u64) -> Result<bool, AnalyticsError> {
        while self.available_bits() < bits {
            if self.inflate.is_none() {
                return Ok(false);
            }
            self.compact();
            let want = self.window_size.max(bits.div_ceil(8) as usize);
            let produced = match self.inflate.as_mut() {
                Some(inflate) => inflate.pull(&mut self.window, want)?.produced,
                None => 0,
            };
            if produced == 0 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Drops the whole bytes behind the cursor from the window.
    fn compact(&mut self) {
        if self.pos == 0 {
            return;
        }
        let start = (self.hashed - self.drained) as usize;
        if let Some(acc) = self.checksums.as_mut() {
            if start < self.pos {
                acc.update(&self.window[start..self.pos]);
            }
        }
        self.hashed = self.hashed.max(self.drained + self.pos as u64);
        self.window.drain(..self.pos);
        self.drained += self.pos as u64;
        self.pos = 0;
    }

    /// The decoded bytes from the cursor's byte onward, plus the bit offset
    /// of the cursor inside the first of them.
    pub fn current(&self) -> (&[u8], usize) {
        (&self.view()[self.pos..], self.bit)
    }

    pub fn advance_bits(&mut self, bits: u64) {
        let total = self.bit as u64 + bits;
        self.pos += (total / 8) as usize;
        self.bit = (total % 8) as usize;
        debug_assert!(self.pos <= self.view().len(), "cursor moved past decoded data");
    }

    pub fn align_to_byte(&mut self) {
        if self.bit > 0 {
            self.pos += 1;
            self.bit = 0;
        }
    }

    /// Feeds every byte the cursor has touched and not yet hashed.
    pub fn finalize_checksums(&mut self) -> Option<&ChecksumAccumulator> {
        let end = self.bit_position().div_ceil(8);
        if end > self.hashed {
            let from = (self.hashed - self.drained) as usize;
            let to = (end - self.drained) as usize;
            let bytes = match self.inflate {
                Some(_) => &self.window[from..to],
                None => &self.source[from..to],
            };
            if let Some(acc) = self.checksums.as_mut() {
                acc.update(bytes);
            }
            self.hashed = end;
        }
        self.checksums.as_ref()
    }

    /// Compressed (or raw) source bytes consumed so far.
    pub fn source_bytes_consumed(&self) -> usize {
        match &self.inflate {
            Some(inflate) => inflate.bytes_consumed(),
            None => self.bit_position().div_ceil(8) as usize,
        }
    }

    /// Resets the cursor, the decoder and the checksums.
    pub fn rewind(&mut self) {
        if let Some(inflate) = self.inflate.as_mut() {
            inflate.rewind();
        }
        self.window.clear();
        self.pos = 0;
        self.bit = 0;
        self.drained = 0;
        self.hashed = 0;
        if let Some(acc) = self.checksums.as_mut() {
            *acc = ChecksumAccumulator::new(acc.variant());
        }
    }
}
