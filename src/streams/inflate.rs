//! The DEFLATE-family pull source an input stream can sit behind.
//!
//! Wraps the `flate2` buffered decoders over the caller's compressed bytes and
//! hands out bounded runs of decompressed bytes on demand.

use std::io::Read;

use flate2::bufread::{DeflateDecoder, GzDecoder, ZlibDecoder};

use crate::config::{CompressionWrapper, DecompressEndPolicy};
use crate::error::AnalyticsError;

enum Decoder<'a> {
    Raw(DeflateDecoder<&'a [u8]>),
    Gzip(GzDecoder<&'a [u8]>),
    Zlib(ZlibDecoder<&'a [u8]>),
}

impl<'a> Decoder<'a> {
    fn new(compressed: &'a [u8], wrapper: CompressionWrapper) -> Self {
        match wrapper {
            CompressionWrapper::RawDeflate => Decoder::Raw(DeflateDecoder::new(compressed)),
            CompressionWrapper::Gzip => Decoder::Gzip(GzDecoder::new(compressed)),
            CompressionWrapper::Zlib => Decoder::Zlib(ZlibDecoder::new(compressed)),
        }
    }

    fn read(&mut self, out: &mut [u8]) -> std::io::Result<usize> {
        match self {
            Decoder::Raw(d) => d.read(out),
            Decoder::Gzip(d) => d.read(out),
            Decoder::Zlib(d) => d.read(out),
        }
    }

    fn remaining_input(&self) -> usize {
        match self {
            Decoder::Raw(d) => d.get_ref().len(),
            Decoder::Gzip(d) => d.get_ref().len(),
            Decoder::Zlib(d) => d.get_ref().len(),
        }
    }
}

/// Progress reported by one `pull`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PullResult {
    /// Decompressed bytes appended.
    pub produced: usize,
    /// Compressed bytes consumed so far, in total.
    pub consumed_input: usize,
    /// Valid bits in the last produced byte.
    pub last_byte_bits: u8,
}

pub struct InflateSource<'a> {
    compressed: &'a [u8],
    wrapper: CompressionWrapper,
    decoder: Decoder<'a>,
    finished: bool,
}

impl<'a> InflateSource<'a> {
    pub fn new(
        compressed: &'a [u8],
        wrapper: CompressionWrapper,
        end_policy: DecompressEndPolicy,
    ) -> Result<Self, AnalyticsError> {
        if end_policy == DecompressEndPolicy::StopAtFirstEndOfBlock {
            return Err(AnalyticsError::NotSupported(
                "stopping at the first end-of-block marker".to_string(),
            ));
        }
        Ok(Self {
            compressed,
            wrapper,
            decoder: Decoder::new(compressed, wrapper),
            finished: false,
        })
    }

    /// Appends up to `max` decompressed bytes to `out`.
    pub fn pull(&mut self, out: &mut Vec<u8>, max: usize) -> Result<PullResult, AnalyticsError> {
        let start = out.len();
        let mut produced = 0;
        if !self.finished {
            out.resize(start + max, 0);
            let read = loop {
                match self.decoder.read(&mut out[start..]) {
                    Ok(n) => break Ok(n),
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => break Err(e),
                }
            };
            let read = match read {
                Ok(n) => n,
                Err(e) => {
                    out.truncate(start);
                    return Err(AnalyticsError::InvalidDeflateData(e.to_string()));
                }
            };
            out.truncate(start + read);
            produced = read;
            if read == 0 {
                self.finished = true;
            }
        }
        Ok(PullResult {
            produced,
            consumed_input: self.bytes_consumed(),
            last_byte_bits: 8,
        })
    }

    /// Compressed bytes consumed by the decoder.
    pub fn bytes_consumed(&self) -> usize {
        self.compressed.len() - self.decoder.remaining_input()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Restarts decoding from the first compressed byte.
    pub fn rewind(&mut self) {
        self.decoder = Decoder::new(self.compressed, self.wrapper);
        self.finished = false;
    }
}
