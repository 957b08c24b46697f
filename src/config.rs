// In: src/config.rs

//! The single source of truth for analytics engine configuration.
//!
//! `EngineConfig` is created once at the application boundary (e.g. from a JSON
//! document) and passed down by reference. Per-call options live in
//! `OperationFlags`, which mirrors the flag word a job submitter would set.

use serde::{Deserialize, Serialize};

use crate::error::AnalyticsError;

//==================================================================================
// I. Core Configuration Enums
//==================================================================================

/// Where an operation runs.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPath {
    /// Portable CPU pipeline.
    Software,
    /// Accelerator submission only; fails if no device accepts the descriptor.
    Hardware,
    /// **Default:** try the accelerator, fall back to software on any failure.
    #[default]
    Auto,
}

/// How `ExecutionPath::Auto` treats stream state after a failed hardware attempt.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// **Default:** every stream is rewound to its construction state before
    /// the software attempt.
    #[default]
    RewindStreams,
    /// Streams are handed to software as the hardware attempt left them.
    ReuseStreams,
}

/// The on-wire format of a source stream.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParserFormat {
    /// Little-endian packed array.
    #[default]
    LittleEndian,
    /// Big-endian packed array.
    BigEndian,
    /// Parquet RLE / bit-packed hybrid with a leading bit-width byte.
    ParquetRle,
}

/// Width of the elements written to the destination.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputBitWidth {
    /// Output elements keep the width the operation naturally produces
    /// (a bitmap for filters, the source width for value-producing operations).
    #[default]
    Nominal,
    Bits8,
    Bits16,
    Bits32,
}

impl OutputBitWidth {
    /// Fixed width in bits, or `None` for nominal output.
    pub fn fixed_bits(self) -> Option<u32> {
        match self {
            OutputBitWidth::Nominal => None,
            OutputBitWidth::Bits8 => Some(8),
            OutputBitWidth::Bits16 => Some(16),
            OutputBitWidth::Bits32 => Some(32),
        }
    }

    /// Largest index an index-vector output of this width can carry.
    pub fn max_index(self) -> u64 {
        match self {
            OutputBitWidth::Bits8 => u8::MAX as u64,
            OutputBitWidth::Bits16 => u16::MAX as u64,
            OutputBitWidth::Nominal | OutputBitWidth::Bits32 => u32::MAX as u64,
        }
    }
}

/// CRC polynomial applied to the consumed input bytes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CrcVariant {
    /// CRC-32 as used by gzip.
    #[default]
    Gzip,
    /// CRC-32C (Castagnoli).
    Crc32c,
}

/// Container around the DEFLATE payload of a compressed source.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CompressionWrapper {
    #[default]
    RawDeflate,
    Gzip,
    Zlib,
}

/// Where decompression of a source may stop.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DecompressEndPolicy {
    /// **Default:** decode through the block marked final.
    #[default]
    StopAtFinalBlock,
    /// Stop at the first end-of-block marker.
    StopAtFirstEndOfBlock,
}

/// Predicate applied by `scan`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    /// `low <= v <= high`
    Range,
    /// `v < low || v > high`
    NotRange,
}

//==================================================================================
// II. Per-Operation Flags
//==================================================================================

/// The recognized per-call options.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct OperationFlags {
    /// Source-1 is compressed and must be inflated before parsing.
    #[serde(default)]
    pub decompress: bool,
    #[serde(default)]
    pub compression: CompressionWrapper,
    #[serde(default)]
    pub decompress_end: DecompressEndPolicy,
    #[serde(default)]
    pub omit_checksums: bool,
    #[serde(default)]
    pub omit_aggregates: bool,
    #[serde(default)]
    pub crc: CrcVariant,
    /// Write multi-byte output elements big-endian.
    #[serde(default)]
    pub output_big_endian: bool,
    #[serde(default)]
    pub source2_big_endian: bool,
    /// Ask the accelerator for an array instead of a bitmap.
    #[serde(default)]
    pub force_array_output: bool,
    /// Bytes discarded from the front of source-1 before parsing.
    #[serde(default)]
    pub drop_initial_bytes: u32,
}

//==================================================================================
// III. Engine-Level Configuration
//==================================================================================

/// Logging backend settings consumed by `observability::init_logging`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct LogConfig {
    /// One of `error`, `warn`, `info`, `debug`, `trace`, `off`.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Append log records to this file instead of stderr.
    #[serde(default)]
    pub file: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: default_log_level(), file: None }
    }
}

/// The unified configuration for the analytics engine.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct EngineConfig {
    #[serde(default)]
    pub execution_path: ExecutionPath,

    #[serde(default)]
    pub fallback_policy: FallbackPolicy,

    /// Size in bytes of every scratch buffer allocated per call.
    #[serde(default = "default_scratch_buffer_size")]
    pub scratch_buffer_size: usize,

    /// Size in bytes of the window the decompressor fills per pull.
    #[serde(default = "default_decompress_window_size")]
    pub decompress_window_size: usize,

    /// Preferred NUMA node for accelerator submissions. `None` means no preference.
    #[serde(default)]
    pub numa_node: Option<u32>,

    #[serde(default)]
    pub log: LogConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            execution_path: ExecutionPath::default(),
            fallback_policy: FallbackPolicy::default(),
            scratch_buffer_size: default_scratch_buffer_size(),
            decompress_window_size: default_decompress_window_size(),
            numa_node: None,
            log: LogConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Smallest scratch buffer the pipelines can make progress with.
    pub const MIN_SCRATCH_BUFFER_SIZE: usize = 64;

    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, AnalyticsError> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| AnalyticsError::InvalidParam(format!("config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AnalyticsError> {
        if self.scratch_buffer_size < Self::MIN_SCRATCH_BUFFER_SIZE {
            return Err(AnalyticsError::InvalidParam(format!(
                "scratch_buffer_size must be at least {} bytes, got {}",
                Self::MIN_SCRATCH_BUFFER_SIZE,
                self.scratch_buffer_size
            )));
        }
        if self.decompress_window_size == 0 {
            return Err(AnalyticsError::InvalidParam(
                "decompress_window_size must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Helper for `serde` to provide a default for `scratch_buffer_size`.
fn default_scratch_buffer_size() -> usize {
    16 * 1024
}

/// Helper for `serde` to provide a default for `decompress_window_size`.
fn default_decompress_window_size() -> usize {
    32 * 1024
}

fn default_log_level() -> String {
    "warn".to_string()
}
