// In: src/error.rs

//! This module defines the single, unified error type for the analytics engine.
//! It uses the `thiserror` crate for ergonomic error handling and maps every
//! variant onto the numeric status taxonomy surfaced to callers.

use thiserror::Error;

/// Numeric status code reported for a successful operation.
pub const STATUS_OK: u32 = 0;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyticsError {
    // =========================================================================
    // === Argument / Contract Violations (checked before any stream I/O)
    // =========================================================================
    #[error("Null or missing buffer: {0}")]
    NullPointer(&'static str),

    #[error("Operation is not valid for this request: {0}")]
    Operation(String),

    #[error("Requested mode is not supported: {0}")]
    NotSupported(String),

    #[error("Invalid combination of parameters: {0}")]
    InvalidParam(String),

    #[error("Incorrect size: {0}")]
    Size(String),

    #[error("Source and destination buffers overlap")]
    BufferOverlap,

    #[error("Unsupported parser for this operation: {0}")]
    Parser(String),

    #[error("Invalid output format: {0}")]
    OutFormat(String),

    #[error("Dropped bits ({dropped}) leave no room in a {bit_width}-bit element")]
    DropBitsOverflow { dropped: u32, bit_width: u32 },

    #[error("Cannot drop {requested} initial bytes from a {available}-byte stream")]
    DropBytes { requested: u32, available: usize },

    #[error("Bit width {0} is out of the supported range")]
    BitWidth(u32),

    // =========================================================================
    // === Capacity Violations (detected mid-stream)
    // =========================================================================
    #[error("Source ended before the declared element count was decoded")]
    SourceIsShort,

    #[error("Source-2 holds fewer elements than required")]
    Source2IsShort,

    #[error("Destination buffer is too small for the produced output")]
    DestinationIsShort,

    #[error("Output index {index} exceeds the maximum ({max}) of the output width")]
    OutputOverflow { index: u64, max: u64 },

    #[error("Decoder filled its output before consuming the input")]
    MoreOutputNeeded,

    // =========================================================================
    // === Data-Shape Violations (operation specific)
    // =========================================================================
    #[error("Invalid RLE count: {0}")]
    InvalidRleCount(String),

    #[error("Parquet RLE stream is malformed or truncated: {0}")]
    PrleFormat(String),

    #[error("Compressed input is invalid: {0}")]
    InvalidDeflateData(String),

    // =========================================================================
    // === External Collaborators & Internal Faults
    // =========================================================================
    #[error("No hardware accelerator is available for this operation")]
    HardwareNotSupported,

    #[error("Internal logic error (this is a bug): {0}")]
    InternalError(String),

    /// A status code reported by an external collaborator that has no
    /// dedicated variant.
    #[error("Operation failed with status code {0}")]
    Status(u32),
}

impl AnalyticsError {
    /// Returns the stable numeric status code for this error.
    pub fn status_code(&self) -> u32 {
        match self {
            AnalyticsError::MoreOutputNeeded => 2,
            AnalyticsError::InternalError(_) => 6,
            AnalyticsError::NullPointer(_) => 50,
            AnalyticsError::Operation(_) => 51,
            AnalyticsError::NotSupported(_) => 52,
            AnalyticsError::InvalidParam(_) => 55,
            AnalyticsError::Size(_) => 57,
            AnalyticsError::BufferOverlap => 59,
            AnalyticsError::Parser(_) => 71,
            AnalyticsError::OutFormat(_) => 72,
            AnalyticsError::DropBitsOverflow { .. } => 73,
            AnalyticsError::DropBytes { .. } => 75,
            AnalyticsError::InvalidDeflateData(_) => 100,
            AnalyticsError::PrleFormat(_) => 220,
            AnalyticsError::OutputOverflow { .. } => 221,
            AnalyticsError::Source2IsShort => 224,
            AnalyticsError::DestinationIsShort => 225,
            AnalyticsError::BitWidth(_) => 231,
            AnalyticsError::SourceIsShort => 232,
            AnalyticsError::InvalidRleCount(_) => 234,
            AnalyticsError::HardwareNotSupported => 500,
            AnalyticsError::Status(code) => *code,
        }
    }

    /// Rebuilds an error from a numeric status code, e.g. one carried by an
    /// accelerator completion record. Returns `None` for `STATUS_OK`.
    pub fn from_status_code(code: u32) -> Option<Self> {
        let err = match code {
            STATUS_OK => return None,
            2 => AnalyticsError::MoreOutputNeeded,
            6 => AnalyticsError::InternalError("reported by collaborator".to_string()),
            50 => AnalyticsError::NullPointer("reported by collaborator"),
            51 => AnalyticsError::Operation("reported by collaborator".to_string()),
            52 => AnalyticsError::NotSupported("reported by collaborator".to_string()),
            55 => AnalyticsError::InvalidParam("reported by collaborator".to_string()),
            57 => AnalyticsError::Size("reported by collaborator".to_string()),
            59 => AnalyticsError::BufferOverlap,
            71 => AnalyticsError::Parser("reported by collaborator".to_string()),
            72 => AnalyticsError::OutFormat("reported by collaborator".to_string()),
            100 => AnalyticsError::InvalidDeflateData("reported by collaborator".to_string()),
            220 => AnalyticsError::PrleFormat("reported by collaborator".to_string()),
            224 => AnalyticsError::Source2IsShort,
            225 => AnalyticsError::DestinationIsShort,
            232 => AnalyticsError::SourceIsShort,
            234 => AnalyticsError::InvalidRleCount("reported by collaborator".to_string()),
            500 => AnalyticsError::HardwareNotSupported,
            other => AnalyticsError::Status(other),
        };
        Some(err)
    }
}

/// Converts an operation outcome into the numeric status the caller sees.
pub fn status_of(result: &Result<(), AnalyticsError>) -> u32 {
    match result {
        Ok(()) => STATUS_OK,
        Err(e) => e.status_code(),
    }
}

// =============================================================================
// === Manual `From` Implementations ===
// =============================================================================

impl From<bytemuck::PodCastError> for AnalyticsError {
    fn from(err: bytemuck::PodCastError) -> Self {
        AnalyticsError::InternalError(format!("lane cast failed: {}", err))
    }
}

impl From<std::io::Error> for AnalyticsError {
    fn from(err: std::io::Error) -> Self {
        AnalyticsError::InvalidDeflateData(err.to_string())
    }
}
