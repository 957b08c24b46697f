// In: src/bridge/request.rs

//! The caller-facing description of one operation and the argument checks
//! that run before any stream is touched.

use crate::analytics::{AnalyticOperation, AnalyticOperationResult, OperationOptions};
use crate::config::{EngineConfig, ExecutionPath, OperationFlags, OutputBitWidth, ParserFormat};
use crate::error::AnalyticsError;
use crate::execution::{self, ExecutionContext};
use crate::streams::{InputStream, OutputStream};
use crate::types::StreamFormat;
use crate::utils::ranges_overlap;

/// Source-2 of a two-input operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SecondSource<'a> {
    pub bytes: &'a [u8],
    /// Element width; masks and sets are always 1 bit wide.
    pub bit_width: u32,
}

/// Everything about a call except the operation-specific parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationRequest<'a> {
    pub source: &'a [u8],
    /// Ignored for parquet-RLE sources, which carry their own width.
    pub bit_width: u32,
    pub parser: ParserFormat,
    /// `0` derives the count from the source length for packed formats.
    pub element_count: u32,
    pub flags: OperationFlags,
    pub output_width: OutputBitWidth,
    pub initial_output_index: u32,
    pub source2: Option<SecondSource<'a>>,
}

impl<'a> OperationRequest<'a> {
    /// A little-endian packed source of `bit_width`-bit elements.
    pub fn new(source: &'a [u8], bit_width: u32) -> Self {
        Self { source, bit_width, ..Default::default() }
    }

    pub fn with_parser(mut self, parser: ParserFormat) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_element_count(mut self, count: u32) -> Self {
        self.element_count = count;
        self
    }

    pub fn with_flags(mut self, flags: OperationFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_output(mut self, width: OutputBitWidth, initial_output_index: u32) -> Self {
        self.output_width = width;
        self.initial_output_index = initial_output_index;
        self
    }

    pub fn with_source2(mut self, bytes: &'a [u8], bit_width: u32) -> Self {
        self.source2 = Some(SecondSource { bytes, bit_width });
        self
    }

    fn declared_count(&self) -> Option<u32> {
        (self.element_count != 0).then_some(self.element_count)
    }
}

//==================================================================================
// 1. Argument Validation
//==================================================================================

/// Contract checks shared by every operation. Returns source-2 when the
/// operation needs one.
pub(crate) fn validate<'a>(
    request: &OperationRequest<'a>,
    destination: &[u8],
    needs_source2: bool,
) -> Result<Option<SecondSource<'a>>, AnalyticsError> {
    // Only reachable through raw-pointer embedders; safe borrows never alias.
    let source2_bytes = request.source2.map(|s| s.bytes).unwrap_or_default();
    if ranges_overlap(request.source, destination) || ranges_overlap(source2_bytes, destination) {
        return Err(AnalyticsError::BufferOverlap);
    }
    if destination.is_empty() {
        return Err(AnalyticsError::NullPointer("destination"));
    }
    if request.source.is_empty() {
        return Err(AnalyticsError::NullPointer("source"));
    }
    if !needs_source2 {
        return Ok(None);
    }
    match request.source2 {
        Some(second) if !second.bytes.is_empty() => Ok(Some(second)),
        _ => Err(AnalyticsError::NullPointer("source-2")),
    }
}

/// Output-shape checks that depend only on the request.
pub(crate) fn check_output_request(request: &OperationRequest<'_>) -> Result<(), AnalyticsError> {
    if request.flags.force_array_output && request.output_width == OutputBitWidth::Nominal {
        return Err(AnalyticsError::OutFormat(
            "force_array_output needs a fixed output bit width".to_string(),
        ));
    }
    Ok(())
}

//==================================================================================
// 2. Stream Construction
//==================================================================================

/// Source-1 as described by the request.
pub(crate) fn source_stream<'a>(
    request: &OperationRequest<'a>,
    config: &EngineConfig,
    element_count: Option<u32>,
) -> Result<InputStream<'a>, AnalyticsError> {
    let flags = &request.flags;
    let mut builder = InputStream::builder(request.source)
        .stream_format(StreamFormat::from(request.parser), request.bit_width)
        .ignore_prologue_bytes(flags.drop_initial_bytes)
        .crc_variant(flags.crc)
        .omit_checksums(flags.omit_checksums)
        .omit_aggregates(flags.omit_aggregates);
    if let Some(count) = element_count {
        builder = builder.element_count(count);
    }
    if flags.decompress {
        builder = builder
            .compressed(flags.compression, flags.decompress_end)
            .decompress_window(config.decompress_window_size);
    }
    builder.build()
}

/// Source-1 with the request's declared element count.
pub(crate) fn declared_source<'a>(
    request: &OperationRequest<'a>,
    config: &EngineConfig,
) -> Result<InputStream<'a>, AnalyticsError> {
    source_stream(request, config, request.declared_count())
}

/// Source-2, always an uncompressed packed array.
pub(crate) fn second_stream<'a>(
    request: &OperationRequest<'_>,
    second: SecondSource<'a>,
    element_count: Option<u32>,
) -> Result<InputStream<'a>, AnalyticsError> {
    let format = if request.flags.source2_big_endian { StreamFormat::BigEndian } else { StreamFormat::LittleEndian };
    let mut builder = InputStream::builder(second.bytes)
        .stream_format(format, second.bit_width)
        .omit_checksums(true)
        .omit_aggregates(true);
    if let Some(count) = element_count {
        builder = builder.element_count(count);
    }
    builder.build().map_err(|err| match err {
        AnalyticsError::SourceIsShort => AnalyticsError::Source2IsShort,
        other => other,
    })
}

pub(crate) fn output_stream<'b>(
    request: &OperationRequest<'_>,
    destination: &'b mut [u8],
    nominal_bit_width: u32,
) -> Result<OutputStream<'b>, AnalyticsError> {
    check_output_request(request)?;
    OutputStream::builder(destination)
        .big_endian(request.flags.output_big_endian)
        .bit_format(request.output_width, nominal_bit_width)
        .initial_output_index(request.initial_output_index)
        .build()
}

pub(crate) fn operation_options(request: &OperationRequest<'_>, config: &EngineConfig) -> OperationOptions {
    OperationOptions {
        scratch_size: config.scratch_buffer_size,
        force_array_output: request.flags.force_array_output,
    }
}

//==================================================================================
// 3. Execution
//==================================================================================

/// Runs a prepared operation, or reports why it could not be prepared.
pub(crate) fn execute<'a, O: AnalyticOperation<'a>>(
    request: &OperationRequest<'_>,
    prepared: Result<O, AnalyticsError>,
    config: &EngineConfig,
    ctx: &ExecutionContext<'_>,
) -> AnalyticOperationResult {
    let mut op = match prepared {
        Ok(op) => op,
        Err(err) => {
            log::debug!("rejected before execution: {}", err);
            return AnalyticOperationResult::failed(err);
        }
    };
    if request.flags.decompress && config.execution_path == ExecutionPath::Software {
        let err = AnalyticsError::NotSupported(format!(
            "{}: decompression is not available on the software-only path",
            op.name()
        ));
        log::debug!("{}", err);
        return AnalyticOperationResult::failed(err);
    }
    execution::run(config.execution_path, ctx, &mut op)
}
