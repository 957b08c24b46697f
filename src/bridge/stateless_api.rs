// In: src/bridge/stateless_api.rs

//! One-shot entry points. Each call validates its arguments, builds the
//! streams it needs, runs on the configured execution path and returns the
//! outcome by value. Nothing outlives the call.

use crate::analytics::{
    AnalyticOperationResult, Expand, Extract, FindUnique, RleBurst, Scan, Select, SetMembership,
};
use crate::bridge::request::{
    declared_source, execute, operation_options, output_stream, second_stream, source_stream, validate,
    OperationRequest,
};
use crate::config::{Comparison, EngineConfig, ParserFormat};
use crate::error::AnalyticsError;
use crate::execution::ExecutionContext;

/// Compares every source element against `low` (and `high` for the range
/// predicates) and emits one result bit per element.
pub fn scan(
    request: &OperationRequest<'_>,
    comparison: Comparison,
    low: u32,
    high: u32,
    destination: &mut [u8],
    config: &EngineConfig,
    ctx: &ExecutionContext<'_>,
) -> AnalyticOperationResult {
    let prepared = prepare_scan(request, comparison, low, high, destination, config);
    execute(request, prepared, config, ctx)
}

fn prepare_scan<'a>(
    request: &OperationRequest<'a>,
    comparison: Comparison,
    low: u32,
    high: u32,
    destination: &'a mut [u8],
    config: &EngineConfig,
) -> Result<Scan<'a>, AnalyticsError> {
    validate(request, destination, false)?;
    let input = declared_source(request, config)?;
    let output = output_stream(request, destination, 1)?;
    Scan::new(input, output, comparison, low, high, operation_options(request, config))
}

/// Copies the elements at positions `lower..=upper`.
pub fn extract(
    request: &OperationRequest<'_>,
    lower: u32,
    upper: u32,
    destination: &mut [u8],
    config: &EngineConfig,
    ctx: &ExecutionContext<'_>,
) -> AnalyticOperationResult {
    let prepared = prepare_extract(request, lower, upper, destination, config);
    execute(request, prepared, config, ctx)
}

fn prepare_extract<'a>(
    request: &OperationRequest<'a>,
    lower: u32,
    upper: u32,
    destination: &'a mut [u8],
    config: &EngineConfig,
) -> Result<Extract<'a>, AnalyticsError> {
    validate(request, destination, false)?;
    let input = declared_source(request, config)?;
    let output = output_stream(request, destination, input.bit_width())?;
    Extract::new(input, output, lower, upper, operation_options(request, config))
}

/// Keeps the source elements whose source-2 mask bit is set.
pub fn select(
    request: &OperationRequest<'_>,
    destination: &mut [u8],
    config: &EngineConfig,
    ctx: &ExecutionContext<'_>,
) -> AnalyticOperationResult {
    let prepared = prepare_select(request, destination, config);
    execute(request, prepared, config, ctx)
}

fn prepare_select<'a>(
    request: &OperationRequest<'a>,
    destination: &'a mut [u8],
    config: &EngineConfig,
) -> Result<Select<'a>, AnalyticsError> {
    let second = validate(request, destination, true)?.ok_or(AnalyticsError::NullPointer("source-2"))?;
    let input = declared_source(request, config)?;
    let mask = second_stream(request, second, Some(input.element_count()))?;
    let output = output_stream(request, destination, input.bit_width())?;
    Select::new(input, mask, output, operation_options(request, config))
}

/// Spreads the source elements over the set bits of the source-2 mask.
///
/// Here `element_count` is the mask length, which is also the output length.
/// A packed uncompressed source is sized from its bytes; any other source is
/// bounded by the mask length.
pub fn expand(
    request: &OperationRequest<'_>,
    destination: &mut [u8],
    config: &EngineConfig,
    ctx: &ExecutionContext<'_>,
) -> AnalyticOperationResult {
    let prepared = prepare_expand(request, destination, config);
    execute(request, prepared, config, ctx)
}

fn prepare_expand<'a>(
    request: &OperationRequest<'a>,
    destination: &'a mut [u8],
    config: &EngineConfig,
) -> Result<Expand<'a>, AnalyticsError> {
    let second = validate(request, destination, true)?.ok_or(AnalyticsError::NullPointer("source-2"))?;
    let mask_count = (request.element_count != 0).then_some(request.element_count);
    let mask = second_stream(request, second, mask_count)?;
    let input = if request.flags.decompress || request.parser == ParserFormat::ParquetRle {
        source_stream(request, config, Some(mask.element_count()))?
    } else {
        source_stream(request, config, None)?
    };
    let output = output_stream(request, destination, input.bit_width())?;
    Expand::new(input, mask, output, operation_options(request, config))
}

/// Repeats every source-2 symbol by the matching source-1 counter.
pub fn rle_burst(
    request: &OperationRequest<'_>,
    destination: &mut [u8],
    config: &EngineConfig,
    ctx: &ExecutionContext<'_>,
) -> AnalyticOperationResult {
    let prepared = prepare_rle_burst(request, destination, config);
    execute(request, prepared, config, ctx)
}

fn prepare_rle_burst<'a>(
    request: &OperationRequest<'a>,
    destination: &'a mut [u8],
    config: &EngineConfig,
) -> Result<RleBurst<'a>, AnalyticsError> {
    let second = validate(request, destination, true)?.ok_or(AnalyticsError::NullPointer("source-2"))?;
    let counters = declared_source(request, config)?;
    let symbols = second_stream(request, second, Some(counters.element_count()))?;
    let output = output_stream(request, destination, symbols.bit_width())?;
    RleBurst::new(counters, symbols, output, operation_options(request, config))
}

/// Builds the `2^N`-bit presence set of the reduced source values.
pub fn find_unique(
    request: &OperationRequest<'_>,
    drop_low_bits: u32,
    drop_high_bits: u32,
    destination: &mut [u8],
    config: &EngineConfig,
    ctx: &ExecutionContext<'_>,
) -> AnalyticOperationResult {
    let prepared = prepare_find_unique(request, drop_low_bits, drop_high_bits, destination, config);
    execute(request, prepared, config, ctx)
}

fn prepare_find_unique<'a>(
    request: &OperationRequest<'a>,
    drop_low_bits: u32,
    drop_high_bits: u32,
    destination: &'a mut [u8],
    config: &EngineConfig,
) -> Result<FindUnique<'a>, AnalyticsError> {
    validate(request, destination, false)?;
    let input = declared_source(request, config)?;
    let output = output_stream(request, destination, 1)?;
    FindUnique::new(input, output, drop_low_bits, drop_high_bits, operation_options(request, config))
}

/// Looks every reduced source value up in the source-2 set.
pub fn set_membership(
    request: &OperationRequest<'_>,
    drop_low_bits: u32,
    drop_high_bits: u32,
    destination: &mut [u8],
    config: &EngineConfig,
    ctx: &ExecutionContext<'_>,
) -> AnalyticOperationResult {
    let prepared = prepare_set_membership(request, drop_low_bits, drop_high_bits, destination, config);
    execute(request, prepared, config, ctx)
}

fn prepare_set_membership<'a>(
    request: &OperationRequest<'a>,
    drop_low_bits: u32,
    drop_high_bits: u32,
    destination: &'a mut [u8],
    config: &EngineConfig,
) -> Result<SetMembership<'a>, AnalyticsError> {
    let second = validate(request, destination, true)?.ok_or(AnalyticsError::NullPointer("source-2"))?;
    let input = declared_source(request, config)?;
    let set = second_stream(request, second, None)?;
    let output = output_stream(request, destination, 1)?;
    SetMembership::new(input, set, output, drop_low_bits, drop_high_bits, operation_options(request, config))
}
