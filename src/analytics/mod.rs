//! This module holds the analytic operations and the pieces they share.
//!
//! Every operation owns its streams and runs the same loop on the software
//! path: unpack a chunk from the input stream, apply one dispatcher kernel,
//! pack the produced chunk into the output stream and fold it into the
//! aggregates. The outcome, success or not, is returned by value as an
//! `AnalyticOperationResult`. Operations also know how to describe themselves
//! to an accelerator and how to rewind, which is all `execution` needs to run
//! them on any path.

use serde::{Deserialize, Serialize};

use crate::error::{status_of, AnalyticsError};
use crate::execution::hardware::{AnalyticsDescriptor, CompletionRecord, DescriptorFlags};
use crate::kernels::{AggregatesFn, KernelDispatcher};
use crate::streams::{InputStream, OutputStream};

pub use crate::kernels::Aggregates;

//==================================================================================
// 1. Module Declarations
//==================================================================================
pub mod expand;
pub mod extract;
pub mod find_unique;
pub mod rle_burst;
pub mod scan;
pub mod select;
pub mod set_membership;

pub use expand::Expand;
pub use extract::Extract;
pub use find_unique::FindUnique;
pub use rle_burst::RleBurst;
pub use scan::Scan;
pub use select::Select;
pub use set_membership::SetMembership;

//==================================================================================
// 2. Results & Options
//==================================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksums {
    pub crc32: u32,
    pub xor: u32,
}

/// The outcome of one operation on one execution path.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticOperationResult {
    pub status: Result<(), AnalyticsError>,
    pub aggregates: Aggregates,
    pub checksums: Checksums,
    /// Bytes written to the destination. Not a consistent prefix on error.
    pub output_bytes: usize,
    /// Valid bits in the last byte of a bitmap output; 0 if the byte is full.
    pub last_bit_offset: u32,
    pub output_elements: u64,
}

impl AnalyticOperationResult {
    pub fn status_code(&self) -> u32 {
        status_of(&self.status)
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }

    pub(crate) fn failed(err: AnalyticsError) -> Self {
        Self {
            status: Err(err),
            aggregates: Aggregates::default(),
            checksums: Checksums::default(),
            output_bytes: 0,
            last_bit_offset: 0,
            output_elements: 0,
        }
    }
}

/// Knobs shared by every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationOptions {
    /// Size in bytes of each scratch buffer the software path allocates.
    pub scratch_size: usize,
    /// Hardware only: emit an array even where a bitmap is nominal.
    pub force_array_output: bool,
}

impl Default for OperationOptions {
    fn default() -> Self {
        Self { scratch_size: 16 * 1024, force_array_output: false }
    }
}

//==================================================================================
// 3. The Operation Seam
//==================================================================================

/// An operation ready to run on any execution path.
///
/// `'a` is the lifetime of the caller's byte ranges, so a descriptor can be
/// built while the destination is borrowed mutably for submission.
pub trait AnalyticOperation<'a> {
    fn name(&self) -> &'static str;

    /// Runs the portable pipeline to completion.
    fn run_software(&mut self, dispatcher: &KernelDispatcher) -> AnalyticOperationResult;

    /// Describes the operation for an accelerator submission.
    fn descriptor(&self) -> AnalyticsDescriptor<'a>;

    fn destination_mut(&mut self) -> &mut [u8];

    /// Carries the input progress of a failed accelerator attempt into the
    /// streams, as a device sharing the caller's buffers would leave them.
    fn apply_hardware_progress(&mut self, record: &CompletionRecord) -> Result<(), AnalyticsError>;

    /// Returns every stream to its construction state.
    fn rewind(&mut self);
}

//==================================================================================
// 4. Shared Pipeline Helpers
//==================================================================================

/// Running aggregates over the produced chunks of one run.
pub(crate) struct AggregateSink {
    kernel: AggregatesFn,
    offset: u32,
    value: Aggregates,
}

impl AggregateSink {
    /// Aggregates over a bitmap result.
    pub fn bitmap(dispatcher: &KernelDispatcher, disabled: bool, initial_output_index: u32) -> Self {
        let kernel = if disabled { dispatcher.aggregates_disabled() } else { dispatcher.aggregates_bits() };
        Self { kernel, offset: initial_output_index, value: Aggregates::default() }
    }

    /// Aggregates over `bit_width`-bit values held in lanes.
    pub fn lanes(dispatcher: &KernelDispatcher, disabled: bool, bit_width: u32, initial_output_index: u32) -> Self {
        let kernel = if disabled { dispatcher.aggregates_disabled() } else { dispatcher.aggregates_lanes(bit_width) };
        Self { kernel, offset: initial_output_index, value: Aggregates::default() }
    }

    pub fn feed(&mut self, chunk: &[u8], count: usize) {
        (self.kernel)(chunk, count, self.offset, &mut self.value);
        self.offset = self.offset.wrapping_add(count as u32);
    }

    pub fn value(&self) -> Aggregates {
        self.value
    }
}

/// Folds a finished run into its result record. Checksums are finalized only
/// for runs that completed.
pub(crate) fn finish(
    name: &str,
    outcome: Result<Aggregates, AnalyticsError>,
    input: &mut InputStream<'_>,
    output: &OutputStream<'_>,
) -> AnalyticOperationResult {
    match outcome {
        Ok(aggregates) => {
            input.calculate_checksums();
            log::info!(
                "{}: done, {} elements in {} bytes",
                name,
                output.elements_written(),
                output.bytes_written()
            );
            AnalyticOperationResult {
                status: Ok(()),
                aggregates,
                checksums: Checksums { crc32: input.crc_checksum(), xor: input.xor_checksum() },
                output_bytes: output.bytes_written(),
                last_bit_offset: output.last_bit_offset(),
                output_elements: output.elements_written(),
            }
        }
        Err(err) => {
            log::debug!("{}: failed with {}", name, err);
            AnalyticOperationResult { output_bytes: output.bytes_written(), ..AnalyticOperationResult::failed(err) }
        }
    }
}

pub(crate) fn descriptor_flags(input: &InputStream<'_>, options: &OperationOptions) -> DescriptorFlags {
    DescriptorFlags {
        omit_checksums: input.are_checksums_disabled(),
        omit_aggregates: input.are_aggregates_disabled(),
        crc: input.crc_variant(),
        force_array_output: options.force_array_output,
    }
}

/// Fails with `OutputOverflow` if `count` 1-bit results cannot all be
/// addressed by the output's index width.
pub(crate) fn check_index_range(output: &OutputStream<'_>, count: u64) -> Result<(), AnalyticsError> {
    if !output.is_index_output() || count == 0 {
        return Ok(());
    }
    let last = output.initial_output_index() as u64 + count - 1;
    let max = output.output_width().max_index();
    if last > max {
        return Err(AnalyticsError::OutputOverflow { index: last, max });
    }
    Ok(())
}

/// Validates dropped bits and returns `(shift, mask, set_bits)`.
pub(crate) fn reduced_key(bit_width: u32, drop_low: u32, drop_high: u32) -> Result<(u32, u32, u32), AnalyticsError> {
    let dropped = drop_low.saturating_add(drop_high);
    if dropped >= bit_width {
        return Err(AnalyticsError::DropBitsOverflow { dropped, bit_width });
    }
    let set_bits = bit_width - dropped;
    if !(1..=MAX_SET_BITS).contains(&set_bits) {
        return Err(AnalyticsError::BitWidth(set_bits));
    }
    Ok((drop_low, (1u32 << set_bits) - 1, set_bits))
}

/// Widest reduced key a set may be indexed by.
pub const MAX_SET_BITS: u32 = 15;


#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputBitWidth;

    #[test]
    fn test_reduced_key_bounds() {
        assert_eq!(reduced_key(8, 2, 1).unwrap(), (2, 0x1F, 5));
        assert!(matches!(reduced_key(8, 4, 4), Err(AnalyticsError::DropBitsOverflow { dropped: 8, bit_width: 8 })));
        assert!(matches!(reduced_key(20, 0, 0), Err(AnalyticsError::BitWidth(20))));
        assert!(reduced_key(16, 1, 0).is_ok());
    }

    #[test]
    fn test_index_range_check() {
        let mut dest = [0u8; 4];
        let output = OutputStream::builder(&mut dest)
            .bit_format(OutputBitWidth::Bits8, 1)
            .initial_output_index(200)
            .build()
            .unwrap();
        assert!(check_index_range(&output, 56).is_ok());
        assert_eq!(
            check_index_range(&output, 57),
            Err(AnalyticsError::OutputOverflow { index: 256, max: 255 })
        );
    }

    #[test]
    fn test_failed_result_reports_status() {
        let result = AnalyticOperationResult::failed(AnalyticsError::SourceIsShort);
        assert_eq!(result.status_code(), 232);
        assert!(!result.is_ok());
    }
}
