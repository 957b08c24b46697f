//! `extract`: copies the elements at positions `[lower, upper]` (inclusive)
//! to the output, unchanged or zero-extended to a fixed output width.
//!
//! An inverted range succeeds without reading the source: no output, zero
//! checksums and all-zero aggregates.

use crate::analytics::{
    check_index_range, descriptor_flags, finish, AggregateSink, AnalyticOperation, AnalyticOperationResult,
    OperationOptions,
};
use crate::error::AnalyticsError;
use crate::execution::hardware::{AnalyticsDescriptor, CompletionRecord, DescriptorParams, Opcode};
use crate::kernels::{Aggregates, KernelDispatcher};
use crate::streams::{InputStream, LimitedBuffer, OutputStream, PackSource};
use crate::types::lane_bytes;

pub struct Extract<'a> {
    input: InputStream<'a>,
    output: OutputStream<'a>,
    lower: u32,
    upper: u32,
    options: OperationOptions,
}

impl<'a> Extract<'a> {
    pub fn new(
        input: InputStream<'a>,
        output: OutputStream<'a>,
        lower: u32,
        upper: u32,
        options: OperationOptions,
    ) -> Result<Self, AnalyticsError> {
        if output.describe().nominal_bit_width != input.bit_width() {
            return Err(AnalyticsError::OutFormat(format!(
                "output is declared for {}-bit elements, source has {}",
                output.describe().nominal_bit_width,
                input.bit_width()
            )));
        }
        let count = input.element_count();
        if lower <= upper && lower < count {
            check_index_range(&output, (upper.min(count - 1) - lower) as u64 + 1)?;
        }
        Ok(Self { input, output, lower, upper, options })
    }

    fn pipeline(&mut self, dispatcher: &KernelDispatcher) -> Result<Aggregates, AnalyticsError> {
        if self.lower > self.upper {
            log::debug!("extract: empty range [{}, {}]", self.lower, self.upper);
            return Ok(Aggregates { min_value: 0, ..Aggregates::default() });
        }
        let bit_width = self.input.bit_width();
        let mut aggregates = AggregateSink::lanes(
            dispatcher,
            self.input.are_aggregates_disabled(),
            bit_width,
            self.output.initial_output_index(),
        );

        let lane = lane_bytes(bit_width);
        let mut unpacked = LimitedBuffer::for_lanes(self.options.scratch_size, bit_width);
        let (lower, upper) = (self.lower as u64, self.upper as u64);
        let mut position = 0u64;

        while !self.input.is_processed() {
            let count = self.input.unpack(dispatcher, &mut unpacked)?.unpacked_elements;
            if count == 0 {
                return Err(AnalyticsError::SourceIsShort);
            }
            let chunk_end = position + count as u64;
            let from = lower.max(position);
            let to = (upper + 1).min(chunk_end);
            if from < to {
                let (a, b) = ((from - position) as usize, (to - position) as usize);
                aggregates.feed(&unpacked.bytes()[a * lane..], b - a);
                let lanes = unpacked.view(count)?.slice(a, b);
                self.output.perform_pack(dispatcher, PackSource::Lanes(lanes), b - a)?;
            }
            position = chunk_end;
        }
        Ok(aggregates.value())
    }
}

impl<'a> AnalyticOperation<'a> for Extract<'a> {
    fn name(&self) -> &'static str {
        "extract"
    }

    fn run_software(&mut self, dispatcher: &KernelDispatcher) -> AnalyticOperationResult {
        let outcome = self.pipeline(dispatcher);
        finish(self.name(), outcome, &mut self.input, &self.output)
    }

    fn descriptor(&self) -> AnalyticsDescriptor<'a> {
        AnalyticsDescriptor {
            opcode: Opcode::Extract,
            source1: self.input.describe(),
            source2: None,
            output: self.output.describe(),
            params: DescriptorParams { param_low: self.lower, param_high: self.upper, ..Default::default() },
            flags: descriptor_flags(&self.input, &self.options),
            numa_node: None,
        }
    }

    fn destination_mut(&mut self) -> &mut [u8] {
        self.output.destination_mut()
    }

    fn apply_hardware_progress(&mut self, record: &CompletionRecord) -> Result<(), AnalyticsError> {
        self.input.apply_external_progress(record.bytes_consumed)
    }

    fn rewind(&mut self) {
        self.input.rewind();
        self.output.rewind();
    }
}
