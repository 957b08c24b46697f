//! `find_unique`: builds the set of distinct (bit-reduced) element values.
//!
//! Each element keeps the `N = bit_width - drop_low - drop_high` bits left
//! after dropping its low and high bits; bit `k` of the `2^N`-bit output is
//! set iff some element reduced to `k`.

use crate::analytics::{
    check_index_range, descriptor_flags, finish, reduced_key, AggregateSink, AnalyticOperation,
    AnalyticOperationResult, OperationOptions,
};
use crate::error::AnalyticsError;
use crate::execution::hardware::{AnalyticsDescriptor, CompletionRecord, DescriptorParams, Opcode};
use crate::kernels::{Aggregates, KernelDispatcher};
use crate::streams::{InputStream, LimitedBuffer, OutputStream, PackSource};

pub struct FindUnique<'a> {
    input: InputStream<'a>,
    output: OutputStream<'a>,
    drop_low: u32,
    drop_high: u32,
    shift: u32,
    key_mask: u32,
    set_bits: u32,
    options: OperationOptions,
}

pub(crate) fn check_bit_output(output: &OutputStream<'_>) -> Result<(), AnalyticsError> {
    if output.bit_width() != 1 && !output.is_index_output() {
        return Err(AnalyticsError::OutFormat("operation produces one bit per element".to_string()));
    }
    Ok(())
}

impl<'a> FindUnique<'a> {
    pub fn new(
        input: InputStream<'a>,
        output: OutputStream<'a>,
        drop_low: u32,
        drop_high: u32,
        options: OperationOptions,
    ) -> Result<Self, AnalyticsError> {
        let (shift, key_mask, set_bits) = reduced_key(input.bit_width(), drop_low, drop_high)?;
        check_bit_output(&output)?;
        check_index_range(&output, 1u64 << set_bits)?;
        Ok(Self { input, output, drop_low, drop_high, shift, key_mask, set_bits, options })
    }

    fn pipeline(&mut self, dispatcher: &KernelDispatcher) -> Result<Aggregates, AnalyticsError> {
        let bit_width = self.input.bit_width();
        let set_size = 1usize << self.set_bits;
        let mut unpacked = LimitedBuffer::for_lanes(self.options.scratch_size, bit_width);
        let mut set = LimitedBuffer::for_bits(set_size.div_ceil(8));
        let kernel = dispatcher.find_unique(bit_width);

        while !self.input.is_processed() {
            let count = self.input.unpack(dispatcher, &mut unpacked)?.unpacked_elements;
            if count == 0 {
                return Err(AnalyticsError::SourceIsShort);
            }
            kernel(unpacked.bytes(), count, self.shift, self.key_mask, set.bytes_mut());
        }

        let mut aggregates = AggregateSink::bitmap(
            dispatcher,
            self.input.are_aggregates_disabled(),
            self.output.initial_output_index(),
        );
        aggregates.feed(set.bytes(), set_size);
        self.output.perform_pack(dispatcher, PackSource::Bits(set.bytes()), set_size)?;
        Ok(aggregates.value())
    }
}

impl<'a> AnalyticOperation<'a> for FindUnique<'a> {
    fn name(&self) -> &'static str {
        "find_unique"
    }

    fn run_software(&mut self, dispatcher: &KernelDispatcher) -> AnalyticOperationResult {
        let outcome = self.pipeline(dispatcher);
        finish(self.name(), outcome, &mut self.input, &self.output)
    }

    fn descriptor(&self) -> AnalyticsDescriptor<'a> {
        AnalyticsDescriptor {
            opcode: Opcode::FindUnique,
            source1: self.input.describe(),
            source2: None,
            output: self.output.describe(),
            params: DescriptorParams {
                drop_low_bits: self.drop_low,
                drop_high_bits: self.drop_high,
                ..Default::default()
            },
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
