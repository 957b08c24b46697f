//! `set_membership`: looks every (bit-reduced) element up in a set given as
//! source-2 and emits the hit as one output bit.
//!
//! The set is a 1-bit stream of `2^N` elements, where `N` is what remains of
//! the element width after dropping its low and high bits.

use crate::analytics::find_unique::check_bit_output;
use crate::analytics::select::check_mask;
use crate::analytics::{
    check_index_range, descriptor_flags, finish, reduced_key, AggregateSink, AnalyticOperation,
    AnalyticOperationResult, OperationOptions,
};
use crate::error::AnalyticsError;
use crate::execution::hardware::{AnalyticsDescriptor, CompletionRecord, DescriptorParams, Opcode};
use crate::kernels::{Aggregates, KernelDispatcher};
use crate::streams::{InputStream, LimitedBuffer, OutputStream, PackSource};

pub struct SetMembership<'a> {
    input: InputStream<'a>,
    set: InputStream<'a>,
    output: OutputStream<'a>,
    drop_low: u32,
    drop_high: u32,
    shift: u32,
    key_mask: u32,
    set_bits: u32,
    options: OperationOptions,
}

impl<'a> SetMembership<'a> {
    pub fn new(
        input: InputStream<'a>,
        set: InputStream<'a>,
        output: OutputStream<'a>,
        drop_low: u32,
        drop_high: u32,
        options: OperationOptions,
    ) -> Result<Self, AnalyticsError> {
        let (shift, key_mask, set_bits) = reduced_key(input.bit_width(), drop_low, drop_high)?;
        check_mask(&set)?;
        if (set.element_count() as u64) < 1u64 << set_bits {
            return Err(AnalyticsError::Source2IsShort);
        }
        check_bit_output(&output)?;
        check_index_range(&output, input.element_count() as u64)?;
        Ok(Self { input, set, output, drop_low, drop_high, shift, key_mask, set_bits, options })
    }

    fn pipeline(&mut self, dispatcher: &KernelDispatcher) -> Result<Aggregates, AnalyticsError> {
        let set_size = 1usize << self.set_bits;
        let mut set = LimitedBuffer::for_lanes(set_size, 1);
        let loaded = self.set.unpack_up_to(dispatcher, &mut set, set_size)?.unpacked_elements;
        if loaded < set_size {
            return Err(AnalyticsError::Source2IsShort);
        }

        let bit_width = self.input.bit_width();
        let mut unpacked = LimitedBuffer::for_lanes(self.options.scratch_size, bit_width);
        let mut hits = LimitedBuffer::for_bits(unpacked.max_elements_count().div_ceil(8));
        let kernel = dispatcher.set_membership(bit_width);
        let mut aggregates = AggregateSink::bitmap(
            dispatcher,
            self.input.are_aggregates_disabled(),
            self.output.initial_output_index(),
        );

        while !self.input.is_processed() {
            let count = self.input.unpack(dispatcher, &mut unpacked)?.unpacked_elements;
            if count == 0 {
                return Err(AnalyticsError::SourceIsShort);
            }
            kernel(unpacked.bytes(), count, self.shift, self.key_mask, set.bytes(), hits.bytes_mut());
            aggregates.feed(hits.bytes(), count);
            self.output.perform_pack(dispatcher, PackSource::Bits(hits.bytes()), count)?;
        }
        Ok(aggregates.value())
    }
}

impl<'a> AnalyticOperation<'a> for SetMembership<'a> {
    fn name(&self) -> &'static str {
        "set_membership"
    }

    fn run_software(&mut self, dispatcher: &KernelDispatcher) -> AnalyticOperationResult {
        let outcome = self.pipeline(dispatcher);
        finish(self.name(), outcome, &mut self.input, &self.output)
    }

    fn descriptor(&self) -> AnalyticsDescriptor<'a> {
        AnalyticsDescriptor {
            opcode: Opcode::SetMembership,
            source1: self.input.describe(),
            source2: Some(self.set.describe()),
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
        self.set.rewind();
        self.output.rewind();
    }
}
