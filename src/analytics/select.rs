//! `select`: keeps the source elements whose companion mask bit is set.
//!
//! The mask is source-2, a 1-bit stream read in step with the source. The
//! output holds as many elements as the mask has set bits.

use crate::analytics::{
    check_index_range, descriptor_flags, finish, AggregateSink, AnalyticOperation, AnalyticOperationResult,
    OperationOptions,
};
use crate::error::AnalyticsError;
use crate::execution::hardware::{AnalyticsDescriptor, CompletionRecord, DescriptorParams, Opcode};
use crate::kernels::{Aggregates, KernelDispatcher};
use crate::streams::{InputStream, LimitedBuffer, OutputStream, PackSource};

pub struct Select<'a> {
    input: InputStream<'a>,
    mask: InputStream<'a>,
    output: OutputStream<'a>,
    options: OperationOptions,
}

pub(crate) fn check_mask(mask: &InputStream<'_>) -> Result<(), AnalyticsError> {
    if mask.bit_width() != 1 {
        return Err(AnalyticsError::BitWidth(mask.bit_width()));
    }
    if mask.is_compressed() || mask.stream_format().is_self_describing() {
        return Err(AnalyticsError::Parser("source-2 must be a packed bit array".to_string()));
    }
    Ok(())
}

pub(crate) fn check_value_output(input: &InputStream<'_>, output: &OutputStream<'_>) -> Result<(), AnalyticsError> {
    let nominal = output.describe().nominal_bit_width;
    if nominal != input.bit_width() {
        return Err(AnalyticsError::OutFormat(format!(
            "output is declared for {}-bit elements, source has {}",
            nominal,
            input.bit_width()
        )));
    }
    Ok(())
}

impl<'a> Select<'a> {
    pub fn new(
        input: InputStream<'a>,
        mask: InputStream<'a>,
        output: OutputStream<'a>,
        options: OperationOptions,
    ) -> Result<Self, AnalyticsError> {
        check_mask(&mask)?;
        check_value_output(&input, &output)?;
        check_index_range(&output, input.element_count() as u64)?;
        Ok(Self { input, mask, output, options })
    }

    fn pipeline(&mut self, dispatcher: &KernelDispatcher) -> Result<Aggregates, AnalyticsError> {
        let bit_width = self.input.bit_width();
        let mut unpacked = LimitedBuffer::for_lanes(self.options.scratch_size, bit_width);
        let mut mask = LimitedBuffer::for_lanes(unpacked.max_elements_count(), 1);
        let mut selected = LimitedBuffer::for_lanes(self.options.scratch_size, bit_width);
        let kernel = dispatcher.select(bit_width);
        let mut aggregates = AggregateSink::lanes(
            dispatcher,
            self.input.are_aggregates_disabled(),
            bit_width,
            self.output.initial_output_index(),
        );

        while !self.input.is_processed() {
            let count = self.input.unpack(dispatcher, &mut unpacked)?.unpacked_elements;
            if count == 0 {
                return Err(AnalyticsError::SourceIsShort);
            }
            let mask_count = self.mask.unpack_up_to(dispatcher, &mut mask, count)?.unpacked_elements;
            if mask_count < count {
                return Err(AnalyticsError::Source2IsShort);
            }
            let written = kernel(unpacked.bytes(), mask.bytes(), count, selected.bytes_mut());
            aggregates.feed(selected.bytes(), written);
            self.output.perform_pack(dispatcher, PackSource::Lanes(selected.view(written)?), written)?;
        }
        Ok(aggregates.value())
    }
}

impl<'a> AnalyticOperation<'a> for Select<'a> {
    fn name(&self) -> &'static str {
        "select"
    }

    fn run_software(&mut self, dispatcher: &KernelDispatcher) -> AnalyticOperationResult {
        let outcome = self.pipeline(dispatcher);
        finish(self.name(), outcome, &mut self.input, &self.output)
    }

    fn descriptor(&self) -> AnalyticsDescriptor<'a> {
        AnalyticsDescriptor {
            opcode: Opcode::Select,
            source1: self.input.describe(),
            source2: Some(self.mask.describe()),
            output: self.output.describe(),
            params: DescriptorParams::default(),
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
        self.mask.rewind();
        self.output.rewind();
    }
}
