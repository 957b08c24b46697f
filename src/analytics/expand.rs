//! `expand`: the inverse of `select`. Walks the source-2 mask and writes,
//! per mask bit, the next source element (bit set) or zero (bit clear). The
//! output has as many elements as the mask.

use crate::analytics::select::{check_mask, check_value_output};
use crate::analytics::{
    check_index_range, descriptor_flags, finish, AggregateSink, AnalyticOperation, AnalyticOperationResult,
    OperationOptions,
};
use crate::error::AnalyticsError;
use crate::execution::hardware::{AnalyticsDescriptor, CompletionRecord, DescriptorParams, Opcode};
use crate::kernels::{Aggregates, KernelDispatcher};
use crate::streams::{InputStream, LimitedBuffer, OutputStream, PackSource};
use crate::types::lane_bytes;

pub struct Expand<'a> {
    input: InputStream<'a>,
    mask: InputStream<'a>,
    output: OutputStream<'a>,
    options: OperationOptions,
}

impl<'a> Expand<'a> {
    pub fn new(
        input: InputStream<'a>,
        mask: InputStream<'a>,
        output: OutputStream<'a>,
        options: OperationOptions,
    ) -> Result<Self, AnalyticsError> {
        check_mask(&mask)?;
        check_value_output(&input, &output)?;
        check_index_range(&output, mask.element_count() as u64)?;
        Ok(Self { input, mask, output, options })
    }

    fn pipeline(&mut self, dispatcher: &KernelDispatcher) -> Result<Aggregates, AnalyticsError> {
        let bit_width = self.input.bit_width();
        let lane = lane_bytes(bit_width);
        let mut unpacked = LimitedBuffer::for_lanes(self.options.scratch_size, bit_width);
        let chunk = unpacked.max_elements_count();
        let mut mask = LimitedBuffer::for_lanes(chunk, 1);
        let mut expanded = LimitedBuffer::for_lanes(chunk * lane, bit_width);
        let kernel = dispatcher.expand(bit_width);
        let mut aggregates = AggregateSink::lanes(
            dispatcher,
            self.input.are_aggregates_disabled(),
            bit_width,
            self.output.initial_output_index(),
        );

        while !self.mask.is_processed() {
            // The mask buffer may round up past `chunk`; never read more mask
            // bits than there are source and output lanes.
            let count = self.mask.unpack_up_to(dispatcher, &mut mask, chunk)?.unpacked_elements;
            if count == 0 {
                return Err(AnalyticsError::Source2IsShort);
            }
            let needed = mask.bytes()[..count].iter().filter(|&&bit| bit != 0).count();
            if needed > 0 {
                let got = self.input.unpack_up_to(dispatcher, &mut unpacked, needed)?.unpacked_elements;
                if got < needed {
                    return Err(AnalyticsError::SourceIsShort);
                }
            }
            kernel(&unpacked.bytes()[..needed * lane], mask.bytes(), count, expanded.bytes_mut());
            aggregates.feed(expanded.bytes(), count);
            self.output.perform_pack(dispatcher, PackSource::Lanes(expanded.view(count)?), count)?;
        }
        Ok(aggregates.value())
    }
}

impl<'a> AnalyticOperation<'a> for Expand<'a> {
    fn name(&self) -> &'static str {
        "expand"
    }

    fn run_software(&mut self, dispatcher: &KernelDispatcher) -> AnalyticOperationResult {
        let outcome = self.pipeline(dispatcher);
        finish(self.name(), outcome, &mut self.input, &self.output)
    }

    fn descriptor(&self) -> AnalyticsDescriptor<'a> {
        AnalyticsDescriptor {
            opcode: Opcode::Expand,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::test_support::{bitmap, pack_le};
    use crate::analytics::Select;
    use crate::config::OutputBitWidth;
    use crate::types::StreamFormat;

    fn mask_stream(bytes: &[u8], count: u32) -> InputStream<'_> {
        InputStream::builder(bytes)
            .stream_format(StreamFormat::LittleEndian, 1)
            .element_count(count)
            .build()
            .unwrap()
    }

    fn run_expand(source: &[u8], bit_width: u32, count: u32, mask: &[u8], mask_count: u32, dest: &mut [u8], scratch: usize) -> AnalyticOperationResult {
        let input = InputStream::builder(source)
            .stream_format(StreamFormat::LittleEndian, bit_width)
            .element_count(count)
            .build()
            .unwrap();
        let output = OutputStream::builder(dest).bit_format(OutputBitWidth::Nominal, bit_width).build().unwrap();
        let options = OperationOptions { scratch_size: scratch, ..Default::default() };
        Expand::new(input, mask_stream(mask, mask_count), output, options)
            .unwrap()
            .run_software(KernelDispatcher::global())
    }

    #[test]
    fn test_inserts_zeros_where_mask_is_clear() {
        let source = [7u8, 8, 9];
        let mask = bitmap(&[false, true, true, false, false, true]);
        let mut dest = [0xFFu8; 6];
        let result = run_expand(&source, 8, 3, &mask, 6, &mut dest, 64);
        assert!(result.is_ok());
        assert_eq!(result.output_elements, 6);
        assert_eq!(dest, [0, 7, 8, 0, 0, 9]);
    }

    #[test]
    fn test_scratch_size_not_a_multiple_of_four() {
        let values: Vec<u16> = (0..40).map(|i| 1000 + i).collect();
        let source: Vec<u8> = bytemuck::cast_slice(&values).to_vec();
        let mask = bitmap(&[true; 40]);
        let mut dest = vec![0u8; 80];
        let result = run_expand(&source, 16, 40, &mask, 40, &mut dest, 66);
        assert!(result.is_ok());
        assert_eq!(result.output_elements, 40);
        assert_eq!(dest, source);
    }

    #[test]
    fn test_source_shorter_than_mask_set_bits() {
        let source = [7u8];
        let mask = bitmap(&[true, true]);
        let mut dest = [0u8; 2];
        let result = run_expand(&source, 8, 1, &mask, 2, &mut dest, 64);
        assert_eq!(result.status, Err(AnalyticsError::SourceIsShort));
    }

    #[test]
    fn test_expand_then_select_round_trips() {
        let values: Vec<u32> = (0..300).map(|i| (i * 13) % 2048).collect();
        let source = pack_le(&values, 11);
        let pattern: Vec<bool> = (0..700).map(|i| i % 7 == 1 || i % 3 == 0).collect();
        let set = pattern.iter().filter(|&&b| b).count();
        assert!(set >= 300);
        let mut trimmed = pattern.clone();
        let mut seen = 0;
        for bit in trimmed.iter_mut() {
            if *bit {
                seen += 1;
                if seen > 300 {
                    *bit = false;
                }
            }
        }
        let mask = bitmap(&trimmed);

        let mut expanded = vec![0u8; (700 * 11usize).div_ceil(8)];
        let result = run_expand(&source, 11, 300, &mask, 700, &mut expanded, 64);
        assert!(result.is_ok());

        let mut selected = vec![0u8; source.len()];
        let input = InputStream::builder(&expanded)
            .stream_format(StreamFormat::LittleEndian, 11)
            .element_count(700)
            .build()
            .unwrap();
        let output = OutputStream::builder(&mut selected).bit_format(OutputBitWidth::Nominal, 11).build().unwrap();
        let mut select = Select::new(input, mask_stream(&mask, 700), output, OperationOptions::default()).unwrap();
        let result = select.run_software(KernelDispatcher::global());
        assert!(result.is_ok());
        assert_eq!(result.output_elements, 300);
        drop(select);
        assert_eq!(selected, source);
    }
}
