//! `scan`: evaluates a comparison against every element and emits the result
//! as a bitmap, or as the indices of matching elements when a fixed output
//! width is requested.

use crate::analytics::{
    check_index_range, descriptor_flags, finish, AggregateSink, AnalyticOperation, AnalyticOperationResult,
    OperationOptions,
};
use crate::config::Comparison;
use crate::error::AnalyticsError;
use crate::execution::hardware::{AnalyticsDescriptor, CompletionRecord, DescriptorParams, Opcode};
use crate::kernels::{Aggregates, KernelDispatcher, ScanPredicate};
use crate::streams::{InputStream, LimitedBuffer, OutputStream, PackSource};

pub struct Scan<'a> {
    input: InputStream<'a>,
    output: OutputStream<'a>,
    predicate: ScanPredicate,
    options: OperationOptions,
}

impl<'a> Scan<'a> {
    /// `low` is the boundary of single-sided comparisons; `high` is used only
    /// by the range variants.
    pub fn new(
        input: InputStream<'a>,
        output: OutputStream<'a>,
        comparison: Comparison,
        low: u32,
        high: u32,
        options: OperationOptions,
    ) -> Result<Self, AnalyticsError> {
        if output.bit_width() != 1 && !output.is_index_output() {
            return Err(AnalyticsError::OutFormat("scan produces one bit per element".to_string()));
        }
        check_index_range(&output, input.element_count() as u64)?;
        Ok(Self { input, output, predicate: ScanPredicate::new(comparison, low, high), options })
    }

    fn pipeline(&mut self, dispatcher: &KernelDispatcher) -> Result<Aggregates, AnalyticsError> {
        let bit_width = self.input.bit_width();
        let mut unpacked = LimitedBuffer::for_lanes(self.options.scratch_size, bit_width);
        let mut bitmap = LimitedBuffer::for_bits(unpacked.max_elements_count().div_ceil(8));
        let kernel = dispatcher.scan(bit_width);
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
            kernel(unpacked.bytes(), count, &self.predicate, bitmap.bytes_mut());
            aggregates.feed(bitmap.bytes(), count);
            self.output.perform_pack(dispatcher, PackSource::Bits(bitmap.bytes()), count)?;
        }
        Ok(aggregates.value())
    }
}

impl<'a> AnalyticOperation<'a> for Scan<'a> {
    fn name(&self) -> &'static str {
        "scan"
    }

    fn run_software(&mut self, dispatcher: &KernelDispatcher) -> AnalyticOperationResult {
        let outcome = self.pipeline(dispatcher);
        finish(self.name(), outcome, &mut self.input, &self.output)
    }

    fn descriptor(&self) -> AnalyticsDescriptor<'a> {
        AnalyticsDescriptor {
            opcode: Opcode::Scan,
            source1: self.input.describe(),
            source2: None,
            output: self.output.describe(),
            params: DescriptorParams {
                comparison: Some(self.predicate.comparison),
                param_low: self.predicate.low,
                param_high: self.predicate.high,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::test_support::{pack_le, set_bits};
    use crate::config::OutputBitWidth;
    use crate::types::StreamFormat;

    fn run_scan(
        source: &[u8],
        bit_width: u32,
        comparison: Comparison,
        low: u32,
        high: u32,
        width: OutputBitWidth,
        dest: &mut [u8],
        scratch_size: usize,
    ) -> AnalyticOperationResult {
        let input = InputStream::builder(source)
            .stream_format(StreamFormat::LittleEndian, bit_width)
            .build()
            .unwrap();
        let output = OutputStream::builder(dest).bit_format(width, 1).build().unwrap();
        let options = OperationOptions { scratch_size, ..Default::default() };
        let mut scan = Scan::new(input, output, comparison, low, high, options).unwrap();
        scan.run_software(KernelDispatcher::global())
    }

    #[test]
    fn test_greater_than_over_byte_ramp() {
        let source: Vec<u8> = (0..=255u8).collect();
        let mut dest = [0u8; 32];
        let result = run_scan(&source, 8, Comparison::Gt, 250, 0, OutputBitWidth::Nominal, &mut dest, 64);
        assert!(result.is_ok());
        assert_eq!(result.output_bytes, 32);
        assert_eq!(result.last_bit_offset, 0);
        assert_eq!(set_bits(&dest, 256), vec![251, 252, 253, 254, 255]);
        assert_eq!(result.aggregates.min_value, 251);
        assert_eq!(result.aggregates.max_value, 255);
        assert_eq!(result.aggregates.sum, 5);
    }

    #[test]
    fn test_equality_marks_exact_matches() {
        let values = [3u32, 9, 3, 0, 3, 7, 1];
        let source = pack_le(&values, 4);
        let mut dest = [0u8; 1];
        let result = run_scan(&source, 4, Comparison::Eq, 3, 0, OutputBitWidth::Nominal, &mut dest, 64);
        assert!(result.is_ok());
        assert_eq!(result.last_bit_offset, 0);
        assert_eq!(set_bits(&dest, 8), vec![0, 2, 4]);
    }

    #[test]
    fn test_range_to_index_vector() {
        let source: Vec<u8> = vec![5, 50, 15, 10, 20, 21];
        let mut dest = [0u8; 8];
        let result = run_scan(&source, 8, Comparison::Range, 10, 20, OutputBitWidth::Bits8, &mut dest, 64);
        assert!(result.is_ok());
        assert_eq!(result.output_elements, 3);
        assert_eq!(&dest[..result.output_bytes], &[2, 3, 4]);
    }

    #[test]
    fn test_index_vector_overflow_is_checked_up_front() {
        let source = vec![0u8; 300];
        let mut dest = [0u8; 300];
        let input = InputStream::builder(&source).build().unwrap();
        let output = OutputStream::builder(&mut dest).bit_format(OutputBitWidth::Bits8, 1).build().unwrap();
        let result = Scan::new(input, output, Comparison::Eq, 1, 0, OperationOptions::default());
        assert!(matches!(result, Err(AnalyticsError::OutputOverflow { index: 299, max: 255 })));
    }

    #[test]
    fn test_result_is_chunk_invariant() {
        let source: Vec<u8> = (0..2000u32).map(|i| (i * 37 % 256) as u8).collect();
        let mut results = Vec::new();
        for scratch in [64usize, 256, 16 * 1024] {
            let mut dest = vec![0u8; 1000];
            let result = run_scan(&source, 5, Comparison::Lt, 9, 0, OutputBitWidth::Nominal, &mut dest, scratch);
            assert!(result.is_ok());
            results.push((result, dest));
        }
        assert_eq!(results[0], results[1]);
        assert_eq!(results[1], results[2]);
    }

    #[test]
    fn test_short_destination() {
        let source = [1u8; 16];
        let mut dest = [0u8; 1];
        let result = run_scan(&source, 8, Comparison::Eq, 1, 0, OutputBitWidth::Nominal, &mut dest, 64);
        assert_eq!(result.status, Err(AnalyticsError::DestinationIsShort));
    }
}
