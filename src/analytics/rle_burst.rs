//! `rle_burst`: replicates every symbol of source-2 by the matching counter
//! of source-1.
//!
//! Counters are read in one of three ways:
//!
//! - *simple*: uncompressed 8, 16 or 32-bit packed counters are read in place,
//!   straight from the source bytes.
//! - *inflate*: compressed counters are unpacked into a rolling window that is
//!   topped up whenever it holds fewer counters than the current symbol chunk
//!   needs.
//! - *prle*: parquet-RLE counters are decoded group by group into the same
//!   rolling window, with exactly as many counters fetched as the chunk needs.
//!
//! 32-bit counters are cumulative. Symbol `i` is repeated
//! `counters[i + 1] - counters[i]` times, the first counter must be zero and the
//! last symbol is never used, so a chunk of `m` symbols consumes `m + 1`
//! counters with the last one carried into the next chunk.

use crate::analytics::{descriptor_flags, finish, AggregateSink, AnalyticOperation, AnalyticOperationResult, OperationOptions};
use crate::error::AnalyticsError;
use crate::execution::hardware::{AnalyticsDescriptor, CompletionRecord, DescriptorParams, Opcode};
use crate::kernels::{Aggregates, BurstState, KernelDispatcher, RleBurstFn};
use crate::streams::{InputStream, LimitedBuffer, OutputStream, PackSource};
use crate::types::{lane_bytes, StreamFormat};

/// How counters reach the burst kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CounterPipeline {
    Simple,
    Inflate,
    Prle,
}

pub struct RleBurst<'a> {
    counters: InputStream<'a>,
    symbols: InputStream<'a>,
    output: OutputStream<'a>,
    pipeline: CounterPipeline,
    cumulative: bool,
    options: OperationOptions,
}

impl<'a> RleBurst<'a> {
    pub fn new(
        counters: InputStream<'a>,
        symbols: InputStream<'a>,
        output: OutputStream<'a>,
        options: OperationOptions,
    ) -> Result<Self, AnalyticsError> {
        let counter_bits = counters.bit_width();
        let pipeline = match (counters.stream_format(), counters.is_compressed()) {
            (StreamFormat::ParquetRle, false) => CounterPipeline::Prle,
            (_, true) => CounterPipeline::Inflate,
            (_, false) => CounterPipeline::Simple,
        };
        if counters.stream_format() != StreamFormat::ParquetRle && !matches!(counter_bits, 8 | 16 | 32) {
            return Err(AnalyticsError::BitWidth(counter_bits));
        }
        let cumulative = counter_bits == 32;
        if cumulative && counters.element_count() < 2 {
            return Err(AnalyticsError::Size(format!(
                "cumulative counters need at least 2 elements, got {}",
                counters.element_count()
            )));
        }
        if output.describe().nominal_bit_width != symbols.bit_width() {
            return Err(AnalyticsError::OutFormat(format!(
                "output is declared for {}-bit elements, symbols have {}",
                output.describe().nominal_bit_width,
                symbols.bit_width()
            )));
        }
        Ok(Self { counters, symbols, output, pipeline, cumulative, options })
    }

    fn pipeline(&mut self, dispatcher: &KernelDispatcher) -> Result<Aggregates, AnalyticsError> {
        log::debug!(
            "rle_burst: {:?} counters, {} bits, cumulative {}",
            self.pipeline,
            self.counters.bit_width(),
            self.cumulative
        );
        if self.cumulative {
            // The last symbol has no closing counter.
            self.symbols.add_elements_processed(1);
        }

        let symbol_bits = self.symbols.bit_width();
        let mut symbols = LimitedBuffer::for_lanes(self.options.scratch_size, symbol_bits);
        let mut burst = Burst {
            kernel: dispatcher.rle_burst(self.counters.bit_width(), symbol_bits),
            out: LimitedBuffer::for_lanes(self.options.scratch_size, symbol_bits),
            aggregates: AggregateSink::lanes(
                dispatcher,
                self.counters.are_aggregates_disabled(),
                symbol_bits,
                self.output.initial_output_index(),
            ),
        };

        match self.pipeline {
            CounterPipeline::Simple => self.run_simple(dispatcher, &mut symbols, &mut burst)?,
            CounterPipeline::Inflate | CounterPipeline::Prle => self.run_staged(dispatcher, &mut symbols, &mut burst)?,
        }
        Ok(burst.aggregates.value())
    }

    /// Reads the next chunk of symbols; an empty chunk before the end is a
    /// short source-2.
    fn next_symbols(&mut self, dispatcher: &KernelDispatcher, symbols: &mut LimitedBuffer) -> Result<usize, AnalyticsError> {
        let count = self.symbols.unpack(dispatcher, symbols)?.unpacked_elements;
        if count == 0 {
            return Err(AnalyticsError::Source2IsShort);
        }
        Ok(count)
    }

    fn run_simple(
        &mut self,
        dispatcher: &KernelDispatcher,
        symbols: &mut LimitedBuffer,
        burst: &mut Burst,
    ) -> Result<(), AnalyticsError> {
        let counter_bytes = lane_bytes(self.counters.bit_width());
        let big_endian = self.counters.stream_format() == StreamFormat::BigEndian;
        let extra = self.cumulative as usize;
        let mut first = true;

        while !self.symbols.is_processed() {
            let count = self.next_symbols(dispatcher, symbols)?;
            let counters = self.counters.peek_bytes((count + extra) * counter_bytes)?;
            if first && self.cumulative {
                check_leading_counter(counters, big_endian)?;
                first = false;
            }
            burst.run(dispatcher, &mut self.output, counters, big_endian, symbols.bytes(), count)?;
            self.counters.shift_current_ptr(count * counter_bytes);
            self.counters.add_elements_processed(count as u32);
        }
        if self.cumulative {
            self.counters.peek_bytes(counter_bytes)?;
            self.counters.shift_current_ptr(counter_bytes);
            self.counters.add_elements_processed(1);
        }
        Ok(())
    }

    fn run_staged(
        &mut self,
        dispatcher: &KernelDispatcher,
        symbols: &mut LimitedBuffer,
        burst: &mut Burst,
    ) -> Result<(), AnalyticsError> {
        let counter_bytes = lane_bytes(self.counters.bit_width());
        let extra = self.cumulative as usize;
        // Unpacked counters are native lanes whatever the wire order was.
        let native_big_endian = cfg!(target_endian = "big");
        let mut window = LimitedBuffer::for_lanes((symbols.max_elements_count() + 1) * counter_bytes, self.counters.bit_width());
        let mut held = 0usize;
        let mut first = true;

        while !self.symbols.is_processed() {
            let count = self.next_symbols(dispatcher, symbols)?;
            let need = count + extra;
            while held < need {
                window.set_byte_shift(held * counter_bytes)?;
                let got = self.counters.unpack_up_to(dispatcher, &mut window, need - held)?.unpacked_elements;
                if got == 0 {
                    return Err(AnalyticsError::SourceIsShort);
                }
                held += got;
            }
            if first && self.cumulative {
                check_leading_counter(window.bytes(), native_big_endian)?;
                first = false;
            }
            burst.run(dispatcher, &mut self.output, &window.bytes()[..need * counter_bytes], native_big_endian, symbols.bytes(), count)?;

            window.bytes_mut().copy_within(count * counter_bytes..held * counter_bytes, 0);
            held -= count;
        }
        Ok(())
    }
}

/// The burst kernel together with its output staging.
struct Burst {
    kernel: RleBurstFn,
    out: LimitedBuffer,
    aggregates: AggregateSink,
}

impl Burst {
    /// Expands one chunk of symbols, flushing the staging buffer each time the
    /// kernel fills it.
    fn run(
        &mut self,
        dispatcher: &KernelDispatcher,
        output: &mut OutputStream<'_>,
        counters: &[u8],
        big_endian: bool,
        symbols: &[u8],
        count: usize,
    ) -> Result<(), AnalyticsError> {
        let mut state = BurstState::default();
        loop {
            let progress = (self.kernel)(counters, big_endian, symbols, count, self.out.bytes_mut(), &mut state)?;
            self.aggregates.feed(self.out.bytes(), progress.written);
            output.perform_pack(dispatcher, PackSource::Lanes(self.out.view(progress.written)?), progress.written)?;
            if !progress.output_full {
                return Ok(());
            }
        }
    }
}

fn check_leading_counter(counters: &[u8], big_endian: bool) -> Result<(), AnalyticsError> {
    let raw: [u8; 4] = counters
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or(AnalyticsError::SourceIsShort)?;
    let first = if big_endian { u32::from_be_bytes(raw) } else { u32::from_le_bytes(raw) };
    if first != 0 {
        return Err(AnalyticsError::InvalidRleCount(format!("first cumulative counter is {}, expected 0", first)));
    }
    Ok(())
}

impl<'a> AnalyticOperation<'a> for RleBurst<'a> {
    fn name(&self) -> &'static str {
        "rle_burst"
    }

    fn run_software(&mut self, dispatcher: &KernelDispatcher) -> AnalyticOperationResult {
        let outcome = self.pipeline(dispatcher);
        finish(self.name(), outcome, &mut self.counters, &self.output)
    }

    fn descriptor(&self) -> AnalyticsDescriptor<'a> {
        AnalyticsDescriptor {
            opcode: Opcode::RleBurst,
            source1: self.counters.describe(),
            source2: Some(self.symbols.describe()),
            output: self.output.describe(),
            params: DescriptorParams::default(),
            flags: descriptor_flags(&self.counters, &self.options),
            numa_node: None,
        }
    }

    fn destination_mut(&mut self) -> &mut [u8] {
        self.output.destination_mut()
    }

    fn apply_hardware_progress(&mut self, record: &CompletionRecord) -> Result<(), AnalyticsError> {
        self.counters.apply_external_progress(record.bytes_consumed)
    }

    fn rewind(&mut self) {
        self.counters.rewind();
        self.symbols.rewind();
        self.output.rewind();
    }
}
