//! The accelerator seam.
//!
//! The hardware path fills an `AnalyticsDescriptor` and hands it, together with
//! the destination, to an `Accelerator`. How the descriptor reaches a device
//! (work queues, portals, completion polling) is the accelerator's business;
//! the engine only reads back the `CompletionRecord`.

use serde::{Deserialize, Serialize};

use crate::analytics::{AnalyticOperationResult, Checksums};
use crate::config::{Comparison, CrcVariant, OutputBitWidth};
use crate::error::{AnalyticsError, STATUS_OK};
use crate::kernels::Aggregates;
use crate::types::StreamFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Opcode {
    Scan,
    Extract,
    Select,
    Expand,
    RleBurst,
    FindUnique,
    SetMembership,
}

/// One source stream as the device sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceDescriptor<'a> {
    pub bytes: &'a [u8],
    pub format: StreamFormat,
    pub bit_width: u32,
    pub element_count: u32,
    pub compressed: bool,
    pub prologue_bytes: u32,
    pub big_endian: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputDescriptor {
    pub capacity: usize,
    pub output_width: OutputBitWidth,
    pub nominal_bit_width: u32,
    pub big_endian: bool,
    pub initial_output_index: u32,
}

/// Operation parameters carried in the descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DescriptorParams {
    pub comparison: Option<Comparison>,
    pub param_low: u32,
    pub param_high: u32,
    pub drop_low_bits: u32,
    pub drop_high_bits: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DescriptorFlags {
    pub omit_checksums: bool,
    pub omit_aggregates: bool,
    pub crc: CrcVariant,
    pub force_array_output: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyticsDescriptor<'a> {
    pub opcode: Opcode,
    pub source1: SourceDescriptor<'a>,
    pub source2: Option<SourceDescriptor<'a>>,
    pub output: OutputDescriptor,
    pub params: DescriptorParams,
    pub flags: DescriptorFlags,
    /// Preferred NUMA node; `None` means no preference.
    pub numa_node: Option<u32>,
}

/// What the device reports back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    /// Numeric status; 0 is ok.
    pub status: u32,
    pub output_bytes: usize,
    pub output_elements: u64,
    /// Source-1 bytes the device consumed, also on failure.
    pub bytes_consumed: usize,
    pub last_bit_offset: u32,
    pub aggregates: Aggregates,
    pub crc32: u32,
    pub xor: u32,
}

impl CompletionRecord {
    pub fn into_result(self) -> AnalyticOperationResult {
        let status = match AnalyticsError::from_status_code(self.status) {
            None => Ok(()),
            Some(err) => Err(err),
        };
        AnalyticOperationResult {
            status,
            aggregates: self.aggregates,
            checksums: Checksums { crc32: self.crc32, xor: self.xor },
            output_bytes: self.output_bytes,
            last_bit_offset: self.last_bit_offset,
            output_elements: self.output_elements,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// A device (or a model of one) that executes analytics descriptors.
pub trait Accelerator: Send + Sync {
    /// Executes `descriptor`, writing output into `destination`. An `Err` means
    /// the descriptor never ran; a ran-and-failed job is a record with a
    /// non-zero status.
    fn submit(
        &self,
        descriptor: &AnalyticsDescriptor<'_>,
        destination: &mut [u8],
    ) -> Result<CompletionRecord, AnalyticsError>;
}

/// The accelerator of a machine without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAccelerator;

impl Accelerator for NoAccelerator {
    fn submit(
        &self,
        descriptor: &AnalyticsDescriptor<'_>,
        _destination: &mut [u8],
    ) -> Result<CompletionRecord, AnalyticsError> {
        log::debug!("no accelerator available for {:?}", descriptor.opcode);
        Err(AnalyticsError::HardwareNotSupported)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_status_becomes_error() {
        let record = CompletionRecord { status: 225, output_bytes: 3, ..Default::default() };
        let result = record.into_result();
        assert_eq!(result.status, Err(AnalyticsError::DestinationIsShort));
        assert_eq!(result.output_bytes, 3);

        let ok = CompletionRecord { crc32: 7, ..Default::default() }.into_result();
        assert!(ok.is_ok());
        assert_eq!(ok.checksums.crc32, 7);
    }
}
