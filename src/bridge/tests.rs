use super::*;
use crate::analytics::test_support::{pack_le, set_bits};
use crate::config::{
    Comparison, CompressionWrapper, EngineConfig, ExecutionPath, OperationFlags, OutputBitWidth, ParserFormat,
};
use crate::error::AnalyticsError;
use crate::execution::ExecutionContext;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;

fn software() -> EngineConfig {
    EngineConfig { execution_path: ExecutionPath::Software, ..Default::default() }
}

fn ctx() -> ExecutionContext<'static> {
    ExecutionContext::new()
}

fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

#[test]
fn test_scan_greater_than_on_byte_ramp() {
    let source: Vec<u8> = (0..=255).collect();
    let mut dest = [0u8; 32];
    let request = OperationRequest::new(&source, 8);
    let result = scan(&request, Comparison::Gt, 250, 0, &mut dest, &EngineConfig::default(), &ctx());
    assert!(result.is_ok());
    assert_eq!(result.output_bytes, 32);
    assert_eq!(result.output_elements, 256);
    assert_eq!(set_bits(&dest, 256), vec![251, 252, 253, 254, 255]);
    assert_eq!((result.aggregates.min_value, result.aggregates.max_value, result.aggregates.sum), (251, 255, 5));
    assert_eq!(result.checksums.crc32, crc32fast::hash(&source));
}

#[test]
fn test_scan_equal_marks_exact_matches() {
    let values = [3u32, 7, 3, 0, 3, 15, 1];
    let source = pack_le(&values, 4);
    let mut dest = [0u8; 1];
    let request = OperationRequest::new(&source, 4).with_element_count(7);
    let result = scan(&request, Comparison::Eq, 3, 0, &mut dest, &software(), &ctx());
    assert!(result.is_ok());
    assert_eq!(result.last_bit_offset, 7);
    assert_eq!(set_bits(&dest, 7), vec![0, 2, 4]);
}

#[test]
fn test_find_unique_of_four_bit_values() {
    let source = pack_le(&[1, 1, 2, 0, 1], 4);
    let mut dest = [0xFFu8; 2];
    let request = OperationRequest::new(&source, 4).with_element_count(5);
    let result = find_unique(&request, 0, 0, &mut dest, &software(), &ctx());
    assert!(result.is_ok());
    assert_eq!(result.output_bytes, 2);
    assert_eq!(dest, [0b0000_0111, 0]);
}

#[test]
fn test_find_unique_rejects_dropping_every_bit() {
    let source = [1u8, 2, 3];
    let mut dest = [0u8; 4];
    let request = OperationRequest::new(&source, 8);
    let result = find_unique(&request, 6, 2, &mut dest, &software(), &ctx());
    assert_eq!(result.status_code(), 73);
}

#[test]
fn test_extract_inverted_range_is_empty_success() {
    let source = [1u8, 2, 3, 4];
    let mut dest = [0u8; 4];
    let request = OperationRequest::new(&source, 8);
    let result = extract(&request, 3, 1, &mut dest, &software(), &ctx());
    assert!(result.is_ok());
    assert_eq!(result.output_bytes, 0);
    assert_eq!(result.output_elements, 0);
}

#[test]
fn test_expand_then_select_restores_source() {
    let values: Vec<u32> = (0..12).map(|i| (i * 7 + 3) % 32).collect();
    let source = pack_le(&values, 5);
    let mask_bits: Vec<bool> = (0..20).map(|i| i % 5 != 1 && i % 5 != 3).collect();
    assert_eq!(mask_bits.iter().filter(|&&b| b).count(), 12);
    let mask = crate::analytics::test_support::bitmap(&mask_bits);

    let mut expanded = vec![0u8; 13];
    let request = OperationRequest::new(&source, 5).with_element_count(20).with_source2(&mask, 1);
    let result = expand(&request, &mut expanded, &software(), &ctx());
    assert!(result.is_ok());
    assert_eq!(result.output_elements, 20);
    assert_eq!(result.output_bytes, 13);

    let mut selected = vec![0u8; source.len()];
    let request = OperationRequest::new(&expanded, 5).with_element_count(20).with_source2(&mask, 1);
    let result = select(&request, &mut selected, &software(), &ctx());
    assert!(result.is_ok());
    assert_eq!(result.output_elements, 12);
    assert_eq!(selected, source);
}

#[test]
fn test_expand_with_odd_scratch_size_from_json() {
    let config = EngineConfig::from_json(r#"{"execution_path": "software", "scratch_buffer_size": 66}"#).unwrap();
    let values: Vec<u16> = (0..40).map(|i| 500 + i * 3).collect();
    let source: Vec<u8> = bytemuck::cast_slice(&values).to_vec();
    let mask = crate::analytics::test_support::bitmap(&[true; 40]);
    let mut dest = vec![0u8; 80];
    let request = OperationRequest::new(&source, 16).with_element_count(40).with_source2(&mask, 1);
    let result = expand(&request, &mut dest, &config, &ctx());
    assert!(result.is_ok());
    assert_eq!(result.output_elements, 40);
    assert_eq!(dest, source);
}

#[test]
fn test_select_without_mask_is_null_pointer() {
    let source = [1u8, 2, 3];
    let mut dest = [0u8; 3];
    let request = OperationRequest::new(&source, 8);
    let result = select(&request, &mut dest, &software(), &ctx());
    assert_eq!(result.status, Err(AnalyticsError::NullPointer("source-2")));
    assert_eq!(result.status_code(), 50);
}

#[test]
fn test_rle_burst_output_count_is_counter_sum() {
    let counters = [3u8, 0, 2, 1];
    let symbols = [10u8, 20, 30, 40];
    let mut dest = [0u8; 8];
    let request = OperationRequest::new(&counters, 8).with_source2(&symbols, 8);
    let result = rle_burst(&request, &mut dest, &software(), &ctx());
    assert!(result.is_ok());
    assert_eq!(result.output_elements, 6);
    assert_eq!(&dest[..6], &[10, 10, 10, 30, 30, 40]);
}

#[test]
fn test_rle_burst_cumulative_output_count_is_counter_span() {
    let totals = [0u32, 4, 4, 9];
    let counters: Vec<u8> = totals.iter().flat_map(|t| t.to_le_bytes()).collect();
    let symbols = [1u8, 2, 3, 4];
    let mut dest = [0u8; 16];
    let request = OperationRequest::new(&counters, 32).with_source2(&symbols, 8);
    let result = rle_burst(&request, &mut dest, &software(), &ctx());
    assert!(result.is_ok());
    assert_eq!(result.output_elements, (totals[3] - totals[0]) as u64);

    let nonzero: Vec<u8> = [5u32, 6, 7].iter().flat_map(|t| t.to_le_bytes()).collect();
    let request = OperationRequest::new(&nonzero, 32).with_source2(&symbols[..3], 8);
    let result = rle_burst(&request, &mut dest, &software(), &ctx());
    assert_eq!(result.status_code(), 234);
}

#[test]
fn test_set_membership_against_mask_set() {
    let source = [0u8, 1, 2, 3, 4, 5, 6, 7];
    let set = [0b1010_0101u8];
    let mut dest = [0u8; 1];
    let request = OperationRequest::new(&source, 8).with_source2(&set, 1);
    let result = set_membership(&request, 0, 5, &mut dest, &software(), &ctx());
    assert!(result.is_ok());
    assert_eq!(set_bits(&dest, 8), vec![0, 2, 5, 7]);
}

#[test]
fn test_index_output_overflow() {
    let source = vec![9u8; 300];
    let mut dest = vec![0u8; 300];
    let request = OperationRequest::new(&source, 8).with_output(OutputBitWidth::Bits8, 0);
    let result = scan(&request, Comparison::Eq, 9, 0, &mut dest, &software(), &ctx());
    assert_eq!(result.status, Err(AnalyticsError::OutputOverflow { index: 299, max: 255 }));
    assert_eq!(result.status_code(), 221);
}

#[test]
fn test_declared_count_beyond_source_is_short() {
    let source = [1u8, 2, 3, 4];
    let mut dest = [0u8; 4];
    let request = OperationRequest::new(&source, 8).with_element_count(10);
    let result = scan(&request, Comparison::Lt, 3, 0, &mut dest, &software(), &ctx());
    assert_eq!(result.status_code(), 232);
}

#[test]
fn test_bit_width_out_of_range() {
    let source = [1u8, 2, 3, 4];
    let mut dest = [0u8; 4];
    let request = OperationRequest::new(&source, 0);
    let result = scan(&request, Comparison::Lt, 3, 0, &mut dest, &software(), &ctx());
    assert_eq!(result.status, Err(AnalyticsError::BitWidth(0)));
}

#[test]
fn test_parquet_rle_source_through_bridge() {
    let source = crate::streams::prle_encode::prle(
        4,
        &[crate::streams::prle_encode::Chunk::Run(9, 5), crate::streams::prle_encode::Chunk::Packed(&[1, 9, 2])],
    );
    let mut dest = [0u8; 2];
    let request = OperationRequest::new(&source, 0).with_parser(ParserFormat::ParquetRle).with_element_count(8);
    let result = scan(&request, Comparison::Eq, 9, 0, &mut dest, &software(), &ctx());
    assert!(result.is_ok());
    assert_eq!(set_bits(&dest, 8), vec![0, 1, 2, 3, 4, 6]);
}

#[test]
fn test_decompression_on_software_path_is_not_supported() {
    let plain: Vec<u8> = (0..=255).collect();
    let compressed = gzip(&plain);
    let flags = OperationFlags { decompress: true, compression: CompressionWrapper::Gzip, ..Default::default() };
    let request = OperationRequest::new(&compressed, 8).with_element_count(256).with_flags(flags);
    let mut dest = [0u8; 32];
    let result = scan(&request, Comparison::Ge, 128, 0, &mut dest, &software(), &ctx());
    assert!(matches!(result.status, Err(AnalyticsError::NotSupported(_))));
    assert_eq!(result.status_code(), 52);
}

#[test]
fn test_auto_path_decompresses_through_software_fallback() {
    let plain: Vec<u8> = (0..=255).collect();
    let compressed = gzip(&plain);
    let flags = OperationFlags { decompress: true, compression: CompressionWrapper::Gzip, ..Default::default() };
    let request = OperationRequest::new(&compressed, 8).with_element_count(256).with_flags(flags);
    let mut dest = [0u8; 32];
    let result = scan(&request, Comparison::Ge, 128, 0, &mut dest, &EngineConfig::default(), &ctx());
    assert!(result.is_ok());
    assert_eq!(result.aggregates.sum, 128);
    assert_eq!(result.checksums.crc32, crc32fast::hash(&plain));
    assert_eq!(set_bits(&dest, 256), (128..256).collect::<Vec<_>>());
}

#[test]
fn test_hardware_path_without_device() {
    let source = [1u8, 2, 3, 4];
    let mut dest = [0u8; 4];
    let config = EngineConfig { execution_path: ExecutionPath::Hardware, ..Default::default() };
    let request = OperationRequest::new(&source, 8);
    let result = scan(&request, Comparison::Lt, 3, 0, &mut dest, &config, &ctx());
    assert_eq!(result.status_code(), 500);
}

#[test]
fn test_forced_array_with_nominal_output_is_out_format() {
    let source = [1u8, 2, 3, 4];
    let mut dest = [0u8; 4];
    let flags = OperationFlags { force_array_output: true, ..Default::default() };
    let request = OperationRequest::new(&source, 8).with_flags(flags);
    let result = scan(&request, Comparison::Lt, 3, 0, &mut dest, &software(), &ctx());
    assert!(matches!(result.status, Err(AnalyticsError::OutFormat(_))));
    assert_eq!(result.status_code(), 72);
}

#[test]
fn test_dropped_prologue_bytes() {
    let source = [0xEEu8, 0xEE, 5, 6, 7];
    let mut dest = [0u8; 8];
    let flags = OperationFlags { drop_initial_bytes: 2, ..Default::default() };
    let request = OperationRequest::new(&source, 8).with_flags(flags).with_output(OutputBitWidth::Bits8, 0);
    let result = extract(&request, 0, 2, &mut dest, &software(), &ctx());
    assert!(result.is_ok());
    assert_eq!(&dest[..3], &[5, 6, 7]);

    let too_many = OperationFlags { drop_initial_bytes: 9, ..Default::default() };
    let request = OperationRequest::new(&source, 8).with_flags(too_many);
    let result = extract(&request, 0, 2, &mut dest, &software(), &ctx());
    assert_eq!(result.status_code(), 75);
}

#[test]
fn test_engine_config_from_json_drives_the_path() {
    let config = EngineConfig::from_json(r#"{"execution_path": "software", "scratch_buffer_size": 64}"#).unwrap();
    let source: Vec<u8> = (0..200).collect();
    let mut dest = [0u8; 25];
    let request = OperationRequest::new(&source, 8);
    let result = scan(&request, Comparison::Range, 10, 19, &mut dest, &config, &ExecutionContext::new().configured(&config));
    assert!(result.is_ok());
    assert_eq!(set_bits(&dest, 200), (10..20).collect::<Vec<_>>());
}
