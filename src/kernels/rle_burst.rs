//! Run-length burst kernels: replicate each symbol by its counter.
//!
//! Counters arrive as raw lanes of 8, 16 or 32 bits in a caller-declared byte
//! order. 32-bit counters are cumulative: the repeat count of symbol `i` is
//! `counters[i + 1] - counters[i]`, so a chunk of `n` symbols reads `n + 1`
//! counters. The kernel is resumable: when the output fills up mid-burst the
//! remaining repeat count is parked in `BurstState` and the next call finishes
//! it before moving on.

use crate::error::AnalyticsError;
use crate::types::Lane;

/// Largest repeat count a single counter may request.
pub const MAX_BURST_COUNT: u32 = u16::MAX as u32;

/// Resume point inside one chunk of symbols.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BurstState {
    /// Repeats of `symbols[index]` still owed from a previous call.
    pub pending: u32,
    /// Index of the next symbol within the chunk.
    pub index: usize,
}

/// Outcome of one kernel call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BurstProgress {
    /// Output lanes written by this call.
    pub written: usize,
    /// True if the call stopped because `out` was full.
    pub output_full: bool,
}

pub type RleBurstFn = fn(
    counters: &[u8],
    counters_big_endian: bool,
    symbols: &[u8],
    elements: usize,
    out: &mut [u8],
    state: &mut BurstState,
) -> Result<BurstProgress, AnalyticsError>;

pub(crate) fn rle_burst<C: Lane, S: Lane, const CUMULATIVE: bool>(
    counters: &[u8],
    counters_big_endian: bool,
    symbols: &[u8],
    elements: usize,
    out: &mut [u8],
    state: &mut BurstState,
) -> Result<BurstProgress, AnalyticsError> {
    let symbols: &[S] = bytemuck::cast_slice(&symbols[..elements * S::BYTES]);
    let out_lanes = out.len() / S::BYTES;
    let out: &mut [S] = bytemuck::cast_slice_mut(&mut out[..out_lanes * S::BYTES]);
    let counter_at = |i: usize| C::read(&counters[i * C::BYTES..], counters_big_endian);

    let mut written = 0usize;

    if state.pending > 0 {
        let room = out.len() - written;
        let symbol = symbols[state.index];
        if state.pending as usize > room {
            out[written..].fill(symbol);
            state.pending -= room as u32;
            return Ok(BurstProgress { written: out.len(), output_full: true });
        }
        let count = state.pending as usize;
        out[written..written + count].fill(symbol);
        written += count;
        state.pending = 0;
        state.index += 1;
    }

    while state.index < elements {
        let count = if CUMULATIVE {
            let current = counter_at(state.index);
            let next = counter_at(state.index + 1);
            if next < current {
                return Err(AnalyticsError::InvalidRleCount(format!(
                    "cumulative counter decreases from {} to {}",
                    current, next
                )));
            }
            next - current
        } else {
            counter_at(state.index)
        };
        if count > MAX_BURST_COUNT {
            return Err(AnalyticsError::InvalidRleCount(format!(
                "burst of {} exceeds the limit of {}",
                count, MAX_BURST_COUNT
            )));
        }
        if count == 0 {
            state.index += 1;
            continue;
        }

        let room = out.len() - written;
        let symbol = symbols[state.index];
        if count as usize > room {
            out[written..].fill(symbol);
            state.pending = count - room as u32;
            return Ok(BurstProgress { written: out.len(), output_full: true });
        }
        out[written..written + count as usize].fill(symbol);
        written += count as usize;
        state.index += 1;
    }

    Ok(BurstProgress { written, output_full: false })
}

/// Rows: `u8`, `u16`, `u32` per-element counters, then cumulative `u32`.
/// Columns: `u8`, `u16`, `u32` symbol lanes.
pub(crate) fn table() -> [[RleBurstFn; 3]; 4] {
    [
        [rle_burst::<u8, u8, false>, rle_burst::<u8, u16, false>, rle_burst::<u8, u32, false>],
        [rle_burst::<u16, u8, false>, rle_burst::<u16, u16, false>, rle_burst::<u16, u32, false>],
        [rle_burst::<u32, u8, false>, rle_burst::<u32, u16, false>, rle_burst::<u32, u32, false>],
        [rle_burst::<u32, u8, true>, rle_burst::<u32, u16, true>, rle_burst::<u32, u32, true>],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_counters_replicate_and_drop_zeros() {
        let counters = [2u8, 0, 3];
        let symbols = [7u8, 8, 9];
        let mut out = [0u8; 16];
        let mut state = BurstState::default();
        let progress =
            rle_burst::<u8, u8, false>(&counters, false, &symbols, 3, &mut out, &mut state).unwrap();
        assert_eq!(progress, BurstProgress { written: 5, output_full: false });
        assert_eq!(&out[..5], &[7, 7, 9, 9, 9]);
    }

    #[test]
    fn test_cumulative_counters_use_deltas() {
        let counters: Vec<u8> = [0u32, 1, 1, 4].iter().flat_map(|c| c.to_le_bytes()).collect();
        let symbols: Vec<u16> = vec![100, 200, 300];
        let mut out = vec![0u16; 8];
        let mut state = BurstState::default();
        let progress = rle_burst::<u32, u16, true>(
            &counters,
            false,
            bytemuck::cast_slice(&symbols),
            3,
            bytemuck::cast_slice_mut(&mut out),
            &mut state,
        )
        .unwrap();
        assert_eq!(progress.written, 4);
        assert_eq!(&out[..4], &[100, 300, 300, 300]);
    }

    #[test]
    fn test_big_endian_counters() {
        let counters = [0x00u8, 0x03];
        let symbols = [5u8];
        let mut out = [0u8; 4];
        let mut state = BurstState::default();
        let progress =
            rle_burst::<u16, u8, false>(&counters, true, &symbols, 1, &mut out, &mut state).unwrap();
        assert_eq!(progress.written, 3);
    }

    #[test]
    fn test_resumes_after_output_fills() {
        let counters = [3u8, 2];
        let symbols = [1u8, 2];
        let mut out = [0u8; 2];
        let mut state = BurstState::default();
        let mut produced = Vec::new();
        loop {
            let progress =
                rle_burst::<u8, u8, false>(&counters, false, &symbols, 2, &mut out, &mut state).unwrap();
            produced.extend_from_slice(&out[..progress.written]);
            if !progress.output_full {
                break;
            }
        }
        assert_eq!(produced, vec![1, 1, 1, 2, 2]);
    }

    #[test]
    fn test_decreasing_cumulative_counter_is_rejected() {
        let counters: Vec<u8> = [0u32, 5, 2].iter().flat_map(|c| c.to_le_bytes()).collect();
        let symbols = [1u8, 2];
        let mut out = [0u8; 16];
        let mut state = BurstState::default();
        let result = rle_burst::<u32, u8, true>(&counters, false, &symbols, 2, &mut out, &mut state);
        assert!(matches!(result, Err(AnalyticsError::InvalidRleCount(_))));
    }
}
