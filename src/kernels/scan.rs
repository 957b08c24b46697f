//! Predicate kernels for `scan`: compare every lane against a boundary (or an
//! inclusive range) and write one result bit per element.

use bitvec::prelude::*;

use crate::config::Comparison;
use crate::types::Lane;

/// A resolved scan predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanPredicate {
    pub comparison: Comparison,
    /// Boundary for the single-value comparisons, lower bound for ranges.
    pub low: u32,
    /// Upper bound for `Range` / `NotRange`; ignored otherwise.
    pub high: u32,
}

impl ScanPredicate {
    pub fn new(comparison: Comparison, low: u32, high: u32) -> Self {
        Self { comparison, low, high }
    }

    #[inline]
    pub fn matches(&self, value: u32) -> bool {
        match self.comparison {
            Comparison::Lt => value < self.low,
            Comparison::Le => value <= self.low,
            Comparison::Gt => value > self.low,
            Comparison::Ge => value >= self.low,
            Comparison::Eq => value == self.low,
            Comparison::Ne => value != self.low,
            Comparison::Range => self.low <= value && value <= self.high,
            Comparison::NotRange => value < self.low || value > self.high,
        }
    }
}

/// Evaluates `predicate` on `count` lanes of `src`; bit `i` of `dst` (LSB-first)
/// receives the result for lane `i`.
pub type ScanFn = fn(src: &[u8], count: usize, predicate: &ScanPredicate, dst: &mut [u8]);

pub(crate) fn scan<T: Lane>(src: &[u8], count: usize, predicate: &ScanPredicate, dst: &mut [u8]) {
    let lanes: &[T] = bytemuck::cast_slice(&src[..count * T::BYTES]);
    let bits = &mut dst.view_bits_mut::<Lsb0>()[..count];
    for (mut bit, lane) in bits.iter_mut().zip(lanes) {
        *bit = predicate.matches(lane.widen());
    }
}

pub(crate) fn table() -> [ScanFn; 3] {
    [scan::<u8>, scan::<u16>, scan::<u32>]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates() {
        let p = |c, low, high| ScanPredicate::new(c, low, high);
        assert!(p(Comparison::Lt, 5, 0).matches(4));
        assert!(!p(Comparison::Lt, 5, 0).matches(5));
        assert!(p(Comparison::Le, 5, 0).matches(5));
        assert!(p(Comparison::Gt, 5, 0).matches(6));
        assert!(p(Comparison::Ge, 5, 0).matches(5));
        assert!(p(Comparison::Eq, 5, 0).matches(5));
        assert!(p(Comparison::Ne, 5, 0).matches(4));
        assert!(p(Comparison::Range, 3, 7).matches(7));
        assert!(!p(Comparison::Range, 3, 7).matches(8));
        assert!(p(Comparison::NotRange, 3, 7).matches(2));
        assert!(!p(Comparison::NotRange, 3, 7).matches(3));
    }

    #[test]
    fn test_scan_writes_lsb_first_bits() {
        let src: Vec<u16> = vec![1, 300, 2, 300, 300, 0, 0, 0, 300];
        let mut dst = [0u8; 2];
        let predicate = ScanPredicate::new(Comparison::Eq, 300, 0);
        table()[1](bytemuck::cast_slice(&src), src.len(), &predicate, &mut dst);
        assert_eq!(dst, [0b0001_1010, 0b0000_0001]);
    }
}
