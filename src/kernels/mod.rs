//! This module serves as the public API and dispatcher for every pure,
//! stateless kernel the analytics pipelines apply.
//!
//! The `KernelDispatcher` holds read-only function tables keyed by bit width,
//! lane width or (counter, symbol) width pairs. It is built once, either
//! explicitly with `KernelDispatcher::new()` and passed by reference, or lazily
//! through `KernelDispatcher::global()`, which is safe to race on first use.

use std::sync::OnceLock;

use crate::types::lane_index;

//==================================================================================
// 1. Module Declarations
//==================================================================================

/// Bit-level transport
pub mod pack;
pub mod unpack;
pub mod leb128;

/// Filters and transforms
pub mod scan;
pub mod select_expand;
pub mod rle_burst;
pub mod find_unique;
pub mod set_membership;

/// Bookkeeping
pub mod aggregates;

pub use aggregates::{Aggregates, AggregatesFn};
pub use find_unique::FindUniqueFn;
pub use pack::PackFn;
pub use rle_burst::{BurstProgress, BurstState, RleBurstFn};
pub use scan::{ScanFn, ScanPredicate};
pub use select_expand::{ExpandFn, SelectFn};
pub use set_membership::SetMembershipFn;
pub use unpack::UnpackFn;

/// Widest element any kernel handles.
pub const MAX_BIT_WIDTH: u32 = 32;

//==================================================================================
// 2. The Dispatcher
//==================================================================================

/// Immutable kernel lookup tables.
#[derive(Debug)]
pub struct KernelDispatcher {
    unpack_le: [UnpackFn; 33],
    unpack_be: [UnpackFn; 33],
    pack_le: [PackFn; 33],
    pack_be: [PackFn; 33],
    scan: [ScanFn; 3],
    select: [SelectFn; 3],
    expand: [ExpandFn; 3],
    aggregates: [AggregatesFn; 5],
    rle_burst: [[RleBurstFn; 3]; 4],
    find_unique: [FindUniqueFn; 33],
    set_membership: [SetMembershipFn; 3],
}

static GLOBAL_DISPATCHER: OnceLock<KernelDispatcher> = OnceLock::new();

fn width_slot(bit_width: u32) -> usize {
    debug_assert!(
        (1..=MAX_BIT_WIDTH).contains(&bit_width),
        "bit width {} reached the dispatcher unvalidated",
        bit_width
    );
    if (1..=MAX_BIT_WIDTH).contains(&bit_width) {
        bit_width as usize
    } else {
        0
    }
}

impl KernelDispatcher {
    pub fn new() -> Self {
        log::debug!("building kernel dispatcher tables");
        Self {
            unpack_le: unpack::le_table(),
            unpack_be: unpack::be_table(),
            pack_le: pack::le_table(),
            pack_be: pack::be_table(),
            scan: scan::table(),
            select: select_expand::select_table(),
            expand: select_expand::expand_table(),
            aggregates: aggregates::table(),
            rle_burst: rle_burst::table(),
            find_unique: find_unique::table(),
            set_membership: set_membership::table(),
        }
    }

    /// The lazily-built, process-wide instance.
    pub fn global() -> &'static KernelDispatcher {
        GLOBAL_DISPATCHER.get_or_init(KernelDispatcher::new)
    }

    pub fn unpack(&self, big_endian: bool, bit_width: u32) -> UnpackFn {
        let slot = width_slot(bit_width);
        if big_endian {
            self.unpack_be[slot]
        } else {
            self.unpack_le[slot]
        }
    }

    pub fn pack(&self, big_endian: bool, bit_width: u32) -> PackFn {
        let slot = width_slot(bit_width);
        if big_endian {
            self.pack_be[slot]
        } else {
            self.pack_le[slot]
        }
    }

    pub fn scan(&self, bit_width: u32) -> ScanFn {
        self.scan[lane_index(bit_width)]
    }

    pub fn select(&self, bit_width: u32) -> SelectFn {
        self.select[lane_index(bit_width)]
    }

    pub fn expand(&self, bit_width: u32) -> ExpandFn {
        self.expand[lane_index(bit_width)]
    }

    /// Aggregates over a 1-bit-per-element chunk.
    pub fn aggregates_bits(&self) -> AggregatesFn {
        self.aggregates[0]
    }

    /// Aggregates over lanes holding `bit_width`-bit values. 1-bit values are
    /// folded as bitmap positions.
    pub fn aggregates_lanes(&self, bit_width: u32) -> AggregatesFn {
        if bit_width == 1 {
            return self.aggregates[4];
        }
        self.aggregates[1 + lane_index(bit_width)]
    }

    /// Aggregates stub used when the caller omits aggregates.
    pub fn aggregates_disabled(&self) -> AggregatesFn {
        aggregates::aggregates_noop
    }

    /// Burst kernel for counters of `counter_bit_width` bits and symbols of
    /// `symbol_bit_width` bits. 32-bit counters select the cumulative kernel.
    pub fn rle_burst(&self, counter_bit_width: u32, symbol_bit_width: u32) -> RleBurstFn {
        let row = if counter_bit_width == 32 { 3 } else { lane_index(counter_bit_width) };
        self.rle_burst[row][lane_index(symbol_bit_width)]
    }

    pub fn find_unique(&self, bit_width: u32) -> FindUniqueFn {
        self.find_unique[width_slot(bit_width)]
    }

    pub fn set_membership(&self, bit_width: u32) -> SetMembershipFn {
        self.set_membership[lane_index(bit_width)]
    }
}

impl Default for KernelDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
