//! This module defines the core, strongly-typed data representations shared by
//! streams, kernels and operations.
//!
//! It includes the `StreamFormat` of a source, and the `Lane` abstraction over
//! the fixed-width native integers elements are unpacked into.

pub mod lane;
pub mod stream_format;

// Re-export the main type(s) for easier access.
pub use lane::{lane_bytes, lane_index, Lane, Lanes};
pub use stream_format::StreamFormat;
