//! This file is the root of the `tambak_analytics` Rust crate.
//!
//! Its responsibilities are strictly limited to:
//! 1.  Declaring all the top-level modules of the library (`streams`, `kernels`,
//!     `analytics`, etc.) so the Rust compiler knows they exist.
//! 2.  Re-exporting the handful of types most callers need, so that
//!     `use tambak_analytics::{...}` is enough for the one-shot API.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
//==================================================================================
// 1. Module Declarations
//==================================================================================
#[macro_use]
mod observability; // Make macros available throughout the crate

pub mod analytics;
pub mod bridge;
pub mod config;
pub mod error;
pub mod execution;
pub mod kernels;
pub mod streams;
pub mod types;
pub mod utils;

//==================================================================================
// 2. Public Surface
//==================================================================================
pub use analytics::{AnalyticOperation, AnalyticOperationResult, Aggregates, Checksums, OperationOptions};
pub use bridge::{OperationRequest, SecondSource};
pub use config::{
    Comparison, CompressionWrapper, CrcVariant, DecompressEndPolicy, EngineConfig, ExecutionPath,
    FallbackPolicy, OperationFlags, OutputBitWidth, ParserFormat,
};
pub use error::AnalyticsError;
pub use execution::{Accelerator, ExecutionContext, NoAccelerator};
pub use kernels::KernelDispatcher;
pub use observability::init_logging;
