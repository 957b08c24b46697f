// In: src/bridge/mod.rs

// ====================================================================================
// ARCHITECTURAL OVERVIEW: The Bridge Layer
// ====================================================================================
//
// The `bridge` is the one-shot public API of the analytics engine. A caller hands
// over byte ranges and a description of them; the bridge turns that into streams,
// an operation and an execution path, and hands back a result record. It is the
// boundary where caller mistakes become status codes.
//
// Data Flow:
//
//   1. [Stateless API (scan, extract, ...)]  -> Receives `OperationRequest` + destination
//         |
//         `-> a. `request::validate`: overlap, empty buffers, missing source-2
//         |
//         `-> b. Builds `InputStream`s / `OutputStream` (bit width, parser, element
//         |      count, prologue and decompression settings are checked here)
//         |
//         `-> c. Builds the operation (`analytics::*::new`), which checks the
//         |      operation-specific shape of its streams
//         |
//   2. [Execution (execution::run)]          -> software, hardware or auto
//         |
//         `-> Returns `AnalyticOperationResult` by value
//
// Scratch buffers are sized from `EngineConfig` inside the operation and dropped
// when the call returns.
// ====================================================================================
pub mod request;
pub mod stateless_api;

pub use request::{OperationRequest, SecondSource};
pub use stateless_api::{expand, extract, find_unique, rle_burst, scan, select, set_membership};

#[cfg(test)]
mod tests;
