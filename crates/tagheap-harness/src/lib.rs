//! Trace-replay conformance harness for the tagheap allocator.
//!
//! This crate provides:
//! - Trace fixtures: recorded allocate/free/resize workloads as JSON
//! - Replay: execute a trace against a fresh heap, verifying payload
//!   integrity and (optionally) every heap invariant after every op
//! - Synthesis: deterministic seeded workload generation
//! - Reports: human-readable markdown + machine-readable JSON
//! - Structured JSONL logging with schema validation

#![forbid(unsafe_code)]

pub mod report;
pub mod runner;
pub mod shared;
pub mod structured_log;
pub mod synth;
pub mod trace;

use thiserror::Error;

pub use report::{ReplayReport, fixture_digest};
pub use runner::TraceRunner;
pub use shared::SharedHeap;
pub use structured_log::{LogEmitter, LogEntry, Outcome, validate_log_line};
pub use synth::synth_trace;
pub use trace::{TraceOp, TraceSet};

/// Harness-level failure.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Filesystem problem reading or writing fixtures/reports.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed fixture or report JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
