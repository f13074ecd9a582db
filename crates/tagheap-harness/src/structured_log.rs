//! Structured logging contract for replay workflows.
//!
//! Provides:
//! - [`LogEntry`]: canonical JSONL log record with required + optional fields.
//! - [`LogEmitter`]: writes JSONL lines to a file or an in-memory buffer.
//! - [`validate_log_line`]: validates a single JSONL line against the schema.
//!
//! Heap lifecycle records from the core crate convert losslessly into
//! entries, so one log stream carries both harness-level events (replay
//! started, report written) and per-operation allocator decisions.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

use tagheap_core::{HeapLogRecord, LogLevel};
use thiserror::Error;

/// Test/verification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
    Skip,
    Error,
}

/// Canonical structured log entry.
///
/// Required fields: `timestamp`, `trace_id`, `level`, `event`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    // Required
    pub timestamp: String,
    pub trace_id: String,
    pub level: LogLevel,
    pub event: String,

    // Optional
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ptr: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl LogEntry {
    /// Create a new log entry with required fields only.
    #[must_use]
    pub fn new(trace_id: impl Into<String>, level: LogLevel, event: impl Into<String>) -> Self {
        Self {
            timestamp: now_utc(),
            trace_id: trace_id.into(),
            level,
            event: event.into(),
            symbol: None,
            ptr: None,
            size: None,
            bucket: None,
            outcome: None,
            details: None,
        }
    }

    /// Attach an outcome.
    #[must_use]
    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    /// Attach free-form details.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Serialize to a single JSONL line.
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl From<&HeapLogRecord> for LogEntry {
    fn from(record: &HeapLogRecord) -> Self {
        Self {
            timestamp: now_utc(),
            trace_id: record.trace_id.clone(),
            level: record.level,
            event: record.event.to_string(),
            symbol: Some(record.symbol.to_string()),
            ptr: record.ptr,
            size: record.size,
            bucket: record.bucket,
            outcome: None,
            details: Some(serde_json::json!({
                "outcome": record.outcome,
                "details": record.details,
                "live_blocks": record.live_blocks,
                "live_bytes": record.live_bytes,
                "heap_bytes": record.heap_bytes,
            })),
        }
    }
}

/// Writes JSONL log lines.
pub struct LogEmitter {
    writer: Box<dyn Write>,
    seq: u64,
    run_id: String,
}

impl LogEmitter {
    /// Create an emitter that writes to a file.
    pub fn to_file(path: &Path, run_id: &str) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self {
            writer: Box::new(std::io::BufWriter::new(file)),
            seq: 0,
            run_id: run_id.to_string(),
        })
    }

    /// Create an emitter that writes to an in-memory buffer (for testing).
    #[must_use]
    pub fn to_buffer(run_id: &str) -> Self {
        Self {
            writer: Box::new(Vec::new()),
            seq: 0,
            run_id: run_id.to_string(),
        }
    }

    /// Generate the next trace ID.
    fn next_trace_id(&mut self) -> String {
        self.seq += 1;
        format!("{}::{:03}", self.run_id, self.seq)
    }

    /// Emit a log entry with an auto-generated trace id.
    pub fn emit(&mut self, level: LogLevel, event: &str) -> std::io::Result<LogEntry> {
        let trace_id = self.next_trace_id();
        let entry = LogEntry::new(trace_id, level, event);
        self.emit_entry(&entry)?;
        Ok(entry)
    }

    /// Emit a fully-populated log entry.
    pub fn emit_entry(&mut self, entry: &LogEntry) -> std::io::Result<()> {
        let line = entry.to_jsonl().map_err(std::io::Error::other)?;
        writeln!(self.writer, "{line}")
    }

    /// Flush the underlying writer.
    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

/// Schema violation in a JSONL log line.
#[derive(Debug, Error)]
pub enum LogValidationError {
    #[error("line is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("required field `{0}` is missing or empty")]
    MissingField(&'static str),
}

/// Validates a single JSONL line against the log schema.
pub fn validate_log_line(line: &str) -> Result<LogEntry, LogValidationError> {
    let entry: LogEntry = serde_json::from_str(line)?;
    if entry.timestamp.is_empty() {
        return Err(LogValidationError::MissingField("timestamp"));
    }
    if entry.trace_id.is_empty() {
        return Err(LogValidationError::MissingField("trace_id"));
    }
    if entry.event.is_empty() {
        return Err(LogValidationError::MissingField("event"));
    }
    Ok(entry)
}

fn now_utc() -> String {
    // Simple format without an external chrono dependency.
    let duration = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();
    // Approximate UTC formatting (good enough for structured logs).
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        1970 + secs / 31_557_600,
        (secs % 31_557_600) / 2_629_800 + 1,
        (secs % 2_629_800) / 86400 + 1,
        (secs % 86400) / 3600,
        (secs % 3600) / 60,
        secs % 60,
        millis,
    )
}
