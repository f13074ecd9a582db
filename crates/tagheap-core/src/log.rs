//! Structured lifecycle records.
//!
//! Every public heap operation appends a record to an in-heap buffer that the
//! embedder can inspect or drain. Records are serde-serializable so the
//! harness can re-emit them as JSONL evidence.

use serde::{Deserialize, Serialize};

/// Severity of a lifecycle record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// One heap lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeapLogRecord {
    /// Monotonic decision/event id.
    pub decision_id: u64,
    /// Correlation id for this record.
    pub trace_id: String,
    /// Severity level.
    pub level: LogLevel,
    /// API symbol (`allocate`, `free`, `resize`, `extend`).
    pub symbol: &'static str,
    /// Event kind (`alloc`, `free`, `grow_in_place`, `oom`, ...).
    pub event: &'static str,
    /// Payload offset involved in the event.
    pub ptr: Option<usize>,
    /// Size value involved in the event.
    pub size: Option<usize>,
    /// Size-class bucket involved in the event.
    pub bucket: Option<usize>,
    /// Machine-readable outcome label.
    pub outcome: &'static str,
    /// Free-form details for debugging.
    pub details: String,
    /// Snapshot: live allocated block count.
    pub live_blocks: usize,
    /// Snapshot: live allocated bytes (block sizes, tags included).
    pub live_bytes: usize,
    /// Snapshot: total arena bytes.
    pub heap_bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_to_json() {
        let record = HeapLogRecord {
            decision_id: 7,
            trace_id: "tagheap::allocate::0000000000000007".to_string(),
            level: LogLevel::Trace,
            symbol: "allocate",
            event: "alloc",
            ptr: Some(96),
            size: Some(104),
            bucket: Some(3),
            outcome: "success",
            details: "path=fit".to_string(),
            live_blocks: 1,
            live_bytes: 104,
            heap_bytes: 4192,
        };
        let json = serde_json::to_string(&record).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["level"], "trace");
        assert_eq!(value["symbol"], "allocate");
        assert_eq!(value["ptr"], 96);
        assert_eq!(value["outcome"], "success");
    }
}
