//! Trace fixture loading and management.
//!
//! A trace is a recorded allocator workload: a sequence of allocate, free,
//! and resize operations over trace-local block ids. Fixtures are JSON files
//! so they can be captured, diffed, and replayed across implementations.

use serde::{Deserialize, Serialize};

/// One recorded allocator operation.
///
/// Ids are trace-local handles; the runner maps them to live payload
/// offsets at replay time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum TraceOp {
    /// Allocate `size` bytes and bind the result to `id`.
    Alloc { id: u32, size: usize },
    /// Free the block bound to `id`.
    Free { id: u32 },
    /// Resize the block bound to `id` to `size` bytes.
    Resize { id: u32, size: usize },
}

/// A recorded workload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceSet {
    /// Schema version.
    pub version: String,
    /// Workload name.
    pub name: String,
    /// Provenance note (capture timestamp or generator seed).
    pub captured_at: String,
    /// The operations, in order.
    pub ops: Vec<TraceOp>,
}

impl TraceSet {
    /// Load a trace set from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize the trace set to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load a trace set from a file path.
    pub fn from_file(path: &std::path::Path) -> Result<Self, crate::HarnessError> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_json_roundtrip() {
        let set = TraceSet {
            version: "v1".to_string(),
            name: "smoke".to_string(),
            captured_at: "2026-08-01T00:00:00Z".to_string(),
            ops: vec![
                TraceOp::Alloc { id: 0, size: 100 },
                TraceOp::Resize { id: 0, size: 200 },
                TraceOp::Free { id: 0 },
            ],
        };
        let json = set.to_json().unwrap();
        let back = TraceSet::from_json(&json).unwrap();
        assert_eq!(back.ops, set.ops);
        assert_eq!(back.name, "smoke");
    }

    #[test]
    fn trace_ops_use_tagged_encoding() {
        let set = TraceSet::from_json(
            r#"{
                "version":"v1",
                "name":"inline",
                "captured_at":"2026-08-01T00:00:00Z",
                "ops":[
                    {"op":"alloc","id":1,"size":64},
                    {"op":"free","id":1}
                ]
            }"#,
        )
        .expect("valid trace json");
        assert_eq!(set.ops.len(), 2);
        assert_eq!(set.ops[0], TraceOp::Alloc { id: 1, size: 64 });
        assert_eq!(set.ops[1], TraceOp::Free { id: 1 });
    }
}
