//! Replay reports.
//!
//! A [`ReplayReport`] captures everything a reviewer needs from one trace
//! replay: pass/fail, per-op failures, invariant violations, the heap's
//! operation counters, and the utilization figure of merit (peak live
//! payload over peak arena size). Reports render as markdown for humans and
//! serialize as JSON for tooling.

use serde::Serialize;
use sha2::{Digest, Sha256};

use tagheap_core::HeapStats;

/// Outcome of replaying one trace set.
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    /// Trace name.
    pub trace: String,
    /// Total operations in the trace.
    pub ops_total: usize,
    /// Operations actually executed.
    pub ops_executed: usize,
    /// True when no failures and no violations were recorded.
    pub passed: bool,
    /// Per-operation failures, prefixed with the op index.
    pub failures: Vec<String>,
    /// Consistency-checker violations, prefixed with the op index.
    pub violations: Vec<String>,
    /// Final heap operation counters.
    pub stats: HeapStats,
    /// Peak live payload bytes over peak arena bytes.
    pub utilization: f64,
    /// Hex SHA-256 digest of the fixture file, when replayed from disk.
    pub fixture_digest: Option<String>,
}

impl ReplayReport {
    /// Creates an empty report for a trace of `ops_total` operations.
    #[must_use]
    pub fn new(trace: &str, ops_total: usize) -> Self {
        Self {
            trace: trace.to_string(),
            ops_total,
            ops_executed: 0,
            passed: true,
            failures: Vec::new(),
            violations: Vec::new(),
            stats: HeapStats::default(),
            utilization: 0.0,
            fixture_digest: None,
        }
    }

    /// Records a per-operation failure.
    pub fn fail(&mut self, op_index: usize, message: String) {
        self.passed = false;
        self.failures.push(format!("op {op_index}: {message}"));
    }

    /// Records a consistency violation observed after `op_index`.
    pub fn violation(&mut self, op_index: usize, message: String) {
        self.passed = false;
        self.violations.push(format!("op {op_index}: {message}"));
    }

    /// Stores the final counters and computes utilization.
    pub fn finish(&mut self, stats: HeapStats, peak_payload: usize, heap_bytes: usize) {
        self.stats = stats;
        if heap_bytes > 0 {
            self.utilization = peak_payload as f64 / heap_bytes as f64;
        }
    }

    /// Attaches the fixture digest.
    pub fn with_digest(mut self, digest: String) -> Self {
        self.fixture_digest = Some(digest);
        self
    }

    /// Renders the report as markdown.
    #[must_use]
    pub fn render_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# Replay report: {}\n\n", self.trace));
        out.push_str(&format!(
            "- result: **{}**\n- ops: {}/{}\n- utilization: {:.3}\n",
            if self.passed { "PASS" } else { "FAIL" },
            self.ops_executed,
            self.ops_total,
            self.utilization,
        ));
        if let Some(digest) = &self.fixture_digest {
            out.push_str(&format!("- fixture sha256: `{digest}`\n"));
        }
        out.push_str(&format!(
            "- heap: {} bytes, {} grows, {} splits, {} coalesces\n",
            self.stats.heap_bytes, self.stats.grows, self.stats.splits, self.stats.coalesces,
        ));
        out.push_str(&format!(
            "- ops: {} allocs, {} frees, {} resizes, {} failed allocs\n",
            self.stats.allocs, self.stats.frees, self.stats.resizes, self.stats.failed_allocs,
        ));
        if !self.failures.is_empty() {
            out.push_str("\n## Failures\n\n");
            for failure in &self.failures {
                out.push_str(&format!("- {failure}\n"));
            }
        }
        if !self.violations.is_empty() {
            out.push_str("\n## Invariant violations\n\n");
            for violation in &self.violations {
                out.push_str(&format!("- {violation}\n"));
            }
        }
        out
    }

    /// Serializes the report to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Hex SHA-256 digest of fixture bytes, for report traceability.
#[must_use]
pub fn fixture_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_marks_failures() {
        let mut report = ReplayReport::new("t", 3);
        assert!(report.passed);
        report.fail(1, "boom".to_string());
        assert!(!report.passed);
        assert_eq!(report.failures, vec!["op 1: boom"]);
    }

    #[test]
    fn markdown_mentions_outcome_and_digest() {
        let mut report = ReplayReport::new("smoke", 2);
        report.finish(HeapStats::default(), 512, 4192);
        let report = report.with_digest("abc123".to_string());
        let md = report.render_markdown();
        assert!(md.contains("PASS"));
        assert!(md.contains("abc123"));
        assert!(md.contains("utilization"));
    }

    #[test]
    fn digest_is_stable_hex() {
        let digest = fixture_digest(b"hello");
        assert_eq!(digest.len(), 64);
        assert_eq!(
            digest,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn report_serializes_to_json() {
        let report = ReplayReport::new("t", 1);
        let json = report.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["trace"], "t");
        assert_eq!(value["passed"], true);
    }
}
