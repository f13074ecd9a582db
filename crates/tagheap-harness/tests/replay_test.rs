//! End-to-end replay tests over the checked-in fixtures.

use std::path::Path;

use tagheap_core::{HeapConfig, Mode};
use tagheap_harness::{TraceOp, TraceRunner, TraceSet, fixture_digest, synth_trace};

fn fixture_path(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures").join(name)
}

#[test]
fn smoke_fixture_replays_clean() {
    let set = TraceSet::from_file(&fixture_path("smoke.json")).expect("fixture");
    let report = TraceRunner::default().run(&set);
    assert!(report.passed, "failures: {:?}", report.failures);
    assert!(report.violations.is_empty(), "{:?}", report.violations);
    assert_eq!(report.stats.live_blocks, 0);
    // The 5000-byte request cannot be served from 4096-byte chunks without
    // growing the arena.
    assert!(report.stats.grows >= 2);
}

#[test]
fn churn_fixture_replays_clean() {
    let set = TraceSet::from_file(&fixture_path("churn.json")).expect("fixture");
    let report = TraceRunner::default().run(&set);
    assert!(report.passed, "failures: {:?}", report.failures);
    assert_eq!(report.stats.live_blocks, 0);
    assert!(report.utilization > 0.0);
}

#[test]
fn fixtures_replay_clean_in_hardened_mode() {
    let config = HeapConfig {
        mode: Mode::Hardened,
        ..HeapConfig::default()
    };
    for name in ["smoke.json", "churn.json"] {
        let set = TraceSet::from_file(&fixture_path(name)).expect("fixture");
        let report = TraceRunner::new(config.clone(), true).run(&set);
        assert!(report.passed, "{name} failures: {:?}", report.failures);
    }
}

#[test]
fn digest_matches_file_bytes() {
    let path = fixture_path("smoke.json");
    let raw = std::fs::read(&path).expect("fixture bytes");
    let set = TraceSet::from_file(&path).expect("fixture");
    let report = TraceRunner::default()
        .run(&set)
        .with_digest(fixture_digest(&raw));
    assert_eq!(report.fixture_digest, Some(fixture_digest(&raw)));
    let md = report.render_markdown();
    assert!(md.contains("fixture sha256"));
}

#[test]
fn long_synthetic_workloads_replay_clean() {
    for seed in [1u64, 0xBEEF, 0x1234_5678_9ABC_DEF0] {
        let set = synth_trace(seed, 600);
        let report = TraceRunner::default().run(&set);
        assert!(
            report.passed,
            "seed {seed:#x} failures: {:?} violations: {:?}",
            report.failures, report.violations
        );
        assert_eq!(report.stats.live_blocks, 0);
    }
}

#[test]
fn corrupted_trace_is_reported_not_panicked() {
    let set = TraceSet {
        version: "v1".to_string(),
        name: "bad".to_string(),
        captured_at: "test".to_string(),
        ops: vec![
            TraceOp::Free { id: 9 },
            TraceOp::Alloc { id: 0, size: 64 },
            TraceOp::Alloc { id: 0, size: 64 },
            TraceOp::Resize { id: 4, size: 32 },
        ],
    };
    let report = TraceRunner::default().run(&set);
    assert!(!report.passed);
    assert_eq!(report.failures.len(), 3);
    assert_eq!(report.ops_executed, 4);
}
