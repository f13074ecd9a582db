//! Trace execution engine.
//!
//! Replays a [`TraceSet`] against a fresh heap, stamping every payload with
//! an id-derived byte pattern and verifying the pattern survives until the
//! block is freed or resized. With checking enabled, the full consistency
//! checker runs after every operation so corruption is reported at the op
//! that introduced it.

use std::collections::HashMap;

use tagheap_core::{BoundedHeap, Heap, HeapConfig, check};

use crate::report::ReplayReport;
use crate::trace::{TraceOp, TraceSet};

/// Replay ceiling for the backing region.
const REPLAY_HEAP_LIMIT: usize = 64 * 1024 * 1024;

/// Replays trace sets and collects verification results.
pub struct TraceRunner {
    /// Heap configuration used for each replay.
    pub config: HeapConfig,
    /// Run the consistency checker after every operation.
    pub check_every_op: bool,
}

/// Byte pattern stamped over the payload of the block bound to `id`.
fn pattern_byte(id: u32, index: usize) -> u8 {
    (id as usize)
        .wrapping_mul(31)
        .wrapping_add(index)
        .wrapping_add(7) as u8
}

fn stamp(heap: &mut Heap, bp: usize, len: usize, id: u32) {
    for (i, byte) in heap.payload_mut(bp, len).iter_mut().enumerate() {
        *byte = pattern_byte(id, i);
    }
}

fn verify_pattern(heap: &Heap, bp: usize, len: usize, id: u32) -> bool {
    heap.payload(bp, len)
        .iter()
        .enumerate()
        .all(|(i, &byte)| byte == pattern_byte(id, i))
}

impl TraceRunner {
    /// Creates a runner with the given configuration.
    #[must_use]
    pub fn new(config: HeapConfig, check_every_op: bool) -> Self {
        Self {
            config,
            check_every_op,
        }
    }

    /// Replays a trace set against a fresh heap and reports the outcome.
    #[must_use]
    pub fn run(&self, set: &TraceSet) -> ReplayReport {
        let mut report = ReplayReport::new(&set.name, set.ops.len());
        let mut heap = match Heap::new(
            BoundedHeap::with_limit(REPLAY_HEAP_LIMIT),
            self.config.clone(),
        ) {
            Ok(heap) => heap,
            Err(err) => {
                report.fail(0, format!("heap construction failed: {err}"));
                return report;
            }
        };

        // Trace id -> (payload offset, payload length).
        let mut live: HashMap<u32, (usize, usize)> = HashMap::new();
        let mut peak_payload = 0usize;

        for (index, &op) in set.ops.iter().enumerate() {
            self.execute(&mut heap, &mut live, index, op, &mut report);
            let total: usize = live.values().map(|&(_, len)| len).sum();
            peak_payload = peak_payload.max(total);
            if self.check_every_op {
                for violation in check(heap.payload(0, heap.heap_bytes())) {
                    report.violation(index, violation.to_string());
                }
            }
            report.ops_executed = index + 1;
        }
        if !self.check_every_op {
            for violation in check(heap.payload(0, heap.heap_bytes())) {
                report.violation(set.ops.len(), violation.to_string());
            }
        }

        report.finish(heap.stats(), peak_payload, heap.heap_bytes());
        report
    }

    fn execute(
        &self,
        heap: &mut Heap,
        live: &mut HashMap<u32, (usize, usize)>,
        index: usize,
        op: TraceOp,
        report: &mut ReplayReport,
    ) {
        match op {
            TraceOp::Alloc { id, size } => {
                if live.contains_key(&id) {
                    report.fail(index, format!("alloc: id {id} is already bound"));
                    return;
                }
                match heap.allocate(size) {
                    Some(bp) => {
                        stamp(heap, bp, size, id);
                        live.insert(id, (bp, size));
                    }
                    None if size == 0 => {}
                    None => report.fail(index, format!("alloc: out of memory for {size} bytes")),
                }
            }
            TraceOp::Free { id } => {
                let Some((bp, len)) = live.remove(&id) else {
                    report.fail(index, format!("free: id {id} is not bound"));
                    return;
                };
                if !verify_pattern(heap, bp, len, id) {
                    report.fail(index, format!("free: payload of id {id} was corrupted"));
                }
                if let Err(fault) = heap.free(bp) {
                    report.fail(index, format!("free: {fault}"));
                }
            }
            TraceOp::Resize { id, size } => {
                let Some(&(bp, len)) = live.get(&id) else {
                    report.fail(index, format!("resize: id {id} is not bound"));
                    return;
                };
                match heap.resize(bp, size) {
                    Ok(Some(new_bp)) => {
                        let keep = len.min(size);
                        if !verify_pattern(heap, new_bp, keep, id) {
                            report.fail(
                                index,
                                format!("resize: id {id} lost its payload prefix"),
                            );
                        }
                        stamp(heap, new_bp, size, id);
                        live.insert(id, (new_bp, size));
                    }
                    Ok(None) if size == 0 => {
                        live.remove(&id);
                    }
                    Ok(None) => {
                        report.fail(index, format!("resize: out of memory for {size} bytes"));
                    }
                    Err(fault) => report.fail(index, format!("resize: {fault}")),
                }
            }
        }
    }
}

impl Default for TraceRunner {
    fn default() -> Self {
        Self::new(HeapConfig::default(), true)
    }
}
