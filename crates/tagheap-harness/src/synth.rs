//! Deterministic workload synthesis.
//!
//! Generates allocate/free/resize traces from a seed, so heavy randomized
//! coverage does not require checked-in megabyte fixtures. The same seed
//! always yields the same trace.

use crate::trace::{TraceOp, TraceSet};

/// Multiplier/increment pair of the classic 64-bit LCG.
struct Lcg {
    state: u64,
}

impl Lcg {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }
}

/// Request-size distribution: mostly small, occasionally chunk-crossing.
fn draw_size(r: u64) -> usize {
    match r % 10 {
        0..=5 => ((r >> 8) % 256 + 1) as usize,
        6..=8 => ((r >> 8) % 2048 + 1) as usize,
        _ => ((r >> 8) % 8192 + 1) as usize,
    }
}

/// Generates a trace of `steps` operations from `seed`.
///
/// Roughly half the operations allocate, a quarter free, and a quarter
/// resize, subject to what ids are live. All generated traces are
/// well-formed: every freed or resized id is bound at that point.
#[must_use]
pub fn synth_trace(seed: u64, steps: u32) -> TraceSet {
    let mut rng = Lcg::new(seed);
    let mut ops = Vec::with_capacity(steps as usize);
    let mut live: Vec<u32> = Vec::new();
    let mut next_id = 0u32;

    for _ in 0..steps {
        let r = rng.next();
        match r % 4 {
            0 | 1 => {
                let id = next_id;
                next_id += 1;
                ops.push(TraceOp::Alloc {
                    id,
                    size: draw_size(r),
                });
                live.push(id);
            }
            2 if !live.is_empty() => {
                let idx = (r >> 32) as usize % live.len();
                let id = live.swap_remove(idx);
                ops.push(TraceOp::Free { id });
            }
            3 if !live.is_empty() => {
                let idx = (r >> 32) as usize % live.len();
                let id = live[idx];
                ops.push(TraceOp::Resize {
                    id,
                    size: draw_size(r >> 4),
                });
            }
            _ => {
                let id = next_id;
                next_id += 1;
                ops.push(TraceOp::Alloc {
                    id,
                    size: draw_size(r),
                });
                live.push(id);
            }
        }
    }
    // Drain the survivors so replays end with an empty heap.
    for id in live {
        ops.push(TraceOp::Free { id });
    }

    TraceSet {
        version: "v1".to_string(),
        name: format!("synth-{seed:#x}-{steps}"),
        captured_at: format!("generated from seed {seed:#x}"),
        ops,
    }
}
