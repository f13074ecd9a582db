//! Whole-heap invariant tests driven through the public API.

use tagheap_core::{BoundedHeap, Heap, HeapConfig, Mode, check};

fn lcg(state: &mut u64) -> u64 {
    *state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
    *state
}

fn assert_consistent(heap: &Heap) {
    let violations = check(heap.payload(0, heap.heap_bytes()));
    assert!(violations.is_empty(), "heap inconsistent: {violations:?}");
}

#[test]
fn invariants_hold_under_deterministic_storm() {
    let mut heap = Heap::with_capacity(8 << 20).expect("heap");
    let mut live: Vec<(usize, usize)> = Vec::new();
    let mut rng = 0xA5A5_5A5A_DEAD_BEEFu64;

    for step in 0..2000 {
        let r = lcg(&mut rng);
        match r % 3 {
            0 => {
                let size = ((r >> 8) as usize % 2048).max(1);
                if let Some(bp) = heap.allocate(size) {
                    // Stamp a block-specific pattern over the payload.
                    let byte = (bp % 251) as u8;
                    heap.payload_mut(bp, size).fill(byte);
                    live.push((bp, size));
                }
            }
            1 if !live.is_empty() => {
                let idx = (r as usize) % live.len();
                let (bp, size) = live.swap_remove(idx);
                let byte = (bp % 251) as u8;
                assert!(
                    heap.payload(bp, size).iter().all(|&b| b == byte),
                    "payload of block {bp} corrupted before free"
                );
                heap.free(bp).expect("free of live block");
            }
            2 if !live.is_empty() => {
                let idx = (r as usize) % live.len();
                let (bp, size) = live[idx];
                let new_size = ((r >> 16) as usize % 3072).max(1);
                let new_bp = heap
                    .resize(bp, new_size)
                    .expect("resize of live block")
                    .expect("arena large enough");
                let keep = size.min(new_size);
                let byte = (bp % 251) as u8;
                assert!(
                    heap.payload(new_bp, keep).iter().all(|&b| b == byte),
                    "resize lost payload prefix of block {bp}"
                );
                let byte = (new_bp % 251) as u8;
                heap.payload_mut(new_bp, new_size).fill(byte);
                live[idx] = (new_bp, new_size);
            }
            _ => {}
        }

        // Full invariant sweep every few steps keeps the test fast while
        // still catching corruption close to its cause.
        if step % 16 == 0 {
            assert_consistent(&heap);
        }
        let stats = heap.stats();
        assert_eq!(stats.live_blocks, live.len());
    }
    assert_consistent(&heap);

    for (bp, _) in live {
        heap.free(bp).expect("final drain");
    }
    assert_consistent(&heap);
    assert_eq!(heap.stats().live_blocks, 0);
    assert_eq!(heap.stats().live_bytes, 0);
}

#[test]
fn no_live_blocks_overlap() {
    let mut heap = Heap::with_capacity(1 << 20).expect("heap");
    let mut rng = 0x1234_5678u64;
    let mut live: Vec<(usize, usize)> = Vec::new();
    for _ in 0..200 {
        let r = lcg(&mut rng);
        if r % 4 == 0 && !live.is_empty() {
            let idx = (r as usize) % live.len();
            let (bp, _) = live.swap_remove(idx);
            heap.free(bp).unwrap();
        } else {
            let size = ((r >> 6) as usize % 512).max(1);
            if let Some(bp) = heap.allocate(size) {
                live.push((bp, size));
            }
        }
    }
    let mut ranges: Vec<(usize, usize)> = live
        .iter()
        .map(|&(bp, _)| (bp, bp + heap.payload_capacity(bp)))
        .collect();
    ranges.sort_unstable();
    for pair in ranges.windows(2) {
        assert!(
            pair[0].1 <= pair[1].0,
            "blocks {:?} and {:?} overlap",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn freed_space_is_reused_before_growing() {
    let mut heap = Heap::with_capacity(1 << 20).expect("heap");
    let a = heap.allocate(100).expect("alloc");
    heap.free(a).expect("free");
    let b = heap.allocate(100).expect("alloc");
    assert_eq!(a, b, "most recently freed block of the class is tried first");
}

#[test]
fn hardened_mode_survives_caller_abuse() {
    let config = HeapConfig {
        mode: Mode::Hardened,
        ..HeapConfig::default()
    };
    let mut heap = Heap::new(BoundedHeap::with_limit(1 << 20), config).expect("heap");
    let a = heap.allocate(64).expect("alloc");
    heap.free(a).expect("free");
    heap.free(a).expect("double free is absorbed");
    heap.free(a + 8).expect("garbage offset is absorbed");
    assert!(heap.resize(a + 8, 32).expect("absorbed").is_some());
    assert_consistent(&heap);
}
