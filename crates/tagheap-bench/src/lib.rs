//! Benchmark crate for tagheap; see `benches/heap_bench.rs`.
