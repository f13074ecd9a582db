//! # tagheap-core
//!
//! A segregated free-list, boundary-tag heap allocator over a single
//! contiguous, growable byte arena.
//!
//! The arena is an owned, indexable byte buffer; every "pointer" handed to
//! callers is an 8-byte-aligned offset into it, which keeps the whole crate
//! in safe Rust while preserving the classic allocator layout: ten size
//! classes of intrusive doubly linked free lists, header/footer boundary
//! tags on every block, immediate coalescing, first-fit placement with
//! splitting, and grow-in-place resizing.
//!
//! Memory comes from an injected [`ArenaGrower`] capability; the bundled
//! [`BoundedHeap`] backs the region with a `Vec` under a hard ceiling.

#![deny(unsafe_code)]

pub mod arena;
pub mod checker;
pub mod coalesce;
pub mod codec;
pub mod config;
pub mod directory;
pub mod heap;
pub mod log;

pub use arena::{ArenaGrower, BoundedHeap, GrowError};
pub use checker::{CheckViolation, check};
pub use codec::{BoundaryTag, MIN_BLOCK, align_up};
pub use config::{HeapConfig, Mode};
pub use directory::{NUM_BUCKETS, bucket_index};
pub use heap::{Heap, HeapError, HeapFault, HeapStats};
pub use log::{HeapLogRecord, LogLevel};
