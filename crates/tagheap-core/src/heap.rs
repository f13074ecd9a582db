//! Core allocator state.
//!
//! [`Heap`] coordinates the block codec, the free-list directory, the
//! coalescer, and the injected arena grower. It is an owned value; embedders
//! needing several independent arenas simply construct several heaps.
//!
//! Payload "pointers" are byte offsets into the arena. Offset 0 is the nil
//! sentinel (it lies inside the directory area and can never name a
//! payload), so the classic null-pointer conventions of the C allocation
//! API carry over unchanged: `free(0)` is a no-op and `resize(0, n)`
//! allocates.

use serde::Serialize;
use thiserror::Error;

use crate::arena::{ArenaGrower, BoundedHeap, GrowError};
use crate::checker::{self, CheckViolation};
use crate::coalesce::coalesce;
use crate::codec::{self, BoundaryTag, MIN_BLOCK, PAIR, WORD, align_up};
use crate::config::HeapConfig;
use crate::directory::{self, DIRECTORY_BYTES, NIL, bucket_index};
use crate::log::{HeapLogRecord, LogLevel};

/// Bytes consumed by directory, padding word, prologue, and initial
/// epilogue.
const SETUP_BYTES: usize = DIRECTORY_BYTES + 4 * WORD;

/// Payload offset of the prologue sentinel.
const PROLOGUE_BP: usize = DIRECTORY_BYTES + PAIR;

/// Payload offset of the first real block.
const FIRST_BP: usize = SETUP_BYTES;

/// Heap construction failure.
#[derive(Debug, Error)]
pub enum HeapError {
    /// The grower could not supply the setup region or the first chunk.
    #[error("heap initialization failed: {0}")]
    Init(#[from] GrowError),
}

/// Caller-error fault, reported in strict mode and absorbed in hardened
/// mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeapFault {
    /// The offset does not name a block in this arena.
    #[error("offset {offset} does not name an allocated block")]
    UnknownOffset {
        /// The offending payload offset.
        offset: usize,
    },
    /// The block at the offset is already free.
    #[error("block at offset {offset} is not allocated (double free?)")]
    NotAllocated {
        /// The offending payload offset.
        offset: usize,
    },
}

/// Operation counters, readable at any time.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HeapStats {
    /// Successful allocations.
    pub allocs: u64,
    /// Successful frees.
    pub frees: u64,
    /// Resize calls that returned a block.
    pub resizes: u64,
    /// Arena extensions.
    pub grows: u64,
    /// Splits performed while placing.
    pub splits: u64,
    /// Frees or extensions that merged with at least one neighbor.
    pub coalesces: u64,
    /// Allocations refused for lack of memory.
    pub failed_allocs: u64,
    /// Currently allocated blocks.
    pub live_blocks: usize,
    /// Currently allocated bytes (block sizes, tags included).
    pub live_bytes: usize,
    /// High-water mark of `live_bytes`.
    pub peak_live_bytes: usize,
    /// Current arena size in bytes.
    pub heap_bytes: usize,
    /// High-water mark of `heap_bytes` (equal to it; the arena never
    /// shrinks).
    pub peak_heap_bytes: usize,
}

/// Segregated free-list heap over an injected arena grower.
pub struct Heap<G: ArenaGrower = BoundedHeap> {
    grower: G,
    config: HeapConfig,
    stats: HeapStats,
    records: Vec<HeapLogRecord>,
    next_decision_id: u64,
}

impl Heap<BoundedHeap> {
    /// Convenience constructor over a [`BoundedHeap`] with the given
    /// ceiling and default configuration.
    pub fn with_capacity(limit: usize) -> Result<Self, HeapError> {
        Self::new(BoundedHeap::with_limit(limit), HeapConfig::default())
    }
}

impl<G: ArenaGrower> Heap<G> {
    /// Builds a heap over an empty grower: formats the directory, the
    /// prologue/epilogue sentinels, and one initial chunk of free space.
    pub fn new(grower: G, config: HeapConfig) -> Result<Self, HeapError> {
        let mut heap = Self {
            grower,
            config,
            stats: HeapStats::default(),
            records: Vec::new(),
            next_decision_id: 1,
        };

        let start = heap.grower.grow(SETUP_BYTES)?;
        debug_assert_eq!(start, 0, "heap requires an empty region");

        let bytes = heap.grower.bytes_mut();
        // Directory heads and the padding word are already zero.
        codec::write_tag(bytes, PROLOGUE_BP - WORD, BoundaryTag::allocated(PAIR));
        codec::write_tag(bytes, PROLOGUE_BP, BoundaryTag::allocated(PAIR));
        codec::write_tag(bytes, FIRST_BP - WORD, BoundaryTag::allocated(0));

        let chunk = heap.config.chunk_size;
        heap.extend(chunk)?;
        heap.record(
            LogLevel::Debug,
            "init",
            "heap_ready",
            None,
            Some(chunk),
            None,
            "success",
            String::new(),
        );
        Ok(heap)
    }

    /// Allocates `size` payload bytes.
    ///
    /// Returns the payload offset, or `None` when `size` is zero or the
    /// arena cannot grow far enough. The returned offset is always 8-byte
    /// aligned.
    pub fn allocate(&mut self, size: usize) -> Option<usize> {
        if size == 0 {
            self.record(
                LogLevel::Trace,
                "allocate",
                "alloc_zero",
                None,
                Some(0),
                None,
                "noop",
                String::new(),
            );
            return None;
        }

        let asize = self.adjusted_size(size);
        if let Some(bp) = self.find_fit(asize) {
            self.place(bp, asize);
            self.record(
                LogLevel::Trace,
                "allocate",
                "alloc",
                Some(bp),
                Some(asize),
                Some(bucket_index(asize)),
                "success",
                "path=fit".to_string(),
            );
            return Some(bp);
        }

        let extend_by = asize.max(self.config.chunk_size);
        match self.extend(extend_by) {
            Ok(bp) => {
                self.place(bp, asize);
                self.record(
                    LogLevel::Trace,
                    "allocate",
                    "alloc",
                    Some(bp),
                    Some(asize),
                    Some(bucket_index(asize)),
                    "success",
                    format!("path=extend extend_by={extend_by}"),
                );
                Some(bp)
            }
            Err(err) => {
                self.stats.failed_allocs += 1;
                self.record(
                    LogLevel::Warn,
                    "allocate",
                    "alloc",
                    None,
                    Some(asize),
                    Some(bucket_index(asize)),
                    "oom",
                    err.to_string(),
                );
                None
            }
        }
    }

    /// Releases the block at payload offset `bp`.
    ///
    /// `bp == 0` is a no-op. Freeing an offset that is not an allocated
    /// block is an error in strict mode and a logged no-op in hardened
    /// mode.
    pub fn free(&mut self, bp: usize) -> Result<(), HeapFault> {
        if bp == NIL {
            self.record(
                LogLevel::Trace,
                "free",
                "free_null",
                Some(bp),
                None,
                None,
                "noop",
                String::new(),
            );
            return Ok(());
        }
        if let Err(fault) = self.validate_allocated(bp) {
            return self.absorb_or_report("free", fault);
        }

        let bytes = self.grower.bytes_mut();
        let size = codec::block_size(bytes, bp);
        codec::write_block_tags(bytes, bp, BoundaryTag::free(size));
        let merged = coalesce(bytes, bp);
        let merged_size = codec::block_size(self.grower.bytes(), merged);
        if merged_size > size {
            self.stats.coalesces += 1;
        }

        self.stats.frees += 1;
        self.stats.live_blocks -= 1;
        self.stats.live_bytes -= size;
        self.record(
            LogLevel::Trace,
            "free",
            "free",
            Some(bp),
            Some(size),
            Some(bucket_index(merged_size)),
            "success",
            format!("merged_at={merged} merged_size={merged_size}"),
        );
        Ok(())
    }

    /// Resizes the block at `bp` to hold `new_size` payload bytes.
    ///
    /// - `bp == 0` behaves as [`allocate`](Self::allocate).
    /// - `new_size == 0` behaves as [`free`](Self::free), returning
    ///   `Ok(None)`.
    /// - Otherwise returns the (possibly moved) payload offset, with the
    ///   first `min(new_size, old capacity)` payload bytes preserved, or
    ///   `Ok(None)` on exhaustion — in which case the original block is
    ///   untouched and still allocated.
    pub fn resize(&mut self, bp: usize, new_size: usize) -> Result<Option<usize>, HeapFault> {
        if bp == NIL {
            return Ok(self.allocate(new_size));
        }
        if new_size == 0 {
            self.free(bp)?;
            return Ok(None);
        }
        if let Err(fault) = self.validate_allocated(bp) {
            self.absorb_or_report("resize", fault)?;
            // Hardened mode falls through to a fresh allocation, the only
            // reasonable recovery once the source block is untrusted.
            return Ok(self.allocate(new_size));
        }

        let csize = codec::block_size(self.grower.bytes(), bp);
        let required = self.adjusted_size(new_size);

        // Fits in place: no shrink-to-fit splitting.
        if required <= csize {
            self.stats.resizes += 1;
            self.record(
                LogLevel::Trace,
                "resize",
                "resize_in_place",
                Some(bp),
                Some(new_size),
                Some(bucket_index(csize)),
                "success",
                format!("csize={csize}"),
            );
            return Ok(Some(bp));
        }

        // Grow without moving when the address-order successor is free and
        // large enough to absorb the shortfall.
        let bytes = self.grower.bytes();
        let next = codec::next_block(bytes, bp);
        let next_free = !codec::is_allocated(bytes, next);
        let next_size = codec::block_size(bytes, next);
        if next_free && csize + next_size >= required {
            let bytes = self.grower.bytes_mut();
            directory::remove(bytes, next);
            let total = csize + next_size;
            codec::write_block_tags(bytes, bp, BoundaryTag::allocated(total));
            self.stats.resizes += 1;
            self.stats.live_bytes += total - csize;
            self.stats.peak_live_bytes = self.stats.peak_live_bytes.max(self.stats.live_bytes);
            self.record(
                LogLevel::Trace,
                "resize",
                "resize_absorb_next",
                Some(bp),
                Some(new_size),
                Some(bucket_index(total)),
                "success",
                format!("csize={csize} absorbed={next_size}"),
            );
            return Ok(Some(bp));
        }

        // Move: allocate fresh, copy the surviving prefix, release the old
        // block. On exhaustion the old block stays valid.
        let Some(new_bp) = self.allocate(new_size) else {
            self.record(
                LogLevel::Warn,
                "resize",
                "resize_move",
                Some(bp),
                Some(new_size),
                None,
                "oom",
                format!("csize={csize}"),
            );
            return Ok(None);
        };
        let copy_len = new_size.min(csize - PAIR);
        self.grower
            .bytes_mut()
            .copy_within(bp..bp + copy_len, new_bp);
        self.free(bp)?;
        self.stats.resizes += 1;
        self.record(
            LogLevel::Trace,
            "resize",
            "resize_move",
            Some(new_bp),
            Some(new_size),
            Some(bucket_index(self.adjusted_size(new_size))),
            "success",
            format!("old_ptr={bp} copied={copy_len}"),
        );
        Ok(Some(new_bp))
    }

    /// Usable payload bytes of the allocated block at `bp`.
    #[must_use]
    pub fn payload_capacity(&self, bp: usize) -> usize {
        codec::block_size(self.grower.bytes(), bp) - PAIR
    }

    /// Read access to `len` payload bytes at `bp`.
    #[must_use]
    pub fn payload(&self, bp: usize, len: usize) -> &[u8] {
        &self.grower.bytes()[bp..bp + len]
    }

    /// Write access to `len` payload bytes at `bp`.
    pub fn payload_mut(&mut self, bp: usize, len: usize) -> &mut [u8] {
        &mut self.grower.bytes_mut()[bp..bp + len]
    }

    /// Runs the consistency checker over the whole arena.
    #[must_use]
    pub fn check(&self) -> Vec<CheckViolation> {
        checker::check(self.grower.bytes())
    }

    /// Current operation counters.
    #[must_use]
    pub fn stats(&self) -> HeapStats {
        self.stats
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// Current arena size in bytes.
    #[must_use]
    pub fn heap_bytes(&self) -> usize {
        self.grower.len()
    }

    /// View of the lifecycle records accumulated so far.
    #[must_use]
    pub fn records(&self) -> &[HeapLogRecord] {
        &self.records
    }

    /// Drains the lifecycle record buffer.
    pub fn drain_records(&mut self) -> Vec<HeapLogRecord> {
        std::mem::take(&mut self.records)
    }

    /// Adjusted block size for a payload request: tag overhead added,
    /// aligned, clamped to the minimum block, with configured paddings
    /// applied first.
    fn adjusted_size(&self, request: usize) -> usize {
        if let Some(padded) = self.config.padding_for(request) {
            return padded;
        }
        align_up(request + PAIR).max(MIN_BLOCK)
    }

    /// First-fit scan from the request's own bucket upward.
    fn find_fit(&self, asize: usize) -> Option<usize> {
        let bytes = self.grower.bytes();
        for index in bucket_index(asize)..directory::NUM_BUCKETS {
            let mut bp = directory::bucket_head(bytes, index);
            while bp != NIL {
                if codec::block_size(bytes, bp) >= asize {
                    return Some(bp);
                }
                bp = directory::succ(bytes, bp);
            }
        }
        None
    }

    /// Claims `asize` bytes out of the free block at `bp`, splitting when
    /// the remainder can stand as a block of its own.
    fn place(&mut self, bp: usize, asize: usize) {
        let bytes = self.grower.bytes_mut();
        let csize = codec::block_size(bytes, bp);
        directory::remove(bytes, bp);

        let claimed = if csize - asize >= MIN_BLOCK {
            codec::write_block_tags(bytes, bp, BoundaryTag::allocated(asize));
            let rest = bp + asize;
            codec::write_block_tags(bytes, rest, BoundaryTag::free(csize - asize));
            directory::insert(bytes, rest);
            self.stats.splits += 1;
            asize
        } else {
            codec::write_block_tags(bytes, bp, BoundaryTag::allocated(csize));
            csize
        };

        self.stats.allocs += 1;
        self.stats.live_blocks += 1;
        self.stats.live_bytes += claimed;
        self.stats.peak_live_bytes = self.stats.peak_live_bytes.max(self.stats.live_bytes);
    }

    /// Extends the arena by at least `bytes_needed` bytes, formats the new
    /// region as one free block terminated by a fresh epilogue, and
    /// coalesces it with a free block ending at the old boundary.
    fn extend(&mut self, bytes_needed: usize) -> Result<usize, GrowError> {
        let size = align_up(bytes_needed);
        let old_end = self.grower.grow(size)?;

        let bytes = self.grower.bytes_mut();
        let bp = old_end;
        // The old epilogue header becomes the new block's header.
        codec::write_block_tags(bytes, bp, BoundaryTag::free(size));
        codec::write_link(bytes, bp, NIL);
        codec::write_link(bytes, bp + PAIR, NIL);
        let end = codec::next_block(bytes, bp);
        codec::write_tag(bytes, codec::header_of(end), BoundaryTag::allocated(0));

        let merged = coalesce(bytes, bp);
        if merged != bp {
            self.stats.coalesces += 1;
        }
        self.stats.grows += 1;
        self.stats.heap_bytes = self.grower.len();
        self.stats.peak_heap_bytes = self.stats.heap_bytes;
        self.record(
            LogLevel::Debug,
            "extend",
            "arena_grow",
            Some(merged),
            Some(size),
            None,
            "success",
            format!("old_end={old_end}"),
        );
        Ok(merged)
    }

    /// Checks that `bp` names an allocated block of this arena.
    fn validate_allocated(&self, bp: usize) -> Result<(), HeapFault> {
        let bytes = self.grower.bytes();
        if bp < FIRST_BP || bp % PAIR != 0 || bp + WORD > bytes.len() {
            return Err(HeapFault::UnknownOffset { offset: bp });
        }
        let tag = codec::read_tag(bytes, codec::header_of(bp));
        if tag.size < MIN_BLOCK || bp + tag.size > bytes.len() {
            return Err(HeapFault::UnknownOffset { offset: bp });
        }
        if !tag.allocated {
            return Err(HeapFault::NotAllocated { offset: bp });
        }
        Ok(())
    }

    /// Strict mode propagates the fault; hardened mode logs and absorbs it.
    fn absorb_or_report(&mut self, symbol: &'static str, fault: HeapFault) -> Result<(), HeapFault> {
        let (event, ptr) = match fault {
            HeapFault::NotAllocated { offset } => ("double_free_detected", offset),
            HeapFault::UnknownOffset { offset } => ("unknown_offset", offset),
        };
        if self.config.mode.masks_faults() {
            self.record(
                LogLevel::Warn,
                symbol,
                event,
                Some(ptr),
                None,
                None,
                "ignored",
                fault.to_string(),
            );
            Ok(())
        } else {
            self.record(
                LogLevel::Error,
                symbol,
                event,
                Some(ptr),
                None,
                None,
                "fault",
                fault.to_string(),
            );
            Err(fault)
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn record(
        &mut self,
        level: LogLevel,
        symbol: &'static str,
        event: &'static str,
        ptr: Option<usize>,
        size: Option<usize>,
        bucket: Option<usize>,
        outcome: &'static str,
        details: String,
    ) {
        let decision_id = self.next_decision_id;
        self.next_decision_id = self.next_decision_id.wrapping_add(1);
        self.records.push(HeapLogRecord {
            decision_id,
            trace_id: format!("tagheap::{symbol}::{decision_id:016x}"),
            level,
            symbol,
            event,
            ptr,
            size,
            bucket,
            outcome,
            details,
            live_blocks: self.stats.live_blocks,
            live_bytes: self.stats.live_bytes,
            heap_bytes: self.grower.len(),
        });
    }
}
