//! Arena storage and the grower capability.
//!
//! The allocator manages one contiguous byte region that only ever grows at
//! its end. Where the memory comes from is a capability injected by the
//! embedder: anything implementing [`ArenaGrower`] can back a heap. The
//! production implementation, [`BoundedHeap`], keeps the region in a `Vec`
//! with a hard ceiling so exhaustion is a reachable, testable condition
//! rather than a machine-wide event.

use thiserror::Error;

/// Failure to extend the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GrowError {
    /// The backing region cannot supply the requested bytes.
    #[error("arena exhausted: requested {requested} bytes, {available} available")]
    Exhausted {
        /// Bytes the allocator asked for.
        requested: usize,
        /// Bytes the region could still supply.
        available: usize,
    },
}

/// Capability for extending the managed byte region.
///
/// The allocator calls [`grow`](ArenaGrower::grow) when no free block
/// satisfies a request, and reads and writes the region exclusively through
/// the slice accessors. The region never shrinks.
pub trait ArenaGrower {
    /// Extends the region by at least `extra` bytes, zero-filled, returning
    /// the previous end offset.
    fn grow(&mut self, extra: usize) -> Result<usize, GrowError>;

    /// Current region length in bytes.
    fn len(&self) -> usize;

    /// Returns true if the region has not been extended yet.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The full region as a slice.
    fn bytes(&self) -> &[u8];

    /// The full region as a mutable slice.
    fn bytes_mut(&mut self) -> &mut [u8];
}

/// Vec-backed arena region with a configurable ceiling.
#[derive(Debug, Clone)]
pub struct BoundedHeap {
    region: Vec<u8>,
    limit: usize,
}

/// Default ceiling: 16 MiB, ample for every reference workload.
pub const DEFAULT_HEAP_LIMIT: usize = 16 * 1024 * 1024;

impl BoundedHeap {
    /// Creates an empty region that may grow up to `limit` bytes.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            region: Vec::new(),
            limit,
        }
    }

    /// Remaining growth headroom in bytes.
    #[must_use]
    pub fn available(&self) -> usize {
        self.limit - self.region.len()
    }
}

impl Default for BoundedHeap {
    fn default() -> Self {
        Self::with_limit(DEFAULT_HEAP_LIMIT)
    }
}

impl ArenaGrower for BoundedHeap {
    fn grow(&mut self, extra: usize) -> Result<usize, GrowError> {
        let old_end = self.region.len();
        let new_end = old_end.checked_add(extra).ok_or(GrowError::Exhausted {
            requested: extra,
            available: self.available(),
        })?;
        if new_end > self.limit {
            return Err(GrowError::Exhausted {
                requested: extra,
                available: self.available(),
            });
        }
        self.region.resize(new_end, 0);
        Ok(old_end)
    }

    fn len(&self) -> usize {
        self.region.len()
    }

    fn bytes(&self) -> &[u8] {
        &self.region
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.region
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grow_returns_previous_end() {
        let mut heap = BoundedHeap::with_limit(1024);
        assert_eq!(heap.grow(96).unwrap(), 0);
        assert_eq!(heap.grow(128).unwrap(), 96);
        assert_eq!(heap.len(), 224);
    }

    #[test]
    fn test_grow_zero_fills() {
        let mut heap = BoundedHeap::with_limit(1024);
        heap.grow(64).unwrap();
        assert!(heap.bytes().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_grow_past_limit_fails_without_state_change() {
        let mut heap = BoundedHeap::with_limit(100);
        heap.grow(96).unwrap();
        let err = heap.grow(8).unwrap_err();
        assert_eq!(
            err,
            GrowError::Exhausted {
                requested: 8,
                available: 4
            }
        );
        assert_eq!(heap.len(), 96);
    }

    #[test]
    fn test_default_limit() {
        let heap = BoundedHeap::default();
        assert_eq!(heap.available(), DEFAULT_HEAP_LIMIT);
        assert!(heap.is_empty());
    }
}
