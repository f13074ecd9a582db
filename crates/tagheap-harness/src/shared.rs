//! Externally locked heap wrapper.
//!
//! The allocator itself is single-threaded by design; embedders that need
//! to share one arena across threads wrap it in a mutex around every whole
//! operation. This wrapper packages that pattern so callers cannot forget
//! the lock.

use std::sync::Arc;

use parking_lot::Mutex;

use tagheap_core::{CheckViolation, Heap, HeapError, HeapFault, HeapStats};

/// A clonable, mutex-guarded heap handle.
#[derive(Clone)]
pub struct SharedHeap {
    inner: Arc<Mutex<Heap>>,
}

impl SharedHeap {
    /// Builds a shared heap with the given arena ceiling.
    pub fn with_capacity(limit: usize) -> Result<Self, HeapError> {
        Ok(Self {
            inner: Arc::new(Mutex::new(Heap::with_capacity(limit)?)),
        })
    }

    /// Locked [`Heap::allocate`].
    pub fn allocate(&self, size: usize) -> Option<usize> {
        self.inner.lock().allocate(size)
    }

    /// Locked [`Heap::free`].
    pub fn free(&self, bp: usize) -> Result<(), HeapFault> {
        self.inner.lock().free(bp)
    }

    /// Locked [`Heap::resize`].
    pub fn resize(&self, bp: usize, new_size: usize) -> Result<Option<usize>, HeapFault> {
        self.inner.lock().resize(bp, new_size)
    }

    /// Locked payload copy-out.
    #[must_use]
    pub fn read_payload(&self, bp: usize, len: usize) -> Vec<u8> {
        self.inner.lock().payload(bp, len).to_vec()
    }

    /// Locked payload write.
    pub fn write_payload(&self, bp: usize, data: &[u8]) {
        self.inner.lock().payload_mut(bp, data.len()).copy_from_slice(data);
    }

    /// Locked consistency check.
    #[must_use]
    pub fn check(&self) -> Vec<CheckViolation> {
        self.inner.lock().check()
    }

    /// Locked stats snapshot.
    #[must_use]
    pub fn stats(&self) -> HeapStats {
        self.inner.lock().stats()
    }
}
