//! Heap consistency checker.
//!
//! Walks the whole arena twice — once in address order, once through the
//! free-list directory — and reports every invariant violation it finds.
//! Diagnostic only: the allocator never calls it on the hot path, but the
//! harness's verify mode and the test suites run it after every mutation.

use std::collections::HashSet;

use thiserror::Error;

use crate::codec::{self, MIN_BLOCK, PAIR, WORD};
use crate::directory::{self, DIRECTORY_BYTES, NIL, NUM_BUCKETS, bucket_index};

/// A single invariant violation, with enough context to locate it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckViolation {
    #[error("prologue sentinel corrupted")]
    BadPrologue,
    #[error("arena does not end in a zero-size allocated epilogue")]
    BadEpilogue,
    #[error("block at {offset}: header {header_size}/{header_allocated} != footer {footer_size}/{footer_allocated}")]
    TagMismatch {
        offset: usize,
        header_size: usize,
        header_allocated: bool,
        footer_size: usize,
        footer_allocated: bool,
    },
    #[error("block at {offset} is not 8-byte aligned")]
    Misaligned { offset: usize },
    #[error("block at {offset} has illegal size {size}")]
    BadSize { offset: usize, size: usize },
    #[error("block at {offset} runs past the arena end")]
    PastEnd { offset: usize },
    #[error("adjacent free blocks at {first} and {second}")]
    AdjacentFree { first: usize, second: usize },
    #[error("free block at {offset} sits in bucket {actual}, expected {expected}")]
    WrongBucket {
        offset: usize,
        expected: usize,
        actual: usize,
    },
    #[error("free block at {offset}: successor {successor} does not link back")]
    ListAsymmetry { offset: usize, successor: usize },
    #[error("allocated block at {offset} linked into bucket {bucket}")]
    AllocatedInList { offset: usize, bucket: usize },
    #[error("bucket {bucket} list is cyclic or overlong")]
    ListOverrun { bucket: usize },
    #[error("free block at {offset} is in no bucket list")]
    UnlistedFree { offset: usize },
}

/// Validates every heap invariant over a formatted arena image.
#[must_use]
pub fn check(bytes: &[u8]) -> Vec<CheckViolation> {
    let mut violations = Vec::new();

    let prologue_bp = DIRECTORY_BYTES + PAIR;
    let prologue = codec::read_tag(bytes, codec::header_of(prologue_bp));
    let prologue_footer = codec::read_tag(bytes, prologue_bp);
    if prologue.size != PAIR || !prologue.allocated || prologue_footer != prologue {
        violations.push(CheckViolation::BadPrologue);
        return violations;
    }

    // Address-order walk, collecting the set of free blocks.
    let mut free_blocks = HashSet::new();
    let mut prev_free: Option<usize> = None;
    let mut bp = DIRECTORY_BYTES + 4 * WORD;
    let mut saw_epilogue = false;
    while bp <= bytes.len() {
        let header = codec::read_tag(bytes, codec::header_of(bp));
        if header.size == 0 {
            // The epilogue must be allocated and flush with the arena end.
            saw_epilogue = header.allocated && bp == bytes.len();
            if !saw_epilogue {
                violations.push(CheckViolation::BadEpilogue);
            }
            break;
        }
        if bp % PAIR != 0 {
            violations.push(CheckViolation::Misaligned { offset: bp });
            break;
        }
        if header.size < MIN_BLOCK || header.size % PAIR != 0 {
            violations.push(CheckViolation::BadSize {
                offset: bp,
                size: header.size,
            });
            break;
        }
        if bp + header.size > bytes.len() {
            violations.push(CheckViolation::PastEnd { offset: bp });
            break;
        }
        let footer = codec::read_tag(bytes, bp + header.size - PAIR);
        if footer != header {
            violations.push(CheckViolation::TagMismatch {
                offset: bp,
                header_size: header.size,
                header_allocated: header.allocated,
                footer_size: footer.size,
                footer_allocated: footer.allocated,
            });
            break;
        }
        if !header.allocated {
            if let Some(prev) = prev_free {
                violations.push(CheckViolation::AdjacentFree {
                    first: prev,
                    second: bp,
                });
            }
            free_blocks.insert(bp);
            prev_free = Some(bp);
        } else {
            prev_free = None;
        }
        bp = codec::next_block(bytes, bp);
    }
    if !saw_epilogue && violations.is_empty() {
        violations.push(CheckViolation::BadEpilogue);
    }

    // Directory walk: membership, symmetry, and the free/listed sets must
    // agree exactly.
    let max_nodes = bytes.len() / MIN_BLOCK + 1;
    let mut listed = HashSet::new();
    for bucket in 0..NUM_BUCKETS {
        let mut node = directory::bucket_head(bytes, bucket);
        let mut steps = 0usize;
        while node != NIL {
            steps += 1;
            if steps > max_nodes {
                violations.push(CheckViolation::ListOverrun { bucket });
                break;
            }
            if !free_blocks.contains(&node) {
                violations.push(CheckViolation::AllocatedInList {
                    offset: node,
                    bucket,
                });
                break;
            }
            if !listed.insert(node) {
                violations.push(CheckViolation::ListOverrun { bucket });
                break;
            }
            let size = codec::block_size(bytes, node);
            let expected = bucket_index(size);
            if expected != bucket {
                violations.push(CheckViolation::WrongBucket {
                    offset: node,
                    expected,
                    actual: bucket,
                });
            }
            let next = directory::succ(bytes, node);
            if next != NIL && directory::pred(bytes, next) != node {
                violations.push(CheckViolation::ListAsymmetry {
                    offset: node,
                    successor: next,
                });
            }
            node = next;
        }
    }
    for &bp in &free_blocks {
        if !listed.contains(&bp) {
            violations.push(CheckViolation::UnlistedFree { offset: bp });
        }
    }

    violations
}
