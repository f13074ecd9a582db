//! Immediate coalescing of adjacent free blocks.
//!
//! Runs after every free and after every arena extension, so no externally
//! visible heap state ever contains two adjacent free blocks. The sentinel
//! prologue and epilogue blocks are permanently allocated, which lets the
//! neighbor inspection run without bounds special-casing.

use crate::codec::{self, BoundaryTag};
use crate::directory;

/// Merges the free block at `bp` with its free address-order neighbors and
/// inserts the result into the directory.
///
/// Returns the payload offset of the merged block, which moves backward when
/// the predecessor participates.
pub fn coalesce(bytes: &mut [u8], bp: usize) -> usize {
    let prev = codec::prev_block(bytes, bp);
    let next = codec::next_block(bytes, bp);
    let prev_free = !codec::is_allocated(bytes, prev);
    let next_free = !codec::is_allocated(bytes, next);

    let mut bp = bp;
    let mut size = codec::block_size(bytes, bp);

    match (prev_free, next_free) {
        (false, false) => {}
        (false, true) => {
            directory::remove(bytes, next);
            size += codec::block_size(bytes, next);
            codec::write_block_tags(bytes, bp, BoundaryTag::free(size));
        }
        (true, false) => {
            directory::remove(bytes, prev);
            size += codec::block_size(bytes, prev);
            bp = prev;
            codec::write_block_tags(bytes, bp, BoundaryTag::free(size));
        }
        (true, true) => {
            directory::remove(bytes, prev);
            directory::remove(bytes, next);
            size += codec::block_size(bytes, prev) + codec::block_size(bytes, next);
            bp = prev;
            codec::write_block_tags(bytes, bp, BoundaryTag::free(size));
        }
    }

    directory::insert(bytes, bp);
    bp
}
