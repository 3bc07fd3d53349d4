//! Global best-fit index over free blocks
//!
//! A single ordered map across all chunks, keyed by (size, chunk, offset).
//! Size-first ordering makes "smallest free block >= n" a range query;
//! the (chunk, offset) tie-break pins placement to the lowest address,
//! which keeps allocation order deterministic for a deterministic
//! request sequence.
//!
//! Consistency contract: every free block has exactly one entry whose
//! key size equals the block's current size; in-use blocks have none.
//! Any block resize (split or merge) must remove the entry first and
//! reinsert under the new key.

use std::collections::BTreeMap;

use super::block::{BlockId, ChunkId};

/// Key of a free index entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FreeKey {
    /// Current size of the referenced block
    pub size: usize,
    /// Owning chunk (creation-ordered)
    pub chunk: ChunkId,
    /// Offset within the chunk
    pub offset: usize,
}

/// Ordered index of all free blocks across all chunks
#[derive(Debug, Default)]
pub struct FreeIndex {
    entries: BTreeMap<FreeKey, BlockId>,
}

impl FreeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed free blocks
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert an entry for a free block.
    ///
    /// The key must not already be present; two free blocks can never
    /// share (size, chunk, offset).
    pub fn insert(&mut self, key: FreeKey, block: BlockId) {
        let previous = self.entries.insert(key, block);
        debug_assert!(previous.is_none(), "duplicate free index entry: {:?}", key);
    }

    /// Remove the entry for a free block
    pub fn remove(&mut self, key: &FreeKey) -> Option<BlockId> {
        self.entries.remove(key)
    }

    /// Find the smallest free block with size >= `size`, lowest
    /// (chunk, offset) among equals.
    pub fn best_fit(&self, size: usize) -> Option<(FreeKey, BlockId)> {
        let from = FreeKey {
            size,
            chunk: ChunkId(0),
            offset: 0,
        };
        self.entries
            .range(from..)
            .next()
            .map(|(key, block)| (*key, *block))
    }

    /// Iterate entries in (size, chunk, offset) order
    pub fn iter(&self) -> impl Iterator<Item = (&FreeKey, &BlockId)> {
        self.entries.iter()
    }
}
