//! Block and chunk bookkeeping
//!
//! Each chunk is one backend reservation, partitioned into a doubly-linked
//! list of blocks ordered by offset. Blocks live in a generation-checked
//! slab, so the free index can hold `BlockId`s across arbitrary list
//! surgery without dangling: removing a block retires its slot generation
//! and any stale id stops resolving.

use crate::backend::RawRegion;

/// Identifier of a chunk, assigned monotonically at reservation time.
///
/// Ordering follows creation order, which makes `(ChunkId, offset)` a
/// total, reproducible address order independent of where the backend
/// happens to place regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChunkId(pub u64);

/// Stable identifier of a block slot in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId {
    index: u32,
    generation: u32,
}

/// A contiguous sub-range of one chunk, either free or in-use.
///
/// Blocks of a chunk are contiguous, non-overlapping, and exactly cover
/// the chunk's reserved range at all times.
#[derive(Debug, Clone, Copy)]
pub struct Block {
    /// Owning chunk
    pub chunk: ChunkId,
    /// Byte offset from the chunk base
    pub offset: usize,
    /// Size in bytes
    pub size: usize,
    /// Whether the block is available for allocation
    pub is_free: bool,
    /// Previous block in the chunk (lower offset)
    pub prev: Option<BlockId>,
    /// Next block in the chunk (higher offset)
    pub next: Option<BlockId>,
}

/// One backend reservation and its block list.
///
/// The list is never empty while the chunk exists; `head` and `tail` are
/// therefore plain ids, not options.
#[derive(Debug, Clone, Copy)]
pub struct Chunk {
    /// The owned backend reservation
    pub region: RawRegion,
    /// Lowest-offset block
    pub head: BlockId,
    /// Highest-offset block
    pub tail: BlockId,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    block: Option<Block>,
}

/// Generation-checked slab of blocks
///
/// Insert and remove are O(1); ids stay valid across unrelated inserts
/// and removes. A removed slot bumps its generation, so a stale id
/// resolves to `None` instead of whatever reused the slot.
#[derive(Debug, Default)]
pub struct BlockArena {
    slots: Vec<Slot>,
    free_slots: Vec<u32>,
    len: usize,
}

impl BlockArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live blocks
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert a block, returning its stable id
    pub fn insert(&mut self, block: Block) -> BlockId {
        self.len += 1;
        match self.free_slots.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.block = Some(block);
                BlockId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    block: Some(block),
                });
                BlockId {
                    index,
                    generation: 0,
                }
            }
        }
    }

    /// Remove a block, retiring its id
    pub fn remove(&mut self, id: BlockId) -> Option<Block> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation || slot.block.is_none() {
            return None;
        }
        let block = slot.block.take();
        slot.generation = slot.generation.wrapping_add(1);
        self.free_slots.push(id.index);
        self.len -= 1;
        block
    }

    pub fn get(&self, id: BlockId) -> Option<&Block> {
        let slot = self.slots.get(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.block.as_ref()
    }

    pub fn get_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.block.as_mut()
    }

    /// Check whether an id still resolves to a live block
    pub fn contains(&self, id: BlockId) -> bool {
        self.get(id).is_some()
    }
}
