//! Auto-growth best-fit memory pool
//!
//! Sits between callers and an expensive underlying allocator, serving
//! small, frequent, short-lived requests out of large pre-reserved
//! chunks.
//!
//! # Structure
//!
//! Three cooperating data structures:
//! 1. Chunk pool: creation-ordered chunks, one backend reservation each
//! 2. Block list: per chunk, an offset-ordered doubly-linked partition
//!    of the chunk into free and in-use spans with no gaps
//! 3. Free index: one global (size, chunk, offset)-ordered map over all
//!    free blocks, answering best-fit queries in O(log n)
//!
//! A growth miss reserves `max(request, chunk_size)` so that reservation
//! cost amortizes over many sub-allocations. Frees coalesce with
//! adjacent free blocks; chunks that collapse back to a single free
//! block can be returned to the backend.

pub mod allocation;
pub mod allocator;
pub mod block;
pub mod config;
pub mod free_index;
pub mod stats;

pub use allocation::{PoolAllocation, RegionKind};
pub use allocator::AutoGrowthPool;
pub use config::PoolConfig;
pub use stats::{BlockSnapshot, ChunkSnapshot, PoolSnapshot, PoolStats};
