//! Pool statistics and structural snapshots

/// Lifetime counters, owned by the pool instance.
///
/// Monotonically increasing, advisory only.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Counters {
    pub allocated_bytes: u64,
    pub allocated_count: u64,
    pub freed_bytes: u64,
    pub freed_count: u64,
}

/// Point-in-time statistics returned by
/// [`AutoGrowthPool::stats`](super::AutoGrowthPool::stats)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Total bytes handed out over the pool lifetime (realized sizes)
    pub allocated_bytes: u64,
    /// Total allocation requests served
    pub allocated_count: u64,
    /// Total bytes returned over the pool lifetime
    pub freed_bytes: u64,
    /// Total free requests served
    pub freed_count: u64,
    /// Bytes currently handed out (allocated minus freed)
    pub busy_bytes: u64,
    /// Bytes sitting in free blocks, available for reuse
    pub idle_bytes: usize,
    /// Number of free blocks across all chunks
    pub free_blocks: usize,
    /// Number of chunks currently reserved from the backend
    pub chunks: usize,
}

/// Structural view of one block, offsets relative to its chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSnapshot {
    pub offset: usize,
    pub size: usize,
    pub is_free: bool,
}

/// Structural view of one chunk and its block list, in offset order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSnapshot {
    /// Creation-ordered chunk id
    pub id: u64,
    /// Reserved size of the chunk
    pub size: usize,
    pub blocks: Vec<BlockSnapshot>,
}

/// Structural view of the whole pool.
///
/// Contains no backend addresses, so two pools that served identical
/// request sequences compare equal. This is the representation the
/// reproducibility guarantee and the invariant suites check against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    /// Chunks in creation order
    pub chunks: Vec<ChunkSnapshot>,
    /// Free index entries as (size, chunk id, offset), in index order
    pub free_entries: Vec<(usize, u64, usize)>,
}
