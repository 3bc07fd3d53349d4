//! Auto-growth best-fit pool
//!
//! `allocate` serves requests from the free index when possible and
//! reserves a new chunk from the backend on a miss; `free` coalesces
//! with adjacent free neighbors; `reclaim` returns wholly-idle chunks
//! to the backend. One mutex serializes all three end to end, including
//! backend reservation calls on a growth miss, so no caller can observe
//! a torn intermediate state.
//!
//! Split policy: the allocated region is always carved from the tail
//! (high-offset end) of the matched free block; the remainder keeps the
//! low end. Both the cache-hit and growth-miss paths use the same side,
//! so replaying a request sequence reproduces placement exactly.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{DeviceAllocator, RawRegion};
use crate::error::{internal_err, PoolError, PoolResult};

use super::allocation::{PoolAllocation, RegionKind};
use super::block::{Block, BlockArena, BlockId, Chunk, ChunkId};
use super::config::PoolConfig;
use super::free_index::{FreeIndex, FreeKey};
use super::stats::{BlockSnapshot, ChunkSnapshot, Counters, PoolSnapshot, PoolStats};

/// Distinguishes pools so a handle can never be freed into the wrong one
static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Default)]
struct PoolInner {
    arena: BlockArena,
    chunks: BTreeMap<ChunkId, Chunk>,
    free_index: FreeIndex,
    next_chunk_id: u64,
    counters: Counters,
}

impl PoolInner {
    fn block(&self, id: BlockId) -> PoolResult<Block> {
        self.arena
            .get(id)
            .copied()
            .ok_or_else(|| internal_err("block id does not resolve"))
    }

    fn block_mut(&mut self, id: BlockId) -> PoolResult<&mut Block> {
        self.arena
            .get_mut(id)
            .ok_or_else(|| internal_err("block id does not resolve"))
    }

    fn set_head(&mut self, chunk: ChunkId, id: BlockId) -> PoolResult<()> {
        self.chunks
            .get_mut(&chunk)
            .map(|c| c.head = id)
            .ok_or_else(|| internal_err("chunk id does not resolve"))
    }

    fn set_tail(&mut self, chunk: ChunkId, id: BlockId) -> PoolResult<()> {
        self.chunks
            .get_mut(&chunk)
            .map(|c| c.tail = id)
            .ok_or_else(|| internal_err("chunk id does not resolve"))
    }

    /// Carve `size` bytes from the tail of free block `id`, which must
    /// be strictly larger. The low-offset remainder stays free and is
    /// re-indexed under its new key; `id` becomes the in-use block.
    fn split_tail(&mut self, id: BlockId, size: usize) -> PoolResult<()> {
        let block = self.block(id)?;
        let remaining = block.size - size;
        let remainder_id = self.arena.insert(Block {
            chunk: block.chunk,
            offset: block.offset,
            size: remaining,
            is_free: true,
            prev: block.prev,
            next: Some(id),
        });
        match block.prev {
            Some(prev) => self.block_mut(prev)?.next = Some(remainder_id),
            None => self.set_head(block.chunk, remainder_id)?,
        }
        {
            let carved = self.block_mut(id)?;
            carved.prev = Some(remainder_id);
            carved.offset = block.offset + remaining;
            carved.size = size;
            carved.is_free = false;
        }
        self.free_index.insert(
            FreeKey {
                size: remaining,
                chunk: block.chunk,
                offset: block.offset,
            },
            remainder_id,
        );
        Ok(())
    }

    /// Register a freshly reserved region as a chunk, carved into an
    /// in-use tail block of `size` bytes plus a free remainder at the
    /// low end if the region is larger.
    fn add_chunk(&mut self, region: RawRegion, size: usize) -> PoolResult<BlockId> {
        if region.size < size {
            return Err(internal_err("backend returned an undersized region"));
        }
        let chunk = ChunkId(self.next_chunk_id);
        self.next_chunk_id += 1;

        let remaining = region.size - size;
        let block_id = if remaining > 0 {
            let remainder_id = self.arena.insert(Block {
                chunk,
                offset: 0,
                size: remaining,
                is_free: true,
                prev: None,
                next: None,
            });
            let carved_id = self.arena.insert(Block {
                chunk,
                offset: remaining,
                size,
                is_free: false,
                prev: Some(remainder_id),
                next: None,
            });
            self.block_mut(remainder_id)?.next = Some(carved_id);
            self.chunks.insert(
                chunk,
                Chunk {
                    region,
                    head: remainder_id,
                    tail: carved_id,
                },
            );
            self.free_index.insert(
                FreeKey {
                    size: remaining,
                    chunk,
                    offset: 0,
                },
                remainder_id,
            );
            carved_id
        } else {
            let carved_id = self.arena.insert(Block {
                chunk,
                offset: 0,
                size,
                is_free: false,
                prev: None,
                next: None,
            });
            self.chunks.insert(
                chunk,
                Chunk {
                    region,
                    head: carved_id,
                    tail: carved_id,
                },
            );
            carved_id
        };
        Ok(block_id)
    }

    /// Merge adjacent `victim` into `survivor` (survivor at the lower
    /// offset). The victim's range is absorbed and its node removed;
    /// free index entries are the caller's responsibility.
    fn absorb_next(&mut self, survivor: BlockId, victim: BlockId) -> PoolResult<()> {
        let victim_block = self.block(victim)?;
        {
            let s = self.block_mut(survivor)?;
            s.size += victim_block.size;
            s.next = victim_block.next;
        }
        match victim_block.next {
            Some(next) => self.block_mut(next)?.prev = Some(survivor),
            None => self.set_tail(victim_block.chunk, survivor)?,
        }
        self.arena.remove(victim);
        Ok(())
    }

    fn remove_free_entry(&mut self, block: &Block) -> PoolResult<()> {
        let key = FreeKey {
            size: block.size,
            chunk: block.chunk,
            offset: block.offset,
        };
        self.free_index
            .remove(&key)
            .map(|_| ())
            .ok_or_else(|| internal_err("free index entry missing for free block"))
    }

    /// Release every chunk whose block list has collapsed to a single
    /// free block. Returns the total bytes given back to the backend.
    fn reclaim_idle(&mut self, backend: &dyn DeviceAllocator, config: &PoolConfig) -> usize {
        if !config.allow_idle_chunk_release {
            return 0;
        }
        let idle: Vec<(ChunkId, BlockId)> = self
            .chunks
            .iter()
            .filter(|(_, chunk)| chunk.head == chunk.tail)
            .filter_map(|(&id, chunk)| {
                let block = self.arena.get(chunk.head)?;
                block.is_free.then_some((id, chunk.head))
            })
            .collect();

        let mut released = 0usize;
        for (chunk_id, head) in idle {
            if let Some(block) = self.arena.remove(head) {
                self.free_index.remove(&FreeKey {
                    size: block.size,
                    chunk: chunk_id,
                    offset: block.offset,
                });
                if let Some(chunk) = self.chunks.remove(&chunk_id) {
                    tracing::debug!(chunk = chunk_id.0, bytes = block.size, "releasing idle chunk");
                    backend.release(chunk.region);
                    released += block.size;
                }
            }
        }

        if config.trace_enabled {
            self.trace();
        }
        released
    }

    /// Diagnostic summary in the shape callers watch after reclamation
    fn trace(&self) {
        const MB: f64 = (1024 * 1024) as f64;
        let idle_bytes: usize = self.free_index.iter().map(|(key, _)| key.size).sum();
        tracing::info!(
            alloc_mb = self.counters.allocated_bytes as f64 / MB,
            free_mb = self.counters.freed_bytes as f64 / MB,
            busy_mb = (self.counters.allocated_bytes - self.counters.freed_bytes) as f64 / MB,
            idle_mb = idle_bytes as f64 / MB,
            alloc_times = self.counters.allocated_count,
            free_times = self.counters.freed_count,
            free_blocks = self.free_index.len(),
            chunks = self.chunks.len(),
            "pool trace"
        );
    }

    fn snapshot(&self) -> PoolSnapshot {
        let mut chunks = Vec::with_capacity(self.chunks.len());
        for (&id, chunk) in &self.chunks {
            let mut blocks = Vec::new();
            let mut cursor = Some(chunk.head);
            while let Some(block_id) = cursor {
                match self.arena.get(block_id) {
                    Some(block) => {
                        blocks.push(BlockSnapshot {
                            offset: block.offset,
                            size: block.size,
                            is_free: block.is_free,
                        });
                        cursor = block.next;
                    }
                    None => break,
                }
            }
            chunks.push(ChunkSnapshot {
                id: id.0,
                size: chunk.region.size,
                blocks,
            });
        }
        let free_entries = self
            .free_index
            .iter()
            .map(|(key, _)| (key.size, key.chunk.0, key.offset))
            .collect();
        PoolSnapshot {
            chunks,
            free_entries,
        }
    }
}

/// Sub-allocator between callers and an expensive underlying allocator.
///
/// Serves variably-sized requests out of large pre-reserved chunks,
/// growing on demand and reusing freed regions via best-fit matching.
/// All operations are safe to call from parallel threads.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use poolforge::{AutoGrowthPool, HostBackend, PoolConfig};
///
/// let backend = Arc::new(HostBackend::new());
/// let pool = AutoGrowthPool::new(backend, PoolConfig::new()).unwrap();
///
/// let a = pool.allocate(1024).unwrap();
/// let b = pool.allocate(2048).unwrap();
/// assert_ne!(a.addr(), b.addr());
///
/// pool.free(b).unwrap();
/// pool.free(a).unwrap();
/// let released = pool.reclaim();
/// assert!(released > 0);
/// ```
pub struct AutoGrowthPool {
    backend: Arc<dyn DeviceAllocator>,
    config: PoolConfig,
    pool_id: u64,
    inner: Mutex<PoolInner>,
}

impl AutoGrowthPool {
    /// Create a pool over `backend` with the given configuration.
    ///
    /// No memory is reserved up front; the first allocation triggers
    /// the first chunk reservation.
    ///
    /// # Errors
    /// `PoolError::InvalidConfiguration` if the configuration fails
    /// validation.
    pub fn new(backend: Arc<dyn DeviceAllocator>, config: PoolConfig) -> PoolResult<Self> {
        config.validate()?;
        tracing::debug!(
            alignment = config.alignment,
            chunk_size = config.effective_chunk_size(),
            "created auto-growth pool"
        );
        Ok(Self {
            backend,
            config,
            pool_id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
            inner: Mutex::new(PoolInner::default()),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Allocate a region of at least `requested` bytes.
    ///
    /// The realized size is `requested` plus the configured guard
    /// padding, rounded up to the alignment. The returned handle stays
    /// valid until passed to [`free`](Self::free); later allocations
    /// never invalidate it.
    ///
    /// # Errors
    /// - `PoolError::InvalidRequest` for a zero-sized request
    /// - `PoolError::OutOfMemory` if the backend cannot satisfy a
    ///   growth miss even after one idle-chunk reclamation retry
    pub fn allocate(&self, requested: usize) -> PoolResult<PoolAllocation> {
        if requested == 0 {
            return Err(PoolError::InvalidRequest(
                "allocation size must be greater than zero".to_string(),
            ));
        }
        let size = self.config.realized_size(requested)?;
        tracing::trace!(requested, size, "allocate");

        let mut inner = self.inner.lock();
        let block_id = match inner.free_index.best_fit(size) {
            Some((key, id)) => {
                inner
                    .free_index
                    .remove(&key)
                    .ok_or_else(|| internal_err("best-fit entry vanished"))?;
                let block = inner.block(id)?;
                if block.size == size {
                    inner.block_mut(id)?.is_free = false;
                } else {
                    inner.split_tail(id, size)?;
                }
                id
            }
            None => self.grow(&mut inner, size)?,
        };

        inner.counters.allocated_bytes += size as u64;
        inner.counters.allocated_count += 1;

        let block = inner.block(block_id)?;
        let region = inner
            .chunks
            .get(&block.chunk)
            .map(|chunk| chunk.region)
            .ok_or_else(|| internal_err("chunk id does not resolve"))?;
        Ok(PoolAllocation::pooled(
            block_id,
            self.pool_id,
            region.addr + block.offset as u64,
            block.size,
        ))
    }

    /// Growth miss: reserve a new chunk, applying the configured
    /// reclamation policy and the single reclaim-and-retry on failure.
    fn grow(&self, inner: &mut PoolInner, size: usize) -> PoolResult<BlockId> {
        if self.config.free_idle_chunk_on_growth_miss {
            inner.reclaim_idle(&*self.backend, &self.config);
        }
        let want = size.max(self.config.effective_chunk_size());
        let region = match self.backend.reserve(want) {
            Ok(region) => region,
            Err(first) => {
                if self.config.free_idle_chunk_on_growth_miss {
                    // The idle sweep already ran before the reservation;
                    // there is nothing further to reclaim.
                    return Err(PoolError::OutOfMemory {
                        requested: size,
                        reason: first.to_string(),
                    });
                }
                inner.reclaim_idle(&*self.backend, &self.config);
                self.backend
                    .reserve(want)
                    .map_err(|second| PoolError::OutOfMemory {
                        requested: size,
                        reason: second.to_string(),
                    })?
            }
        };
        tracing::debug!(want, got = region.size, "growth miss reserved new chunk");
        inner.add_chunk(region, size)
    }

    /// Return a region to the pool, coalescing with free neighbors.
    ///
    /// Consumes the handle; the region is never handed out again until
    /// a later allocation reuses it.
    ///
    /// # Errors
    /// - `PoolError::UnsupportedRegionKind` for regions the pool does
    ///   not manage
    /// - `PoolError::InvalidFree` for a handle from another pool or a
    ///   stale handle
    pub fn free(&self, allocation: PoolAllocation) -> PoolResult<()> {
        if allocation.kind() != RegionKind::DeviceLocal {
            return Err(PoolError::UnsupportedRegionKind(format!(
                "pool manages DeviceLocal regions, got {:?}",
                allocation.kind()
            )));
        }
        if allocation.pool_id != self.pool_id {
            return Err(PoolError::InvalidFree(
                "allocation does not belong to this pool".to_string(),
            ));
        }
        let id = allocation
            .block
            .ok_or_else(|| internal_err("device-local allocation without a block id"))?;

        let mut inner = self.inner.lock();
        let block = match inner.arena.get(id).copied() {
            Some(block) => block,
            None => {
                return Err(PoolError::InvalidFree(
                    "stale allocation handle".to_string(),
                ))
            }
        };
        if block.is_free {
            return Err(PoolError::InvalidFree("block is already free".to_string()));
        }
        tracing::trace!(offset = block.offset, size = block.size, "free");

        inner.counters.freed_bytes += block.size as u64;
        inner.counters.freed_count += 1;
        inner.block_mut(id)?.is_free = true;

        let mut current = id;
        if let Some(prev_id) = block.prev {
            let prev = inner.block(prev_id)?;
            if prev.is_free {
                inner.remove_free_entry(&prev)?;
                inner.absorb_next(prev_id, current)?;
                current = prev_id;
            }
        }
        let merged = inner.block(current)?;
        if let Some(next_id) = merged.next {
            let next = inner.block(next_id)?;
            if next.is_free {
                inner.remove_free_entry(&next)?;
                inner.absorb_next(current, next_id)?;
            }
        }

        let merged = inner.block(current)?;
        inner.free_index.insert(
            FreeKey {
                size: merged.size,
                chunk: merged.chunk,
                offset: merged.offset,
            },
            current,
        );

        if self.config.free_idle_chunk_on_free {
            inner.reclaim_idle(&*self.backend, &self.config);
        }
        Ok(())
    }

    /// Release all wholly-idle chunks back to the backend.
    ///
    /// A chunk is idle iff its block list is exactly one free block.
    /// Returns the total bytes released; 0 in fixed-pool mode.
    pub fn reclaim(&self) -> usize {
        let mut inner = self.inner.lock();
        inner.reclaim_idle(&*self.backend, &self.config)
    }

    /// Point-in-time statistics
    pub fn stats(&self) -> PoolStats {
        let inner = self.inner.lock();
        let idle_bytes = inner.free_index.iter().map(|(key, _)| key.size).sum();
        PoolStats {
            allocated_bytes: inner.counters.allocated_bytes,
            allocated_count: inner.counters.allocated_count,
            freed_bytes: inner.counters.freed_bytes,
            freed_count: inner.counters.freed_count,
            busy_bytes: inner.counters.allocated_bytes - inner.counters.freed_bytes,
            idle_bytes,
            free_blocks: inner.free_index.len(),
            chunks: inner.chunks.len(),
        }
    }

    /// Structural dump of chunks, block lists, and free index.
    ///
    /// Address-free, so snapshots from pools that served identical
    /// request sequences compare equal.
    pub fn snapshot(&self) -> PoolSnapshot {
        self.inner.lock().snapshot()
    }
}

impl Drop for AutoGrowthPool {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        let chunks = std::mem::take(&mut inner.chunks);
        for (_, chunk) in chunks {
            self.backend.release(chunk.region);
        }
    }
}
