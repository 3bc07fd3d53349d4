//! Structural invariant tests for the auto-growth pool
//!
//! Every check here works off `snapshot()`, the address-free structural
//! dump: chunk partitioning, free index consistency, coalescing, and
//! reproducibility of placement.

use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use poolforge::{AutoGrowthPool, HostBackend, PoolAllocation, PoolConfig, PoolSnapshot};

fn small_pool() -> (Arc<HostBackend>, AutoGrowthPool) {
    let backend = Arc::new(HostBackend::new());
    let config = PoolConfig::new().with_alignment(8).with_chunk_size(4096);
    let pool = AutoGrowthPool::new(backend.clone(), config).unwrap();
    (backend, pool)
}

/// Partition invariant: blocks of every chunk are contiguous,
/// non-overlapping, and exactly cover the chunk. Free index invariant:
/// entries correspond one-to-one with free blocks, key sizes matching.
fn check_invariants(snapshot: &PoolSnapshot) {
    let mut free_blocks: Vec<(usize, u64, usize)> = Vec::new();
    for chunk in &snapshot.chunks {
        assert!(
            !chunk.blocks.is_empty(),
            "chunk {} has an empty block list",
            chunk.id
        );
        let mut expected_offset = 0usize;
        for block in &chunk.blocks {
            assert_eq!(
                block.offset, expected_offset,
                "gap or overlap at offset {} in chunk {}",
                block.offset, chunk.id
            );
            assert!(block.size > 0, "zero-sized block in chunk {}", chunk.id);
            expected_offset += block.size;
            if block.is_free {
                free_blocks.push((block.size, chunk.id, block.offset));
            }
        }
        assert_eq!(
            expected_offset, chunk.size,
            "blocks do not cover chunk {}",
            chunk.id
        );
    }

    free_blocks.sort_unstable();
    let mut entries = snapshot.free_entries.clone();
    entries.sort_unstable();
    assert_eq!(
        free_blocks, entries,
        "free index out of sync with block lists"
    );
}

#[test]
fn test_invariants_hold_under_random_workload() {
    let (_backend, pool) = small_pool();
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let mut live: Vec<PoolAllocation> = Vec::new();

    for step in 0..600 {
        let do_alloc = live.is_empty() || rng.gen_bool(0.6);
        if do_alloc {
            let size = rng.gen_range(1..3000);
            live.push(pool.allocate(size).unwrap());
        } else {
            let victim = rng.gen_range(0..live.len());
            pool.free(live.swap_remove(victim)).unwrap();
        }
        if step % 50 == 0 {
            check_invariants(&pool.snapshot());
        }
    }
    check_invariants(&pool.snapshot());

    for allocation in live.drain(..) {
        pool.free(allocation).unwrap();
    }
    check_invariants(&pool.snapshot());
}

#[test]
fn test_live_handles_never_alias() {
    let (_backend, pool) = small_pool();
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut live: Vec<PoolAllocation> = Vec::new();

    for _ in 0..300 {
        if live.len() > 20 && rng.gen_bool(0.5) {
            let victim = rng.gen_range(0..live.len());
            pool.free(live.swap_remove(victim)).unwrap();
        } else {
            live.push(pool.allocate(rng.gen_range(1..1500)).unwrap());
        }

        let mut ranges: Vec<(u64, u64)> = live
            .iter()
            .map(|a| (a.addr(), a.addr() + a.size() as u64))
            .collect();
        ranges.sort_unstable();
        for pair in ranges.windows(2) {
            assert!(
                pair[0].1 <= pair[1].0,
                "live handles overlap: {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    for allocation in live.drain(..) {
        pool.free(allocation).unwrap();
    }
}

#[test]
fn test_allocate_free_round_trip_restores_state() {
    let (_backend, pool) = small_pool();

    // Warm the pool so the round trip is served from an existing chunk
    let warm = pool.allocate(128).unwrap();
    pool.free(warm).unwrap();

    let before = pool.snapshot();
    let allocation = pool.allocate(100).unwrap();
    pool.free(allocation).unwrap();
    let after = pool.snapshot();

    assert_eq!(before, after);
}

#[test]
fn test_round_trip_with_free_on_free_restores_empty_pool() {
    let backend = Arc::new(HostBackend::new());
    let config = PoolConfig::new()
        .with_alignment(8)
        .with_chunk_size(4096)
        .with_free_idle_chunk_on_free(true);
    let pool = AutoGrowthPool::new(backend, config).unwrap();

    let before = pool.snapshot();
    assert!(before.chunks.is_empty());

    let allocation = pool.allocate(100).unwrap();
    pool.free(allocation).unwrap();

    assert_eq!(before, pool.snapshot());
}

#[test]
fn test_coalescing_completeness_in_any_order() {
    let (_backend, pool) = small_pool();

    // Free orders to exercise left merge, right merge, and both at once
    let orders: [[usize; 4]; 5] = [
        [0, 1, 2, 3],
        [3, 2, 1, 0],
        [1, 3, 0, 2],
        [2, 0, 3, 1],
        [0, 2, 1, 3],
    ];

    for order in orders {
        let mut handles: Vec<Option<PoolAllocation>> = (0..4)
            .map(|_| Some(pool.allocate(500).unwrap()))
            .collect();
        let snapshot = pool.snapshot();
        assert_eq!(snapshot.chunks.len(), 1, "all carvings share one chunk");

        for index in order {
            let handle = handles[index].take().unwrap();
            pool.free(handle).unwrap();
        }

        let snapshot = pool.snapshot();
        assert_eq!(snapshot.chunks.len(), 1);
        let blocks = &snapshot.chunks[0].blocks;
        assert_eq!(blocks.len(), 1, "order {:?} left fragments", order);
        assert!(blocks[0].is_free);
        assert_eq!(blocks[0].size, snapshot.chunks[0].size);
        check_invariants(&snapshot);
    }
}

#[test]
fn test_reclaim_after_full_coalesce() {
    let (backend, pool) = small_pool();

    let a = pool.allocate(700).unwrap();
    let b = pool.allocate(900).unwrap();
    pool.free(a).unwrap();
    pool.free(b).unwrap();

    let released = pool.reclaim();
    assert_eq!(released, 4096);

    let snapshot = pool.snapshot();
    assert!(snapshot.chunks.is_empty());
    assert!(snapshot.free_entries.is_empty());
    assert_eq!(backend.reserved_bytes(), 0);
}

#[derive(Debug, Clone, Copy)]
enum Op {
    Alloc(usize),
    /// Free the nth oldest live handle
    Free(usize),
}

fn replay(pool: &AutoGrowthPool, ops: &[Op]) {
    let mut live: Vec<PoolAllocation> = Vec::new();
    for op in ops {
        match *op {
            Op::Alloc(size) => live.push(pool.allocate(size).unwrap()),
            Op::Free(position) => {
                let handle = live.remove(position % live.len());
                pool.free(handle).unwrap();
            }
        }
    }
    for handle in live.drain(..) {
        pool.free(handle).unwrap();
    }
}

#[test]
fn test_identical_sequences_yield_identical_structure() {
    let mut rng = ChaCha8Rng::seed_from_u64(1234);
    let mut ops = Vec::new();
    let mut live_count = 0usize;
    for _ in 0..400 {
        if live_count == 0 || rng.gen_bool(0.55) {
            ops.push(Op::Alloc(rng.gen_range(1..2500)));
            live_count += 1;
        } else {
            ops.push(Op::Free(rng.gen_range(0..1000)));
            live_count -= 1;
        }
    }

    let config = PoolConfig::new().with_alignment(16).with_chunk_size(8192);
    let pool_a = AutoGrowthPool::new(Arc::new(HostBackend::new()), config.clone()).unwrap();
    let pool_b = AutoGrowthPool::new(Arc::new(HostBackend::new()), config).unwrap();

    replay(&pool_a, &ops);
    replay(&pool_b, &ops);

    assert_eq!(pool_a.snapshot(), pool_b.snapshot());
    assert_eq!(pool_a.stats(), pool_b.stats());
}

#[test]
fn test_best_fit_prefers_smallest_then_lowest_address() {
    let (_backend, pool) = small_pool();

    // Carve three in-use blocks with free holes between them by freeing
    // alternating allocations: layout ends with two free holes of
    // different sizes plus the leading remainder.
    let keep_a = pool.allocate(512).unwrap();
    let hole_big = pool.allocate(1024).unwrap();
    let keep_b = pool.allocate(512).unwrap();
    let hole_small = pool.allocate(256).unwrap();
    let keep_c = pool.allocate(512).unwrap();

    let small_addr = hole_small.addr();
    pool.free(hole_big).unwrap();
    pool.free(hole_small).unwrap();

    // 200 -> realized 200; the 256 hole is the smallest sufficient block
    // and must win over the 1024 hole and the leading remainder.
    let reused = pool.allocate(200).unwrap();
    let hole_start = small_addr;
    let hole_end = small_addr + 256;
    assert!(
        reused.addr() >= hole_start && reused.addr() + reused.size() as u64 <= hole_end,
        "best fit did not reuse the smallest hole"
    );

    for handle in [keep_a, keep_b, keep_c, reused] {
        pool.free(handle).unwrap();
    }
    check_invariants(&pool.snapshot());
}
