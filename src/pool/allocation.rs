//! Allocation handles

use super::block::BlockId;

/// Kind of a memory region routed through pool cleanup.
///
/// Higher layers route buffers of several kinds through one cleanup
/// path; the pool manages only `DeviceLocal` regions and rejects the
/// rest explicitly rather than leak or corrupt its index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    /// Region carved from a pool chunk
    DeviceLocal,
    /// Pinned host staging region, owned elsewhere
    HostPinned,
}

/// Handle to a region returned by [`AutoGrowthPool::allocate`](super::AutoGrowthPool::allocate).
///
/// The handle exclusively owns the region until passed back to
/// [`AutoGrowthPool::free`](super::AutoGrowthPool::free), which consumes
/// it. The handle is deliberately not `Clone`: with frees taking the
/// handle by value, a double free does not compile.
#[derive(Debug)]
pub struct PoolAllocation {
    pub(crate) block: Option<BlockId>,
    pub(crate) pool_id: u64,
    kind: RegionKind,
    addr: u64,
    size: usize,
}

impl PoolAllocation {
    pub(crate) fn pooled(block: BlockId, pool_id: u64, addr: u64, size: usize) -> Self {
        Self {
            block: Some(block),
            pool_id,
            kind: RegionKind::DeviceLocal,
            addr,
            size,
        }
    }

    /// Wrap a pinned host region so it can travel through the same
    /// cleanup plumbing as pooled regions. The pool itself will refuse
    /// to free it.
    pub fn host_pinned(addr: u64, size: usize) -> Self {
        Self {
            block: None,
            pool_id: 0,
            kind: RegionKind::HostPinned,
            addr,
            size,
        }
    }

    /// Address of the region in the backend's address space
    pub fn addr(&self) -> u64 {
        self.addr
    }

    /// Realized size in bytes (after padding and alignment)
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn kind(&self) -> RegionKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_pinned_accessors() {
        let allocation = PoolAllocation::host_pinned(0x1000, 512);
        assert_eq!(allocation.addr(), 0x1000);
        assert_eq!(allocation.size(), 512);
        assert_eq!(allocation.kind(), RegionKind::HostPinned);
        assert!(allocation.block.is_none());
    }
}
