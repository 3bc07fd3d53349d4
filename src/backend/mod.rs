//! Underlying allocator abstraction
//!
//! The pool never touches raw memory itself; it sub-divides large regions
//! obtained from a [`DeviceAllocator`]. Device backends (HIP, CUDA, Vulkan)
//! implement this trait over their native allocation calls; [`HostBackend`]
//! implements it over system memory for CPU fallback and testing.

mod host;

pub use host::HostBackend;

use crate::error::PoolResult;

/// One contiguous reservation obtained from an underlying allocator.
///
/// `addr` is the base address of the region in the backend's address
/// space (a device pointer for GPU backends, a host pointer for
/// [`HostBackend`]). The pool treats it as an opaque ordered value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawRegion {
    /// Base address of the region
    pub addr: u64,
    /// Size of the region in bytes
    pub size: usize,
}

/// Capability to reserve and release contiguous memory regions.
///
/// Reservation is expected to be expensive (driver round-trip), which is
/// why the pool amortizes it over many sub-allocations. `reserve` may
/// fail with `PoolError::OutOfMemory`; `release` is infallible, matching
/// the free side of device allocators.
///
/// Implementations must be `Send + Sync`: the pool calls into the
/// backend while holding its own lock, from any caller thread.
pub trait DeviceAllocator: Send + Sync {
    /// Reserve a contiguous region of at least `size` bytes.
    ///
    /// The returned region may be larger than requested; the pool honors
    /// the actual size.
    ///
    /// # Errors
    /// - `PoolError::OutOfMemory` if the backend is exhausted
    /// - `PoolError::BackendError` for driver-level failures
    fn reserve(&self, size: usize) -> PoolResult<RawRegion>;

    /// Release a region previously returned by `reserve`.
    fn release(&self, region: RawRegion);
}
