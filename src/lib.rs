//! PoolForge - auto-growth best-fit memory pool
//!
//! A sub-allocator for expensive underlying allocators (device memory
//! with high per-call latency). Satisfies small, frequent requests out
//! of large pre-reserved chunks, grows the pool on demand, reuses freed
//! regions via best-fit matching, coalesces adjacent free regions, and
//! optionally releases entirely-idle chunks back to the backend.
//!
//! ```
//! use std::sync::Arc;
//! use poolforge::{AutoGrowthPool, HostBackend, PoolConfig};
//!
//! let backend = Arc::new(HostBackend::new());
//! let pool = AutoGrowthPool::new(backend, PoolConfig::new())?;
//!
//! let buffer = pool.allocate(4096)?;
//! pool.free(buffer)?;
//! # Ok::<(), poolforge::PoolError>(())
//! ```

pub mod backend;
pub mod error;
pub mod logging;
pub mod pool;

pub use backend::{DeviceAllocator, HostBackend, RawRegion};
pub use error::{ErrorCategory, PoolError, PoolResult};
pub use pool::{
    AutoGrowthPool, PoolAllocation, PoolConfig, PoolSnapshot, PoolStats, RegionKind,
};
