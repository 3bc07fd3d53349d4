//! System-memory backend
//!
//! Backs the pool with heap allocations. Used as the CPU fallback
//! backend and throughout the test suite, where a configurable capacity
//! cap stands in for device memory exhaustion.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::error::{PoolError, PoolResult};

use super::{DeviceAllocator, RawRegion};

#[derive(Default)]
struct HostState {
    /// Live reservations keyed by base address. Owning the boxed slice
    /// keeps the address stable for the lifetime of the reservation.
    reserved: HashMap<u64, Box<[u8]>>,
    reserved_bytes: usize,
}

/// Host-memory implementation of [`DeviceAllocator`]
///
/// # Example
/// ```
/// use poolforge::backend::{DeviceAllocator, HostBackend};
///
/// let backend = HostBackend::new();
/// let region = backend.reserve(4096).unwrap();
/// assert_eq!(region.size, 4096);
/// backend.release(region);
/// ```
pub struct HostBackend {
    capacity_limit: Option<usize>,
    state: Mutex<HostState>,
    reserve_calls: AtomicU64,
    release_calls: AtomicU64,
}

impl HostBackend {
    /// Create a backend with no capacity limit
    pub fn new() -> Self {
        Self {
            capacity_limit: None,
            state: Mutex::new(HostState::default()),
            reserve_calls: AtomicU64::new(0),
            release_calls: AtomicU64::new(0),
        }
    }

    /// Create a backend that refuses reservations past `limit` total bytes.
    ///
    /// Drives out-of-memory paths in tests without a real device.
    pub fn with_capacity_limit(limit: usize) -> Self {
        Self {
            capacity_limit: Some(limit),
            ..Self::new()
        }
    }

    /// Bytes currently reserved and not yet released
    pub fn reserved_bytes(&self) -> usize {
        self.state.lock().reserved_bytes
    }

    /// Number of live reservations
    pub fn reservation_count(&self) -> usize {
        self.state.lock().reserved.len()
    }

    /// Total `reserve` calls over the backend lifetime (including failed ones)
    pub fn reserve_calls(&self) -> u64 {
        self.reserve_calls.load(Ordering::Relaxed)
    }

    /// Total `release` calls over the backend lifetime
    pub fn release_calls(&self) -> u64 {
        self.release_calls.load(Ordering::Relaxed)
    }
}

impl Default for HostBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceAllocator for HostBackend {
    fn reserve(&self, size: usize) -> PoolResult<RawRegion> {
        self.reserve_calls.fetch_add(1, Ordering::Relaxed);

        if size == 0 {
            return Err(PoolError::InvalidRequest(
                "cannot reserve a zero-byte region".to_string(),
            ));
        }

        let mut state = self.state.lock();
        if let Some(limit) = self.capacity_limit {
            if state.reserved_bytes + size > limit {
                return Err(PoolError::OutOfMemory {
                    requested: size,
                    reason: format!(
                        "host backend capacity limit {} exceeded ({} already reserved)",
                        limit, state.reserved_bytes
                    ),
                });
            }
        }

        let buf = vec![0u8; size].into_boxed_slice();
        let addr = buf.as_ptr() as u64;
        state.reserved.insert(addr, buf);
        state.reserved_bytes += size;

        tracing::debug!(addr, size, "host backend reserved region");
        Ok(RawRegion { addr, size })
    }

    fn release(&self, region: RawRegion) {
        self.release_calls.fetch_add(1, Ordering::Relaxed);

        let mut state = self.state.lock();
        if state.reserved.remove(&region.addr).is_some() {
            state.reserved_bytes -= region.size;
            tracing::debug!(addr = region.addr, size = region.size, "host backend released region");
        } else {
            tracing::warn!(
                addr = region.addr,
                "release of unknown region ignored by host backend"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_and_release() {
        let backend = HostBackend::new();
        let region = backend.reserve(1024).unwrap();
        assert_eq!(region.size, 1024);
        assert_eq!(backend.reserved_bytes(), 1024);
        assert_eq!(backend.reservation_count(), 1);

        backend.release(region);
        assert_eq!(backend.reserved_bytes(), 0);
        assert_eq!(backend.reservation_count(), 0);
    }

    #[test]
    fn test_zero_size_reserve_fails() {
        let backend = HostBackend::new();
        let result = backend.reserve(0);
        assert!(matches!(result, Err(PoolError::InvalidRequest(_))));
    }

    #[test]
    fn test_capacity_limit() {
        let backend = HostBackend::with_capacity_limit(2048);
        let a = backend.reserve(1024).unwrap();
        let _b = backend.reserve(1024).unwrap();

        let result = backend.reserve(1);
        assert!(matches!(result, Err(PoolError::OutOfMemory { .. })));

        // Releasing makes room again
        backend.release(a);
        assert!(backend.reserve(512).is_ok());
    }

    #[test]
    fn test_distinct_addresses() {
        let backend = HostBackend::new();
        let a = backend.reserve(256).unwrap();
        let b = backend.reserve(256).unwrap();
        assert_ne!(a.addr, b.addr);
        backend.release(a);
        backend.release(b);
    }

    #[test]
    fn test_call_counters() {
        let backend = HostBackend::with_capacity_limit(512);
        let region = backend.reserve(512).unwrap();
        let _ = backend.reserve(512); // fails, still counted
        backend.release(region);

        assert_eq!(backend.reserve_calls(), 2);
        assert_eq!(backend.release_calls(), 1);
    }

    #[test]
    fn test_unknown_release_is_ignored() {
        let backend = HostBackend::new();
        backend.release(RawRegion { addr: 0xdead, size: 64 });
        assert_eq!(backend.reserved_bytes(), 0);
    }
}
