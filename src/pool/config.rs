//! Pool configuration
//!
//! All policy lives here as explicit per-instance fields. Independent
//! pools can carry independent policies, which unit tests rely on.

use crate::error::{PoolError, PoolResult};

/// Configuration for [`AutoGrowthPool`](super::AutoGrowthPool)
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Power-of-two byte alignment applied to every request and to
    /// chunk sizes
    pub alignment: usize,
    /// Minimum reservation granularity; the effective chunk size is
    /// `max(align_up(chunk_size), alignment)`
    pub chunk_size: usize,
    /// When false the pool never returns idle chunks to the backend
    /// (fixed-pool mode); `reclaim` becomes a no-op
    pub allow_idle_chunk_release: bool,
    /// Extra guard bytes appended to every request before alignment
    pub extra_padding: usize,
    /// Run reclamation after every successful free
    pub free_idle_chunk_on_free: bool,
    /// Run reclamation before reserving a new chunk on a growth miss,
    /// trading reclaim latency for peak memory
    pub free_idle_chunk_on_growth_miss: bool,
    /// Emit a diagnostic summary after each reclamation pass
    pub trace_enabled: bool,
}

impl PoolConfig {
    /// Default request alignment (256 bytes, typical device requirement)
    pub const DEFAULT_ALIGNMENT: usize = 256;

    /// Default reservation granularity (4 MiB)
    pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

    pub fn new() -> Self {
        Self {
            alignment: Self::DEFAULT_ALIGNMENT,
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
            allow_idle_chunk_release: true,
            extra_padding: 0,
            free_idle_chunk_on_free: false,
            free_idle_chunk_on_growth_miss: false,
            trace_enabled: false,
        }
    }

    pub fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_extra_padding(mut self, extra_padding: usize) -> Self {
        self.extra_padding = extra_padding;
        self
    }

    pub fn with_idle_chunk_release(mut self, allow: bool) -> Self {
        self.allow_idle_chunk_release = allow;
        self
    }

    pub fn with_free_idle_chunk_on_free(mut self, enabled: bool) -> Self {
        self.free_idle_chunk_on_free = enabled;
        self
    }

    pub fn with_free_idle_chunk_on_growth_miss(mut self, enabled: bool) -> Self {
        self.free_idle_chunk_on_growth_miss = enabled;
        self
    }

    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.trace_enabled = enabled;
        self
    }

    /// Validate construction-time invariants
    ///
    /// # Errors
    /// `PoolError::InvalidConfiguration` if the alignment is zero or not
    /// a power of two.
    pub fn validate(&self) -> PoolResult<()> {
        if self.alignment == 0 || !self.alignment.is_power_of_two() {
            return Err(PoolError::InvalidConfiguration(format!(
                "alignment must be a power of two, got {}",
                self.alignment
            )));
        }
        Ok(())
    }

    /// Reservation granularity actually used for growth
    pub fn effective_chunk_size(&self) -> usize {
        align_up(self.chunk_size, self.alignment).max(self.alignment)
    }

    /// Realized size of a request: padded with guard bytes, then rounded
    /// up to the alignment. Rounding never decreases size.
    ///
    /// # Errors
    /// `PoolError::InvalidRequest` if the padded size overflows `usize`.
    pub fn realized_size(&self, requested: usize) -> PoolResult<usize> {
        let padded = requested
            .checked_add(self.extra_padding)
            .and_then(|v| v.checked_add(self.alignment - 1))
            .ok_or_else(|| {
                PoolError::InvalidRequest(format!("allocation size overflow: {}", requested))
            })?;
        Ok(padded & !(self.alignment - 1))
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Round `value` up to a multiple of `alignment` (a power of two)
pub(crate) fn align_up(value: usize, alignment: usize) -> usize {
    (value + alignment - 1) & !(alignment - 1)
}
