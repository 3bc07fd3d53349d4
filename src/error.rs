//! Unified error handling for PoolForge
//!
//! This module provides the crate-wide error type and its categorization.
//! Categories distinguish:
//! - User errors (bad request or configuration, actionable by callers)
//! - Recoverable errors (resource exhaustion, caller may free and retry)
//! - Backend errors (underlying allocator failures)
//! - Internal errors (bugs, contract violations)

use std::fmt;

/// Unified error type for PoolForge
///
/// All pool operations return this type. Use `category()` to decide
/// how to handle an error without matching every variant.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The underlying allocator could not satisfy a growth request,
    /// even after one idle-chunk reclamation retry.
    #[error("out of memory: failed to reserve {requested} bytes ({reason})")]
    OutOfMemory { requested: usize, reason: String },

    /// Invalid allocation request (zero size, size overflow)
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid pool configuration
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Freeing a handle this pool does not own, or a stale handle.
    /// This is a programming fault, never silently ignored: a stale
    /// free would leave the free index pointing at reused memory.
    #[error("invalid free: {0}")]
    InvalidFree(String),

    /// A region of a kind this pool does not manage was routed through
    /// its cleanup path
    #[error("unsupported region kind: {0}")]
    UnsupportedRegionKind(String),

    /// Underlying allocator failure other than exhaustion
    #[error("backend error: {0}")]
    BackendError(String),

    /// Internal error (indicates a bug)
    #[error("internal error: {0}")]
    InternalError(String),
}

impl PoolError {
    /// Categorize the error for handling decisions
    pub fn category(&self) -> ErrorCategory {
        match self {
            PoolError::InvalidRequest(_)
            | PoolError::InvalidConfiguration(_)
            | PoolError::UnsupportedRegionKind(_) => ErrorCategory::User,

            PoolError::OutOfMemory { .. } => ErrorCategory::Recoverable,

            PoolError::BackendError(_) => ErrorCategory::Backend,

            PoolError::InvalidFree(_) | PoolError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// Check if this error is recoverable (caller may free memory and retry)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Recoverable | ErrorCategory::Backend
        )
    }

    /// Check if this is a user-facing error (actionable by callers)
    pub fn is_user_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::User)
    }

    /// Check if this is an internal error (indicates a bug)
    pub fn is_internal_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::Internal)
    }
}

/// Error category for handling decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// User error - invalid request or configuration
    User,
    /// Recoverable error - resource exhaustion
    Recoverable,
    /// Backend error - underlying allocator failure
    Backend,
    /// Internal error - indicates a bug
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::User => write!(f, "User"),
            ErrorCategory::Recoverable => write!(f, "Recoverable"),
            ErrorCategory::Backend => write!(f, "Backend"),
            ErrorCategory::Internal => write!(f, "Internal"),
        }
    }
}

/// Helper type alias for Results using PoolError
pub type PoolResult<T> = std::result::Result<T, PoolError>;

/// Create an internal error with context
pub(crate) fn internal_err(msg: &str) -> PoolError {
    PoolError::InternalError(msg.to_string())
}
