//! Error taxonomy for the client-side CRDT runtime.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, YorkieError>;

/// Errors the runtime distinguishes, per the error-handling design (§7).
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum YorkieError {
    #[error("client is not active")]
    ClientNotActive,

    #[error("client is already activated")]
    ClientNotActivated,

    #[error("document is not attached")]
    DocumentNotAttached,

    #[error("document is not detached")]
    DocumentNotDetached,

    #[error("document has been removed")]
    DocumentRemoved,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("document size limit exceeded: {used} bytes used, {limit} bytes allowed")]
    SizeLimitExceeded { used: u64, limit: u64 },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("sync failed: {0}")]
    SyncFailed(String),

    #[error("conflict detected while installing snapshot: {0}")]
    Conflict(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl YorkieError {
    /// Whether a caller may retry the operation that produced this error.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, YorkieError::Transport(_))
    }

    /// Whether this error should trigger an auth-token refetch.
    #[inline]
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            YorkieError::Unauthorized(_) | YorkieError::PermissionDenied(_)
        )
    }
}
