//! Error types for the progress core

use thiserror::Error;

/// Errors that can occur when reading or mutating user progress
#[derive(Debug, Error)]
pub enum ProgressError {
    /// Requested user/topic/level/task progress does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Submitted topic/level/task id does not exist in the catalog
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// Progress was already initialized for this user
    #[error("progress already initialized for user {0}")]
    AlreadyInitialized(String),

    /// An optimistic write lost a race against a concurrent update
    #[error("concurrent update conflict for user {user_id} (expected version {expected})")]
    ConcurrentUpdateConflict {
        /// Owner of the contended aggregate
        user_id: String,
        /// Version the writer loaded before the conflicting update landed
        expected: u64,
    },

    /// The persistence layer failed or timed out
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A defensive check failed; indicates a bug, not bad user input
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Stored document could not be decoded
    #[error("corrupt progress document: {0}")]
    CorruptDocument(#[from] serde_json::Error),
}

impl ProgressError {
    /// Check if this error is transient (caller may retry the whole call)
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProgressError::ConcurrentUpdateConflict { .. } | ProgressError::StorageUnavailable(_)
        )
    }

    /// Check if this error means the request itself was malformed
    pub fn is_client_error(&self) -> bool {
        matches!(self, ProgressError::NotFound(_) | ProgressError::InvalidReference(_))
    }
}

/// Convenience alias used throughout the progress core
pub type Result<T> = std::result::Result<T, ProgressError>;
