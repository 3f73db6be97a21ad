//! Error types for queue operations.

use thiserror::Error;

/// Errors produced by the queue and its collaborators.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The executor's rendezvous was interrupted before it could return.
    #[error("pop interrupted for executor `{0}`")]
    Interrupted(String),
    /// An executor called `pop` while it was already parked.
    #[error("executor `{0}` is already parked")]
    AlreadyParked(String),
    /// The current caller may not abort the named task.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// Creating the executable for a dispatched task failed.
    #[error("failed to create executable: {0}")]
    Executable(String),
    /// Persistence I/O failure with context. Callers treat the snapshot as
    /// best-effort and log instead of propagating.
    #[error("queue persistence error: {0}")]
    Persistence(#[from] std::io::Error),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
