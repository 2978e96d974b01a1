use thiserror::Error;

/// Error type for lock store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// The underlying lock primitive was poisoned (e.g. a thread panicked while holding it).
    #[error("lock poisoned: {0}")]
    Poisoned(String),
    /// The store could not be reached or did not answer in time.
    #[error("lock store unavailable: {0}")]
    Unavailable(String),
    /// The store connection was closed by `shutdown`.
    #[error("lock store closed")]
    Closed,
    /// Failed to release the lock.
    #[error("lock release failed: {0}")]
    ReleaseFailed(String),
}
