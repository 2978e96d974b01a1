use thiserror::Error;

use crate::mutation::MutationError;

/// Error type for record store operations.
///
/// A version mismatch is not an error: it is reported as
/// [`WriteOutcome::VersionMismatch`](super::WriteOutcome).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store did not answer in time.
    #[error("record store timed out: {0}")]
    Timeout(String),
    /// The store could not be reached.
    #[error("record store unavailable: {0}")]
    Unavailable(String),
    /// The store rejected the mutation itself; the same request will fail again.
    #[error("mutation rejected: {0}")]
    Validation(String),
    /// The request could not be understood by the store.
    #[error("malformed request: {0}")]
    Malformed(String),
    /// A stored document could not be (de)serialized.
    #[error("record serialization error: {0}")]
    Serde(String),
    /// Storage-level failure that will not clear by retrying.
    #[error("record storage error: {0}")]
    Storage(String),
    /// The store connection was closed by `shutdown`.
    #[error("record store closed")]
    Closed,
}

impl StoreError {
    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Timeout(_) | StoreError::Unavailable(_) => true,
            StoreError::Validation(_)
            | StoreError::Malformed(_)
            | StoreError::Serde(_)
            | StoreError::Storage(_)
            | StoreError::Closed => false,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, StoreError::Validation(_))
    }
}

impl From<MutationError> for StoreError {
    fn from(err: MutationError) -> Self {
        StoreError::Validation(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serde(err.to_string())
    }
}
