use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::CacheError;
use crate::lock::LockError;
use crate::mutation::{MutationError, UpdateOperation};
use crate::record::{Record, StoreError};

fn default_use_lock() -> bool {
    true
}

/// One call's worth of changes to a single record. Not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub record_id: String,
    pub operations: Vec<UpdateOperation>,
    #[serde(default = "default_use_lock")]
    pub use_lock: bool,
}

impl UpdateRequest {
    /// A locked request; see [`UpdateRequest::with_lock`].
    pub fn new(record_id: impl Into<String>, operations: Vec<UpdateOperation>) -> Self {
        UpdateRequest {
            record_id: record_id.into(),
            operations,
            use_lock: true,
        }
    }

    pub fn single(record_id: impl Into<String>, operation: UpdateOperation) -> Self {
        Self::new(record_id, vec![operation])
    }

    pub fn with_lock(mut self, use_lock: bool) -> Self {
        self.use_lock = use_lock;
        self
    }
}

/// Terminal classification of a failed update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Another writer holds the record lock. The caller decides whether to retry.
    LockHeld,
    NotFound,
    /// A required sub-structure of the record is missing.
    InvalidState,
    /// The request, or the store's evaluation of it, is invalid and will fail again.
    ValidationFailed,
    /// Every optimistic attempt lost a version race.
    Conflict,
    Fatal,
}

impl ErrorKind {
    /// Whether a caller may reasonably repeat the same request later.
    pub fn is_retryable_by_caller(self) -> bool {
        matches!(self, ErrorKind::LockHeld | ErrorKind::Conflict)
    }
}

/// Why an update did not succeed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UpdateError {
    #[error("record '{record_id}' is locked by another writer")]
    LockHeld { record_id: String },
    #[error("record '{record_id}' not found")]
    NotFound { record_id: String },
    #[error("record '{record_id}' has no container for field '{field}'")]
    InvalidState { record_id: String, field: String },
    #[error("invalid update request: {0}")]
    InvalidRequest(#[from] MutationError),
    #[error("store rejected update: {0}")]
    Rejected(StoreError),
    #[error("version conflict on record '{record_id}' after {attempts} attempts")]
    Conflict { record_id: String, attempts: u32 },
    #[error("lock store failure: {0}")]
    Lock(LockError),
    #[error("record store failure: {0}")]
    Store(StoreError),
    /// The write committed but its cached views could not be evicted.
    #[error(
        "record '{}' committed at version {} but cache invalidation failed: {}",
        .record.id, .record.version, .source
    )]
    InvalidationFailed {
        record: Box<Record>,
        source: CacheError,
    },
    #[error("update coordinator is shut down")]
    ShutDown,
}

impl UpdateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UpdateError::LockHeld { .. } => ErrorKind::LockHeld,
            UpdateError::NotFound { .. } => ErrorKind::NotFound,
            UpdateError::InvalidState { .. } => ErrorKind::InvalidState,
            UpdateError::InvalidRequest(_) | UpdateError::Rejected(_) => {
                ErrorKind::ValidationFailed
            }
            UpdateError::Conflict { .. } => ErrorKind::Conflict,
            UpdateError::Lock(_)
            | UpdateError::Store(_)
            | UpdateError::InvalidationFailed { .. }
            | UpdateError::ShutDown => ErrorKind::Fatal,
        }
    }

    /// The committed record, when the failure happened after the write landed.
    pub fn committed_record(&self) -> Option<&Record> {
        match self {
            UpdateError::InvalidationFailed { record, .. } => Some(record.as_ref()),
            _ => None,
        }
    }
}

/// Outcome of one update call. Not persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateResult {
    outcome: Result<Record, UpdateError>,
    retry_count: u32,
}

impl UpdateResult {
    pub(crate) fn success(record: Record, retry_count: u32) -> Self {
        UpdateResult {
            outcome: Ok(record),
            retry_count,
        }
    }

    pub(crate) fn failure(error: UpdateError, retry_count: u32) -> Self {
        UpdateResult {
            outcome: Err(error),
            retry_count,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The updated record, on success.
    pub fn record(&self) -> Option<&Record> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&UpdateError> {
        self.outcome.as_ref().err()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error().map(UpdateError::kind)
    }

    /// Optimistic retries consumed by the call.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn into_result(self) -> Result<Record, UpdateError> {
        self.outcome
    }
}
