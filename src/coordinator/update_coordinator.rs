use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, error, instrument, warn};

use super::backoff::backoff;
use super::config::{CoordinatorConfig, InvalidationPolicy};
use super::request::{UpdateError, UpdateRequest, UpdateResult};
use crate::cache::{CacheInvalidator, CacheView};
use crate::lock::{LockStore, ProfileLock};
use crate::mutation::{self, UpdateOperation};
use crate::record::{Record, RecordStore, StoreError, WriteOutcome};

/// Delta used by callers that want a plain `+1`.
pub const DEFAULT_INCREMENT: i64 = 1;

/// Outcome of a single read-compose-write round.
enum Attempt {
    Committed(Record),
    /// The version moved between our read and our write.
    Conflict,
    /// A store error that may clear on retry.
    Transient(StoreError),
    /// Terminal: no further attempts.
    Failed(UpdateError),
}

impl Attempt {
    fn from_store_error(err: StoreError) -> Self {
        if err.is_validation() {
            Attempt::Failed(UpdateError::Rejected(err))
        } else if err.is_retryable() {
            Attempt::Transient(err)
        } else {
            Attempt::Failed(UpdateError::Store(err))
        }
    }
}

/// Applies partial updates to a record safely under concurrent writers.
///
/// Two layers, composed here and nowhere else:
/// - an optional TTL-bounded distributed lock that serializes whole critical
///   sections across processes, and
/// - a compare-and-swap on the record version, which is what actually rules
///   out lost updates (the lock can expire mid-call, callers can skip it).
///
/// Each attempt re-reads the record; nothing is cached across retries. On a
/// committed write every cached view of the record is invalidated. The lock,
/// when taken, is released on every exit path.
pub struct UpdateCoordinator<L, R, C> {
    lock: ProfileLock<L>,
    records: R,
    caches: C,
    config: CoordinatorConfig,
    shut_down: AtomicBool,
}

impl<L, R, C> UpdateCoordinator<L, R, C> {
    pub fn new(lock_store: L, records: R, caches: C) -> Self {
        Self::with_config(lock_store, records, caches, CoordinatorConfig::default())
    }

    pub fn with_config(lock_store: L, records: R, caches: C, config: CoordinatorConfig) -> Self {
        UpdateCoordinator {
            lock: ProfileLock::new(lock_store, config.lock_ttl()),
            records,
            caches,
            config,
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn lock(&self) -> &ProfileLock<L> {
        &self.lock
    }

    pub fn records(&self) -> &R {
        &self.records
    }

    pub fn caches(&self) -> &C {
        &self.caches
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

impl<L, R, C> UpdateCoordinator<L, R, C>
where
    L: LockStore,
    R: RecordStore,
    C: CacheInvalidator,
{
    /// Apply `operations` to `record_id` as one atomic, versioned write.
    pub async fn update(
        &self,
        record_id: &str,
        operations: Vec<UpdateOperation>,
        use_lock: bool,
    ) -> UpdateResult {
        self.execute(UpdateRequest::new(record_id, operations).with_lock(use_lock))
            .await
    }

    /// Replace a single field.
    pub async fn update_field(
        &self,
        record_id: &str,
        field: &str,
        value: impl Into<Value>,
        use_lock: bool,
    ) -> UpdateResult {
        self.update(record_id, vec![UpdateOperation::replace(field, value)], use_lock)
            .await
    }

    /// Add `delta` to a numeric field; see [`DEFAULT_INCREMENT`].
    pub async fn increment_field(
        &self,
        record_id: &str,
        field: &str,
        delta: impl Into<Value>,
        use_lock: bool,
    ) -> UpdateResult {
        self.update(record_id, vec![UpdateOperation::increment(field, delta)], use_lock)
            .await
    }

    /// Push `value` onto a list field, creating the list if absent.
    pub async fn append_to_list(
        &self,
        record_id: &str,
        field: &str,
        value: impl Into<Value>,
        use_lock: bool,
    ) -> UpdateResult {
        self.update(
            record_id,
            vec![UpdateOperation::append_to_list(field, value)],
            use_lock,
        )
        .await
    }

    /// Remove every element equal to `value` from a list field.
    pub async fn remove_from_list(
        &self,
        record_id: &str,
        field: &str,
        value: impl Into<Value>,
        use_lock: bool,
    ) -> UpdateResult {
        self.update(
            record_id,
            vec![UpdateOperation::remove_from_list(field, value)],
            use_lock,
        )
        .await
    }

    /// Run one update request to a terminal state.
    #[instrument(skip_all, fields(record_id = %request.record_id, use_lock = request.use_lock))]
    pub async fn execute(&self, request: UpdateRequest) -> UpdateResult {
        if self.is_shut_down() {
            return UpdateResult::failure(UpdateError::ShutDown, 0);
        }
        if let Err(err) = mutation::validate(&request.operations) {
            return UpdateResult::failure(err.into(), 0);
        }
        if !request.use_lock {
            return self.run(&request).await;
        }

        match self.lock.acquire(&request.record_id).await {
            Ok(true) => {}
            Ok(false) => {
                return UpdateResult::failure(
                    UpdateError::LockHeld {
                        record_id: request.record_id.clone(),
                    },
                    0,
                )
            }
            Err(err) => return UpdateResult::failure(UpdateError::Lock(err), 0),
        }

        let outcome = AssertUnwindSafe(self.run(&request)).catch_unwind().await;
        self.lock.release(&request.record_id).await;
        match outcome {
            Ok(result) => result,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    /// Close the store connections. Later calls return `Fatal` without I/O.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(err) = self.lock.close().await {
            warn!(error = %err, "lock store close failed");
        }
        if let Err(err) = self.records.close().await {
            warn!(error = %err, "record store close failed");
        }
        debug!("update coordinator shut down");
    }

    async fn run(&self, request: &UpdateRequest) -> UpdateResult {
        let max_attempts = self.config.max_retries();
        let mut retries = 0;

        loop {
            let transient = match self.attempt(request).await {
                Attempt::Committed(record) => return self.finish(record, retries).await,
                Attempt::Failed(err) => return UpdateResult::failure(err, retries),
                Attempt::Conflict => None,
                Attempt::Transient(err) => Some(err),
            };

            retries += 1;
            if retries >= max_attempts {
                let err = match transient {
                    Some(err) => UpdateError::Store(err),
                    None => UpdateError::Conflict {
                        record_id: request.record_id.clone(),
                        attempts: retries,
                    },
                };
                warn!(attempts = retries, error = %err, "update gave up");
                return UpdateResult::failure(err, retries);
            }

            let delay = backoff(retries - 1, self.config.base_backoff());
            match &transient {
                Some(err) => warn!(
                    "transient store error (attempt {} of {}): {} (backoff={}ms)",
                    retries,
                    max_attempts,
                    err,
                    delay.as_millis()
                ),
                None => warn!(
                    "version conflict (attempt {} of {}) (backoff={}ms)",
                    retries,
                    max_attempts,
                    delay.as_millis()
                ),
            }
            tokio::time::sleep(delay).await;
        }
    }

    async fn attempt(&self, request: &UpdateRequest) -> Attempt {
        let record = match self.records.read(&request.record_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                return Attempt::Failed(UpdateError::NotFound {
                    record_id: request.record_id.clone(),
                })
            }
            Err(err) => return Attempt::from_store_error(err),
        };

        let document = match record.to_document() {
            Ok(document) => document,
            Err(err) => return Attempt::Failed(UpdateError::Store(err)),
        };
        if let Some(field) = mutation::missing_parent(&request.operations, &document) {
            return Attempt::Failed(UpdateError::InvalidState {
                record_id: request.record_id.clone(),
                field: field.to_string(),
            });
        }

        let mutation = mutation::compose(&request.operations, Utc::now());
        debug!(version = record.version, fields = mutation.len(), "conditional write");
        match self
            .records
            .conditional_write(&request.record_id, record.version, &mutation)
            .await
        {
            Ok(WriteOutcome::Applied(updated)) => Attempt::Committed(updated),
            Ok(WriteOutcome::VersionMismatch) => Attempt::Conflict,
            Err(err) => Attempt::from_store_error(err),
        }
    }

    async fn finish(&self, record: Record, retries: u32) -> UpdateResult {
        let mut failure = None;
        for view in CacheView::ALL {
            if let Err(err) = self.caches.invalidate(view, &record.id).await {
                error!(
                    view = %view,
                    version = record.version,
                    error = %err,
                    "cache invalidation failed after commit"
                );
                failure.get_or_insert(err);
            }
        }

        match (failure, self.config.invalidation) {
            (Some(source), InvalidationPolicy::Propagate) => UpdateResult::failure(
                UpdateError::InvalidationFailed {
                    record: Box::new(record),
                    source,
                },
                retries,
            ),
            _ => UpdateResult::success(record, retries),
        }
    }
}
