use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use super::{LockError, LockStore};

/// Prefix for every profile lock key in the shared store.
pub const LOCK_KEY_PREFIX: &str = "lock:profile:";

/// Per-record distributed lock on top of a [`LockStore`].
///
/// `acquire` is a single non-blocking `SET NX PX`; contention is reported to the
/// caller rather than waited out. `release` never fails: the TTL is the backstop
/// when the delete cannot be issued.
pub struct ProfileLock<L> {
    store: L,
    ttl: Duration,
}

impl<L> ProfileLock<L> {
    pub fn new(store: L, ttl: Duration) -> Self {
        ProfileLock { store, ttl }
    }

    /// The lock key for a record, e.g. `lock:profile:u1`.
    pub fn key_for(record_id: &str) -> String {
        format!("{}{}", LOCK_KEY_PREFIX, record_id)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Access the underlying store.
    pub fn store(&self) -> &L {
        &self.store
    }
}

impl<L: LockStore> ProfileLock<L> {
    /// Try to take the lock for `record_id`.
    /// Returns `Ok(false)` if another holder already owns it.
    pub async fn acquire(&self, record_id: &str) -> Result<bool, LockError> {
        let key = Self::key_for(record_id);
        let token = Uuid::new_v4().to_string();
        let acquired = self.store.set_if_absent(&key, &token, self.ttl).await?;
        debug!(key = %key, acquired, "profile lock acquire");
        Ok(acquired)
    }

    /// Delete the lock for `record_id`. Failures are logged and swallowed.
    pub async fn release(&self, record_id: &str) {
        let key = Self::key_for(record_id);
        match self.store.delete(&key).await {
            Ok(()) => debug!(key = %key, "profile lock released"),
            Err(err) => warn!(
                key = %key,
                error = %err,
                "profile lock release failed; relying on ttl expiry"
            ),
        }
    }

    pub async fn close(&self) -> Result<(), LockError> {
        self.store.close().await
    }
}
