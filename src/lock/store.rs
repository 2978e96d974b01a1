use std::time::Duration;

use async_trait::async_trait;

use super::LockError;

/// Client for a shared key-value store that provides the lock primitive.
///
/// The contract is the Redis pair `SET key value PX <ttl_ms> NX` / `DEL key`.
/// Implementations are pure pass-through: no retry, no blocking.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Create `key` holding `token` only if it does not exist, expiring after `ttl`.
    /// Returns `Ok(true)` if the key was created, `Ok(false)` if it was already present.
    async fn set_if_absent(&self, key: &str, token: &str, ttl: Duration)
        -> Result<bool, LockError>;

    /// Delete `key` unconditionally. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), LockError>;

    /// Release any held connections. Must be idempotent.
    async fn close(&self) -> Result<(), LockError> {
        Ok(())
    }
}
