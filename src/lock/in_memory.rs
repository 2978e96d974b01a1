use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{LockError, LockStore};

struct Entry {
    token: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-memory lock store with per-key TTL.
///
/// Expired keys are treated as absent and lazily replaced, which matches how a
/// shared store evicts keys written with `PX`. Time is read from
/// `tokio::time::Instant` so tests can drive expiry on a paused clock.
/// Clone-friendly via Arc: clones share the same key space.
#[derive(Clone, Default)]
pub struct InMemoryLockStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    closed: Arc<AtomicBool>,
}

impl InMemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token of the live holder of `key`, if any.
    pub fn holder(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().ok()?;
        entries
            .get(key)
            .filter(|entry| entry.is_live(Instant::now()))
            .map(|entry| entry.token.clone())
    }

    pub fn is_held(&self, key: &str) -> bool {
        self.holder(key).is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), LockError> {
        if self.is_closed() {
            Err(LockError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LockStore for InMemoryLockStore {
    async fn set_if_absent(
        &self,
        key: &str,
        token: &str,
        ttl: Duration,
    ) -> Result<bool, LockError> {
        self.ensure_open()?;
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| LockError::Poisoned(e.to_string()))?;

        let now = Instant::now();
        if entries.get(key).is_some_and(|entry| entry.is_live(now)) {
            return Ok(false);
        }

        entries.insert(
            key.to_string(),
            Entry {
                token: token.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<(), LockError> {
        self.ensure_open()?;
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| LockError::Poisoned(e.to_string()))?;
        entries.remove(key);
        Ok(())
    }

    async fn close(&self) -> Result<(), LockError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
