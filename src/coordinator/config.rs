use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_LOCK_TTL_MS: u64 = 5000;
pub const DEFAULT_BASE_BACKOFF_MS: u64 = 100;

/// What to do when a committed write cannot invalidate its cached views.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvalidationPolicy {
    /// Report the call as `Fatal` even though the write is durable.
    #[default]
    Propagate,
    /// Log the failure and report the call as successful.
    BestEffort,
}

/// Tuning knobs for [`UpdateCoordinator`](super::UpdateCoordinator).
///
/// Deserializes from JSON with every field optional:
///
/// ```
/// use profile_guard::CoordinatorConfig;
///
/// let config: CoordinatorConfig = serde_json::from_str(r#"{"max_retries": 5}"#).unwrap();
/// assert_eq!(config.max_retries(), 5);
/// assert_eq!(config.lock_ttl().as_millis(), 5000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Optimistic attempts per call before giving up.
    pub max_retries: u32,
    /// Lifetime of the distributed lock key.
    pub lock_ttl_ms: u64,
    /// Delay before the first retry; doubles on each further retry.
    ///
    /// With `max_retries` attempts the sleeps are `base, 2*base, ..,
    /// base * 2^(max_retries - 2)`, one between each pair of attempts and none
    /// after the last. Defaults give 100 ms then 200 ms.
    pub base_backoff_ms: u64,
    pub invalidation: InvalidationPolicy,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            lock_ttl_ms: DEFAULT_LOCK_TTL_MS,
            base_backoff_ms: DEFAULT_BASE_BACKOFF_MS,
            invalidation: InvalidationPolicy::default(),
        }
    }
}

impl CoordinatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of optimistic attempts (at least 1).
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max.max(1);
        self
    }

    /// Set the lock TTL.
    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the base backoff delay.
    pub fn with_base_backoff(mut self, base: Duration) -> Self {
        self.base_backoff_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the post-commit invalidation policy.
    pub fn with_invalidation(mut self, policy: InvalidationPolicy) -> Self {
        self.invalidation = policy;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries.max(1)
    }

    pub fn lock_ttl(&self) -> Duration {
        Duration::from_millis(self.lock_ttl_ms)
    }

    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }
}
