//! Cache invalidation for views derived from a record.
//!
//! Entries are evicted, never rewritten; the next read repopulates them.

mod in_memory;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use in_memory::InMemoryViewCache;

/// A cached view derived from a profile record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheView {
    /// The rendered style profile.
    ProfileView,
    /// The evolution score computed from the profile.
    ScoreView,
}

impl CacheView {
    /// Every view that depends on a record, in invalidation order.
    pub const ALL: [CacheView; 2] = [CacheView::ProfileView, CacheView::ScoreView];

    pub fn as_str(self) -> &'static str {
        match self {
            CacheView::ProfileView => "profile-view",
            CacheView::ScoreView => "score-view",
        }
    }
}

impl fmt::Display for CacheView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for cache invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
    #[error("cache lock poisoned")]
    Poisoned,
}

/// Evicts cached derived views of a record.
#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    async fn invalidate(&self, view: CacheView, id: &str) -> Result<(), CacheError>;
}
