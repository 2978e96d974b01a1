use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{CacheError, CacheInvalidator, CacheView};

#[derive(Default)]
struct State {
    entries: HashMap<(CacheView, String), Value>,
    invalidations: Vec<(CacheView, String)>,
}

/// In-memory view cache that records every invalidation it receives.
///
/// Clone-friendly via Arc.
#[derive(Clone, Default)]
pub struct InMemoryViewCache {
    state: Arc<Mutex<State>>,
}

impl InMemoryViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, view: CacheView, id: &str, value: Value) -> Result<(), CacheError> {
        let mut state = self.state.lock().map_err(|_| CacheError::Poisoned)?;
        state.entries.insert((view, id.to_string()), value);
        Ok(())
    }

    pub fn get(&self, view: CacheView, id: &str) -> Option<Value> {
        let state = self.state.lock().ok()?;
        state.entries.get(&(view, id.to_string())).cloned()
    }

    /// Every `(view, id)` invalidated so far, in call order.
    pub fn invalidations(&self) -> Vec<(CacheView, String)> {
        self.state
            .lock()
            .map(|state| state.invalidations.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CacheInvalidator for InMemoryViewCache {
    async fn invalidate(&self, view: CacheView, id: &str) -> Result<(), CacheError> {
        let mut state = self.state.lock().map_err(|_| CacheError::Poisoned)?;
        let evicted = state.entries.remove(&(view, id.to_string())).is_some();
        state.invalidations.push((view, id.to_string()));
        debug!(view = %view, id, evicted, "cache invalidated");
        Ok(())
    }
}
