//! Update coordinator - the safe concurrent update protocol for one record.
//!
//! ```text
//! caller -> [lock acquire] -> loop { read -> compose -> conditional write }
//!        -> [invalidate views] -> [lock release] -> UpdateResult
//! ```

mod backoff;
mod config;
mod request;
mod update_coordinator;

pub use backoff::backoff;
pub use config::{
    CoordinatorConfig, InvalidationPolicy, DEFAULT_BASE_BACKOFF_MS, DEFAULT_LOCK_TTL_MS,
    DEFAULT_MAX_RETRIES,
};
pub use request::{ErrorKind, UpdateError, UpdateRequest, UpdateResult};
pub use update_coordinator::{UpdateCoordinator, DEFAULT_INCREMENT};
