//! Safe concurrent updates for versioned profile records.
//!
//! Several request paths (interactive edits, learning jobs, batch
//! recomputation) mutate parts of the same profile. [`UpdateCoordinator`]
//! makes those partial updates safe by layering a self-expiring distributed
//! lock over optimistic, version-checked writes with bounded backoff, and by
//! evicting derived views once a write commits.
//!
//! The stores are injected: [`LockStore`], [`RecordStore`] and
//! [`CacheInvalidator`] describe the external systems, and the `InMemory*`
//! types implement them for tests and development.

pub mod cache;
pub mod coordinator;
pub mod lock;
pub mod mutation;
pub mod record;

pub use cache::{CacheError, CacheInvalidator, CacheView, InMemoryViewCache};
pub use coordinator::{
    CoordinatorConfig, ErrorKind, InvalidationPolicy, UpdateCoordinator, UpdateError,
    UpdateRequest, UpdateResult,
};
pub use lock::{InMemoryLockStore, LockError, LockStore, ProfileLock};
pub use mutation::{FieldPath, MutationDocument, MutationError, OperationKind, UpdateOperation};
pub use record::{InMemoryRecordStore, Record, RecordStore, StoreError, WriteOutcome};
