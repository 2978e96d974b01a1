//! Distributed lock: a TTL-bounded "create if absent" key in a shared store.
//!
//! The lock is a throughput optimization and a crash-safety valve. It does not
//! guarantee correctness on its own, since a holder can outlive its TTL; the
//! record version check does that.

mod error;
mod in_memory;
mod profile_lock;
mod store;

pub use error::LockError;
pub use in_memory::InMemoryLockStore;
pub use profile_lock::{ProfileLock, LOCK_KEY_PREFIX};
pub use store::LockStore;
