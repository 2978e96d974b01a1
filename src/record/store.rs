use async_trait::async_trait;

use super::{Record, StoreError};
use crate::mutation::MutationDocument;

/// Result of a conditional write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome {
    /// The filter matched; the mutation was applied and this is the post-update record.
    Applied(Record),
    /// No document matched `{ id, version }`. Another writer got there first
    /// (or the record is gone).
    VersionMismatch,
}

/// Client for a versioned document store.
///
/// Implementations are pure pass-through. The conditional write must be atomic:
/// either the whole mutation lands under the version filter or nothing changes.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read a record and its current version. Returns `None` if it does not exist.
    async fn read(&self, id: &str) -> Result<Option<Record>, StoreError>;

    /// Apply `mutation` to `id` only if its current version equals `expected_version`.
    async fn conditional_write(
        &self,
        id: &str,
        expected_version: u64,
        mutation: &MutationDocument,
    ) -> Result<WriteOutcome, StoreError>;

    /// Release any held connections. Must be idempotent.
    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
