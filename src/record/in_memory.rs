//! InMemoryRecordStore - HashMap-backed document store for testing and development.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use super::{Record, RecordStore, StoreError, WriteOutcome};
use crate::mutation::{MutationDocument, VERSION_FIELD};

/// In-memory document store keyed by record id.
///
/// Documents are kept as JSON values and mutated with the same grouped
/// operator document a real store would receive. Clone-friendly via Arc.
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    documents: Arc<RwLock<HashMap<String, Value>>>,
    closed: Arc<AtomicBool>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a record as-is, version included.
    pub fn put(&self, record: &Record) -> Result<(), StoreError> {
        let document = record.to_document()?;
        let mut documents = self
            .documents
            .write()
            .map_err(|_| StoreError::Storage("lock poisoned".into()))?;
        documents.insert(record.id.clone(), document);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.documents.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.is_closed() {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

fn stored_version(document: &Value) -> Result<u64, StoreError> {
    document
        .get(VERSION_FIELD)
        .and_then(Value::as_u64)
        .ok_or_else(|| StoreError::Serde("stored document has no numeric version".into()))
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn read(&self, id: &str) -> Result<Option<Record>, StoreError> {
        self.ensure_open()?;
        let documents = self
            .documents
            .read()
            .map_err(|_| StoreError::Storage("lock poisoned".into()))?;

        match documents.get(id) {
            Some(document) => Ok(Some(Record::from_document(document.clone())?)),
            None => Ok(None),
        }
    }

    async fn conditional_write(
        &self,
        id: &str,
        expected_version: u64,
        mutation: &MutationDocument,
    ) -> Result<WriteOutcome, StoreError> {
        self.ensure_open()?;
        let mut documents = self
            .documents
            .write()
            .map_err(|_| StoreError::Storage("lock poisoned".into()))?;

        let Some(current) = documents.get(id) else {
            return Ok(WriteOutcome::VersionMismatch);
        };
        if stored_version(current)? != expected_version {
            return Ok(WriteOutcome::VersionMismatch);
        }

        let next = mutation.apply(current)?;
        // The mutation applied, but the result is no longer a record.
        let record = Record::from_document(next.clone()).map_err(|err| {
            StoreError::Validation(format!("mutation breaks record shape: {}", err))
        })?;
        if record.id != id {
            return Err(StoreError::Malformed(format!(
                "mutation would change record id '{}' to '{}'",
                id, record.id
            )));
        }
        if record.version != expected_version + 1 {
            return Err(StoreError::Malformed(format!(
                "mutation must advance version {} by exactly one, got {}",
                expected_version, record.version
            )));
        }

        documents.insert(id.to_string(), next);
        Ok(WriteOutcome::Applied(record))
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
