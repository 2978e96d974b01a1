//! Records - the versioned profile documents protected by the update protocol.
//!
//! The store owns the version counter. The only way to change a record is a
//! conditional write that matches on `{ id, version }`.

mod error;
mod in_memory;
mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::mutation::FieldPath;

pub use error::StoreError;
pub use in_memory::InMemoryRecordStore;
pub use store::{RecordStore, WriteOutcome};

/// A profile record as stored in the document store.
///
/// Fields other than the four managed ones are kept in `fields` and flattened
/// into the same document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_profile: Option<Map<String, Value>>,
    pub last_modified: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Record {
            id: id.into(),
            version: 0,
            sub_profile: None,
            last_modified: Utc::now(),
            fields: Map::new(),
        }
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn with_sub_profile(mut self, sub_profile: Map<String, Value>) -> Self {
        self.sub_profile = Some(sub_profile);
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn to_document(&self) -> Result<Value, StoreError> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_document(document: Value) -> Result<Self, StoreError> {
        Ok(serde_json::from_value(document)?)
    }

    /// Read the value at a dotted path, e.g. `subProfile.tone`.
    pub fn get(&self, path: &str) -> Option<Value> {
        let path = FieldPath::parse(path).ok()?;
        let document = self.to_document().ok()?;
        path.resolve(&document).cloned()
    }
}
