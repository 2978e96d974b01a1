//! Mutation composition: turns a request's operations into one grouped
//! mutation document that the record store applies atomically.

mod document;
mod path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use document::{compose, missing_parent, validate, MutationDocument, RESERVED_FIELDS};
pub use path::FieldPath;

/// Field holding the store-owned version counter.
pub const VERSION_FIELD: &str = "version";
/// Field touched with the commit time on every write.
pub const LAST_MODIFIED_FIELD: &str = "lastModified";

/// How an operation changes its target field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationKind {
    Replace,
    Increment,
    AppendToList,
    RemoveFromList,
}

impl OperationKind {
    /// The document-store update operator for this kind.
    pub fn operator(self) -> &'static str {
        match self {
            OperationKind::Replace => "$set",
            OperationKind::Increment => "$inc",
            OperationKind::AppendToList => "$push",
            OperationKind::RemoveFromList => "$pull",
        }
    }
}

/// A single requested change to one field of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateOperation {
    pub field: String,
    pub value: Value,
    pub kind: OperationKind,
}

impl UpdateOperation {
    pub fn new(field: impl Into<String>, value: impl Into<Value>, kind: OperationKind) -> Self {
        UpdateOperation {
            field: field.into(),
            value: value.into(),
            kind,
        }
    }

    pub fn replace(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, value, OperationKind::Replace)
    }

    pub fn increment(field: impl Into<String>, delta: impl Into<Value>) -> Self {
        Self::new(field, delta, OperationKind::Increment)
    }

    pub fn append_to_list(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, value, OperationKind::AppendToList)
    }

    pub fn remove_from_list(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, value, OperationKind::RemoveFromList)
    }
}

/// Error type for building or applying a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error("request contains no operations")]
    NoOperations,
    #[error("field path is empty")]
    EmptyPath,
    #[error("field path '{0}' has an empty segment")]
    EmptySegment(String),
    #[error("field '{0}' is managed by the store and cannot be updated")]
    ReservedField(String),
    #[error("increment on '{0}' requires a numeric value")]
    NonNumericDelta(String),
    #[error("field '{0}' is targeted by conflicting operations")]
    PathConflict(String),
    #[error("field '{0}' is not numeric")]
    NotNumeric(String),
    #[error("field '{0}' is not a list")]
    NotAList(String),
    #[error("path '{0}' passes through a non-object value")]
    NotAnObject(String),
    #[error("increment on '{0}' overflows")]
    Overflow(String),
}
