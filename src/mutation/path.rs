use std::fmt;

use serde_json::Value;

use super::MutationError;

/// A dotted path into a record document, e.g. `subProfile.tone`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    pub fn parse(raw: &str) -> Result<Self, MutationError> {
        if raw.is_empty() {
            return Err(MutationError::EmptyPath);
        }
        let segments: Vec<String> = raw.split('.').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(MutationError::EmptySegment(raw.to_string()));
        }
        Ok(FieldPath { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// First segment: the top-level field this path lives under.
    pub fn root(&self) -> &str {
        &self.segments[0]
    }

    pub fn leaf(&self) -> &str {
        &self.segments[self.segments.len() - 1]
    }

    pub fn is_nested(&self) -> bool {
        self.segments.len() > 1
    }

    /// Segments leading to the container that holds the leaf.
    pub fn parent_segments(&self) -> &[String] {
        &self.segments[..self.segments.len() - 1]
    }

    /// True if `self` equals `other` or one is a segment-wise prefix of the other.
    pub fn overlaps(&self, other: &FieldPath) -> bool {
        self.segments
            .iter()
            .zip(other.segments.iter())
            .all(|(a, b)| a == b)
    }

    /// Resolve the leaf's container in `document`, if it exists and is an object.
    pub fn resolve_parent<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        let mut current = document;
        for segment in self.parent_segments() {
            current = current.as_object()?.get(segment)?;
        }
        current.is_object().then_some(current)
    }

    /// Resolve the value at this path in `document`.
    pub fn resolve<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        self.resolve_parent(document)?.as_object()?.get(self.leaf())
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}
