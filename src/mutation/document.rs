use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::map::Entry;
use serde_json::{Map, Number, Value};

use super::{
    FieldPath, MutationError, OperationKind, UpdateOperation, LAST_MODIFIED_FIELD, VERSION_FIELD,
};

/// Top-level fields a caller may not target: `id` and `version` belong to the
/// store, `lastModified` is stamped on every commit.
pub const RESERVED_FIELDS: [&str; 3] = ["id", VERSION_FIELD, LAST_MODIFIED_FIELD];

/// Structural check of a request's operations. No I/O, no knowledge of the record.
pub fn validate(operations: &[UpdateOperation]) -> Result<(), MutationError> {
    if operations.is_empty() {
        return Err(MutationError::NoOperations);
    }
    for op in operations {
        let path = FieldPath::parse(&op.field)?;
        if RESERVED_FIELDS.contains(&path.root()) {
            return Err(MutationError::ReservedField(op.field.clone()));
        }
        if op.kind == OperationKind::Increment && !op.value.is_number() {
            return Err(MutationError::NonNumericDelta(op.field.clone()));
        }
    }
    Ok(())
}

/// First nested operation whose parent container is absent from `document`.
///
/// A missing `subProfile` makes every `subProfile.*` operation land here.
pub fn missing_parent<'a>(operations: &'a [UpdateOperation], document: &Value) -> Option<&'a str> {
    operations.iter().find_map(|op| {
        let path = FieldPath::parse(&op.field).ok()?;
        (path.is_nested() && path.resolve_parent(document).is_none()).then_some(op.field.as_str())
    })
}

/// Group `operations` by kind into one mutation document and stamp it with the
/// version bump and `lastModified = now`.
///
/// Within a kind, a later operation on the same field replaces an earlier one.
pub fn compose(operations: &[UpdateOperation], now: DateTime<Utc>) -> MutationDocument {
    let mut document = MutationDocument::new();
    for op in operations {
        document.insert(op.kind, op.field.clone(), op.value.clone());
    }
    document.insert(OperationKind::Increment, VERSION_FIELD, Value::from(1));
    document.insert(
        OperationKind::Replace,
        LAST_MODIFIED_FIELD,
        Value::String(now.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
    );
    document
}

/// One grouped mutation: `kind -> field -> value`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MutationDocument {
    groups: BTreeMap<OperationKind, BTreeMap<String, Value>>,
}

impl MutationDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `field` within `kind`, overwriting any earlier value.
    pub fn insert(&mut self, kind: OperationKind, field: impl Into<String>, value: Value) {
        self.groups.entry(kind).or_default().insert(field.into(), value);
    }

    pub fn get(&self, kind: OperationKind, field: &str) -> Option<&Value> {
        self.groups.get(&kind)?.get(field)
    }

    pub fn group(&self, kind: OperationKind) -> Option<&BTreeMap<String, Value>> {
        self.groups.get(&kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = OperationKind> + '_ {
        self.groups.keys().copied()
    }

    /// Total number of field entries across all kinds.
    pub fn len(&self) -> usize {
        self.groups.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render as an operator document, e.g. `{"$set": {...}, "$inc": {...}}`.
    pub fn to_update_document(&self) -> Value {
        let mut out = Map::new();
        for (kind, fields) in &self.groups {
            let fields: Map<String, Value> = fields
                .iter()
                .map(|(field, value)| (field.clone(), value.clone()))
                .collect();
            out.insert(kind.operator().to_string(), Value::Object(fields));
        }
        Value::Object(out)
    }

    /// Apply the whole document to a copy of `document`.
    ///
    /// All or nothing: on error the input is untouched and nothing is returned.
    /// Kinds apply in the order replace, increment, append, remove.
    pub fn apply(&self, document: &Value) -> Result<Value, MutationError> {
        self.check_conflicts()?;

        let mut next = document.clone();
        for (kind, fields) in &self.groups {
            for (field, value) in fields {
                let path = FieldPath::parse(field)?;
                let container = container_mut(&mut next, &path)?;
                apply_one(container, *kind, &path, value)?;
            }
        }
        Ok(next)
    }

    fn check_conflicts(&self) -> Result<(), MutationError> {
        let mut paths = Vec::with_capacity(self.len());
        for fields in self.groups.values() {
            for field in fields.keys() {
                paths.push(FieldPath::parse(field)?);
            }
        }
        for (i, left) in paths.iter().enumerate() {
            if let Some(right) = paths[i + 1..].iter().find(|right| left.overlaps(right)) {
                return Err(MutationError::PathConflict(right.to_string()));
            }
        }
        Ok(())
    }
}

fn container_mut<'a>(
    document: &'a mut Value,
    path: &FieldPath,
) -> Result<&'a mut Map<String, Value>, MutationError> {
    let mut current = document;
    for segment in path.parent_segments() {
        current = current
            .as_object_mut()
            .ok_or_else(|| MutationError::NotAnObject(path.to_string()))?
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    current
        .as_object_mut()
        .ok_or_else(|| MutationError::NotAnObject(path.to_string()))
}

fn apply_one(
    container: &mut Map<String, Value>,
    kind: OperationKind,
    path: &FieldPath,
    value: &Value,
) -> Result<(), MutationError> {
    let leaf = path.leaf().to_string();
    match kind {
        OperationKind::Replace => {
            container.insert(leaf, value.clone());
        }
        OperationKind::Increment => {
            let sum = match container.get(&leaf) {
                Some(current) => add_numbers(current, value, path)?,
                None => add_numbers(&Value::from(0), value, path)?,
            };
            container.insert(leaf, sum);
        }
        OperationKind::AppendToList => match container.entry(leaf) {
            Entry::Vacant(slot) => {
                slot.insert(Value::Array(vec![value.clone()]));
            }
            Entry::Occupied(mut slot) => match slot.get_mut() {
                Value::Array(items) => items.push(value.clone()),
                _ => return Err(MutationError::NotAList(path.to_string())),
            },
        },
        OperationKind::RemoveFromList => match container.get_mut(&leaf) {
            None => {}
            Some(Value::Array(items)) => items.retain(|item| item != value),
            Some(_) => return Err(MutationError::NotAList(path.to_string())),
        },
    }
    Ok(())
}

fn add_numbers(current: &Value, delta: &Value, path: &FieldPath) -> Result<Value, MutationError> {
    if !current.is_number() {
        return Err(MutationError::NotNumeric(path.to_string()));
    }
    if !delta.is_number() {
        return Err(MutationError::NonNumericDelta(path.to_string()));
    }
    if let (Some(a), Some(b)) = (as_integer(current), as_integer(delta)) {
        let sum = a + b;
        return i64::try_from(sum)
            .map(Value::from)
            .or_else(|_| u64::try_from(sum).map(Value::from))
            .map_err(|_| MutationError::Overflow(path.to_string()));
    }
    match (current.as_f64(), delta.as_f64()) {
        (Some(a), Some(b)) => Number::from_f64(a + b)
            .map(Value::Number)
            .ok_or_else(|| MutationError::Overflow(path.to_string())),
        _ => Err(MutationError::NotNumeric(path.to_string())),
    }
}

/// Any JSON integer, signed or unsigned, widened so that one addition cannot overflow.
fn as_integer(value: &Value) -> Option<i128> {
    value
        .as_i64()
        .map(i128::from)
        .or_else(|| value.as_u64().map(i128::from))
}
