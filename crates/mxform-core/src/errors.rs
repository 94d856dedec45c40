//! Field errors and their flattening into `(path, error)` pairs.
//!
//! A form's error tree mirrors its values tree: nested maps and lists whose
//! leaves are field-error records. A record is recognised by its `type` key.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::snapshot::SnapshotMap;
use crate::tree::Node;

/// One validation failure attached to a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Every failed rule when the form collects all criteria.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub types: Option<SnapshotMap>,
}

impl FieldError {
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: None,
            types: None,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_types(mut self, types: SnapshotMap) -> Self {
        self.types = Some(types);
        self
    }

    /// Plain snapshot form, as stored in an error tree.
    #[must_use]
    pub fn to_snapshot(&self) -> Value {
        let mut map = SnapshotMap::new();
        map.insert("type".to_owned(), Value::String(self.kind.clone()));
        if let Some(message) = &self.message {
            map.insert("message".to_owned(), Value::String(message.clone()));
        }
        if let Some(types) = &self.types {
            map.insert("types".to_owned(), Value::Object(types.clone()));
        }
        Value::Object(map)
    }
}

/// A field error together with the dotted path of its field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorWithPath {
    pub path: String,
    pub error: FieldError,
}

/// Whether a snapshot value is a field-error record.
#[must_use]
pub fn is_field_error(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|map| map.contains_key("type"))
}

fn join(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_owned()
    } else {
        format!("{parent}.{key}")
    }
}

fn decode(path: &str, value: Value) -> Option<FieldError> {
    match serde_json::from_value(value) {
        Ok(error) => Some(error),
        Err(err) => {
            debug!(path, error = %err, "skipping malformed field error");
            None
        }
    }
}

/// Flatten an observable error tree, depth first in key order.
///
/// Every slot visited is read through the tracking API, so a computed built
/// on top re-runs whenever any error is added, removed or changed. The root
/// itself is never treated as a record. Null slots and empty containers
/// contribute nothing.
#[must_use]
pub fn collect_errors(errors: &Node) -> Vec<ErrorWithPath> {
    let mut found = Vec::new();
    let mut stack = vec![(String::new(), errors.clone())];
    while let Some((path, node)) = stack.pop() {
        let children: Vec<(String, Node)> = match &node {
            Node::Leaf(_) => continue,
            Node::Map(map) => {
                if !path.is_empty() && map.contains_key("type") {
                    if let Some(error) = decode(&path, map.to_snapshot()) {
                        found.push(ErrorWithPath { path, error });
                    }
                    continue;
                }
                map.entries()
                    .into_iter()
                    .map(|(key, child)| (join(&path, &key), child))
                    .collect()
            }
            Node::List(list) => list
                .items()
                .into_iter()
                .enumerate()
                .map(|(index, child)| (join(&path, &index.to_string()), child))
                .collect(),
        };
        stack.extend(children.into_iter().rev());
    }
    found
}

/// [`collect_errors`] over a plain snapshot.
#[must_use]
pub fn collect_snapshot_errors(errors: &Value) -> Vec<ErrorWithPath> {
    let mut found = Vec::new();
    let mut stack = vec![(String::new(), errors)];
    while let Some((path, value)) = stack.pop() {
        match value {
            Value::Object(map) => {
                if !path.is_empty() && map.contains_key("type") {
                    if let Some(error) = decode(&path, value.clone()) {
                        found.push(ErrorWithPath { path, error });
                    }
                    continue;
                }
                stack.extend(map.iter().rev().map(|(key, child)| (join(&path, key), child)));
            }
            Value::Array(items) => {
                stack.extend(
                    items
                        .iter()
                        .enumerate()
                        .rev()
                        .map(|(index, child)| (join(&path, &index.to_string()), child)),
                );
            }
            _ => {}
        }
    }
    found
}
