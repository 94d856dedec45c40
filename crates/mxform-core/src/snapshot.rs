//! Plain-data snapshots.
//!
//! A snapshot is an immutable `serde_json::Value` tree. Key order is
//! insertion order (`preserve_order`). `Null` plays the role of an explicit
//! "present but empty" value: a key holding `Null` is present, a missing key
//! is absent.

use serde_json::{Map, Value};

use crate::error::{CoreError, Result};

pub type Snapshot = Value;
pub type SnapshotMap = Map<String, Value>;

/// Container-vs-scalar classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Map,
    List,
    Scalar,
}

/// A snapshot value split by [`Shape`], borrowing its content.
///
/// Tree construction and the merge walk both branch on this, so they agree
/// on what counts as a container.
#[derive(Debug, Clone, Copy)]
pub enum Classified<'a> {
    Map(&'a SnapshotMap),
    List(&'a [Value]),
    Scalar(&'a Value),
}

impl Classified<'_> {
    #[must_use]
    pub fn shape(self) -> Shape {
        match self {
            Self::Map(_) => Shape::Map,
            Self::List(_) => Shape::List,
            Self::Scalar(_) => Shape::Scalar,
        }
    }
}

#[must_use]
pub fn classify_ref(value: &Value) -> Classified<'_> {
    match value {
        Value::Object(map) => Classified::Map(map),
        Value::Array(items) => Classified::List(items),
        scalar => Classified::Scalar(scalar),
    }
}

#[must_use]
pub fn classify(value: &Value) -> Shape {
    classify_ref(value).shape()
}

#[must_use]
pub(crate) fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Unwrap an object snapshot.
pub fn into_map(value: Value) -> Result<SnapshotMap> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(CoreError::NotAnObject {
            kind: kind_name(&other),
        }),
    }
}
