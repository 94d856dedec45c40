//! Dotted field paths.
//!
//! Paths address nested fields the way form libraries name them:
//! `"items.0.title"` is key `items`, index `0`, key `title`. Segments that
//! are canonical decimals (`0`, `7`, `12`, never `+1` or `01`) index lists;
//! every other segment is a map key. A write may land at most
//! [`MAX_LIST_GAP`] slots past the end of a list.
//!
//! The `*_path` functions work on the observable tree; the `snapshot_*`
//! functions work on plain snapshots.

use mxform_reactive::action;
use serde_json::Value;

use crate::error::{CoreError, Result};
use crate::merge::{MergeStats, merge_slot};
use crate::tree::{Container, MAX_LIST_GAP, Node, ObservableList, ObservableMap, SlotKey};

/// Split a dotted path. Empty paths and empty segments are rejected.
pub fn split_path(path: &str) -> Result<Vec<&str>> {
    let segments: Vec<&str> = path.split('.').collect();
    if path.is_empty() || segments.iter().any(|segment| segment.is_empty()) {
        return Err(CoreError::invalid_path(path));
    }
    Ok(segments)
}

/// Parse a canonical list index. Signs and leading zeros make a map key.
#[must_use]
pub fn parse_index(segment: &str) -> Option<usize> {
    let canonical = segment.bytes().all(|byte| byte.is_ascii_digit())
        && (segment == "0" || !segment.starts_with('0'));
    if canonical { segment.parse().ok() } else { None }
}

fn list_index(path: &str, segment: &str) -> Result<usize> {
    parse_index(segment).ok_or_else(|| CoreError::NotAnIndex {
        path: path.to_owned(),
        segment: segment.to_owned(),
    })
}

fn check_gap(path: &str, index: usize, len: usize) -> Result<()> {
    if index.saturating_sub(len) > MAX_LIST_GAP {
        return Err(CoreError::IndexOutOfRange {
            path: path.to_owned(),
            index,
            len,
        });
    }
    Ok(())
}

fn next_is_index(segments: &[&str], position: usize) -> bool {
    segments
        .get(position + 1)
        .is_some_and(|next| parse_index(next).is_some())
}

/// Tracked lookup. Returns `None` for malformed paths and for paths that run
/// through a leaf or a missing slot.
#[must_use]
pub fn get_path(root: &ObservableMap, path: &str) -> Option<Node> {
    let segments = split_path(path).ok()?;
    let mut node = Node::Map(root.clone());
    for segment in segments {
        node = match &node {
            Node::Map(map) => map.get(segment)?,
            Node::List(list) => list.get(parse_index(segment)?)?,
            Node::Leaf(_) => return None,
        };
    }
    Some(node)
}

fn slot_key(container: &Container, path: &str, segment: &str) -> Result<SlotKey> {
    match container {
        Container::Map(_) => Ok(SlotKey::Field(segment.to_owned())),
        Container::List(list) => {
            let index = list_index(path, segment)?;
            check_gap(path, index, list.len_untracked())?;
            Ok(SlotKey::Index(index))
        }
    }
}

/// Walk `segments` without writing and report the error [`set_path`] would
/// hit, so a rejected path leaves the tree untouched.
fn check_set_path(root: &ObservableMap, path: &str, segments: &[&str]) -> Result<()> {
    // `None` is a container the write would create.
    let mut current = Some(Container::Map(root.clone()));
    let mut fresh_list = false;
    for (position, segment) in segments.iter().enumerate() {
        let child = match &current {
            Some(Container::Map(map)) => map.get_untracked(segment),
            Some(Container::List(list)) => {
                let index = list_index(path, segment)?;
                check_gap(path, index, list.len_untracked())?;
                list.get_untracked(index)
            }
            None if fresh_list => {
                check_gap(path, list_index(path, segment)?, 0)?;
                None
            }
            None => None,
        };
        fresh_list = next_is_index(segments, position);
        current = match child {
            Some(Node::Map(map)) => Some(Container::Map(map)),
            Some(Node::List(list)) => Some(Container::List(list)),
            _ => None,
        };
    }
    Ok(())
}

/// Merge `value` into the slot at `path`, creating intermediate containers.
///
/// A missing or scalar intermediate becomes a list when the next segment is
/// an index and a map otherwise. Existing containers along the path, and at
/// the destination when the kind matches, keep their identity.
pub fn set_path(root: &ObservableMap, path: &str, value: &Value) -> Result<MergeStats> {
    let segments = split_path(path)?;
    let Some((last, parents)) = segments.split_last() else {
        return Err(CoreError::invalid_path(path));
    };
    check_set_path(root, path, &segments)?;

    action(|| {
        let mut container = Container::Map(root.clone());
        for (position, segment) in parents.iter().enumerate() {
            let key = slot_key(&container, path, segment)?;
            let next = match container.get_untracked(&key) {
                Some(Node::Map(map)) => Container::Map(map),
                Some(Node::List(list)) => Container::List(list),
                _ => {
                    let fresh = if next_is_index(&segments, position) {
                        Container::List(ObservableList::new())
                    } else {
                        Container::Map(ObservableMap::new())
                    };
                    container.assign(&key, fresh.clone().into_node());
                    fresh
                }
            };
            container = next;
        }
        let key = slot_key(&container, path, last)?;
        Ok(merge_slot(&container, key, value))
    })
}

// ---------------------------------------------------------------------------
// Plain snapshots
// ---------------------------------------------------------------------------

/// Lookup in a plain snapshot.
#[must_use]
pub fn snapshot_get<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let segments = split_path(path).ok()?;
    segments
        .into_iter()
        .try_fold(root, |value, segment| match value {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => items.get(parse_index(segment)?),
            _ => None,
        })
}

fn check_snapshot_set(root: &Value, path: &str, segments: &[&str]) -> Result<()> {
    let mut current = Some(root);
    let mut fresh_list = false;
    for (position, segment) in segments.iter().enumerate() {
        let child = match current {
            Some(Value::Object(map)) => map.get(*segment),
            Some(Value::Array(items)) => {
                let index = list_index(path, segment)?;
                check_gap(path, index, items.len())?;
                items.get(index)
            }
            Some(_) => return Err(CoreError::invalid_path(path)),
            None if fresh_list => {
                check_gap(path, list_index(path, segment)?, 0)?;
                None
            }
            None => None,
        };
        fresh_list = next_is_index(segments, position);
        current = child.filter(|value| value.is_object() || value.is_array());
    }
    Ok(())
}

/// Write into a plain snapshot, creating intermediates like [`set_path`].
///
/// On error `root` is left as it was.
pub fn snapshot_set(root: &mut Value, path: &str, value: Value) -> Result<()> {
    let segments = split_path(path)?;
    check_snapshot_set(root, path, &segments)?;
    let mut current = root;
    for (position, segment) in segments.iter().enumerate() {
        let is_last = position + 1 == segments.len();
        let fresh_list = next_is_index(&segments, position);
        let slot = match current {
            Value::Object(map) => map.entry((*segment).to_owned()).or_insert(Value::Null),
            Value::Array(items) => {
                let index = list_index(path, segment)?;
                check_gap(path, index, items.len())?;
                if items.len() <= index {
                    items.resize(index + 1, Value::Null);
                }
                &mut items[index]
            }
            _ => return Err(CoreError::invalid_path(path)),
        };
        if is_last {
            *slot = value;
            return Ok(());
        }
        if !slot.is_object() && !slot.is_array() {
            *slot = if fresh_list {
                Value::Array(Vec::new())
            } else {
                Value::Object(serde_json::Map::new())
            };
        }
        current = slot;
    }
    Ok(())
}

/// Remove the value at `path`, then drop parents left empty by the removal.
pub fn snapshot_remove(root: &mut Value, path: &str) -> Option<Value> {
    let segments = split_path(path).ok()?;
    remove_in(root, &segments)
}

fn remove_in(value: &mut Value, segments: &[&str]) -> Option<Value> {
    let (first, rest) = segments.split_first()?;
    if rest.is_empty() {
        return match value {
            Value::Object(map) => map.shift_remove(*first),
            Value::Array(items) => {
                let index = parse_index(first)?;
                let slot = items.get_mut(index)?;
                Some(std::mem::take(slot))
            }
            _ => None,
        };
    }
    let child = match value {
        Value::Object(map) => map.get_mut(*first)?,
        Value::Array(items) => items.get_mut(parse_index(first)?)?,
        _ => return None,
    };
    let removed = remove_in(child, rest)?;
    if is_empty_container(child) {
        match value {
            Value::Object(map) => {
                map.shift_remove(*first);
            }
            Value::Array(items) => {
                if let Some(slot) = parse_index(first).and_then(|index| items.get_mut(index)) {
                    *slot = Value::Null;
                }
            }
            _ => {}
        }
    }
    Some(removed)
}

fn is_empty_container(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.iter().all(Value::is_null),
        _ => false,
    }
}
