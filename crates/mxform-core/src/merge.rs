//! Incremental snapshot merge.
//!
//! [`merge`] folds a fresh snapshot into an existing observable tree with a
//! breadth-first walk over an explicit work queue, so arbitrarily deep
//! snapshots never grow the call stack.
//!
//! For each `(key, target container, source container)` item:
//!
//! - key absent from the source: the slot is deleted from the target;
//! - both sides maps: target keys missing from the source are deleted, then
//!   every source key is queued against the existing child map;
//! - both sides lists: the target list is truncated to the source length,
//!   then every index is queued against the existing child list;
//! - anything else: the slot is replaced with a fresh subtree unless it
//!   already holds an equal leaf.
//!
//! Existing containers are never replaced when the source holds a container
//! of the same kind, so their identity survives every merge. Top-level
//! source keys the tree does not have yet are assigned after the walk.
//!
//! The whole merge runs as one action: observers see a single notification
//! cycle no matter how many slots changed.

use std::collections::VecDeque;

use mxform_reactive::action;
use serde_json::Value;
use tracing::{debug, trace};

use crate::path::parse_index;
use crate::snapshot::{Classified, SnapshotMap, classify_ref};
use crate::tree::{Container, Node, ObservableMap, SlotKey};

/// Counters describing one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Work items processed.
    pub visited: usize,
    /// Slots assigned a new value.
    pub writes: usize,
    /// Keys deleted plus list items truncated.
    pub deletions: usize,
}

impl MergeStats {
    /// Whether the merge left the tree untouched.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.writes == 0 && self.deletions == 0
    }
}

#[derive(Clone, Copy)]
enum Source<'a> {
    Map(&'a SnapshotMap),
    List(&'a [Value]),
    /// A single value standing in for whatever key is looked up.
    Single(&'a Value),
}

impl<'a> Source<'a> {
    fn lookup(self, key: &SlotKey) -> Option<&'a Value> {
        match (self, key) {
            (Source::Map(map), SlotKey::Field(name)) => map.get(name),
            (Source::Map(map), SlotKey::Index(index)) => map.get(&index.to_string()),
            (Source::List(items), SlotKey::Index(index)) => items.get(*index),
            (Source::List(items), SlotKey::Field(name)) => {
                parse_index(name).and_then(|index| items.get(index))
            }
            (Source::Single(value), _) => Some(value),
        }
    }
}

struct WorkItem<'a> {
    key: SlotKey,
    target: Container,
    source: Source<'a>,
}

/// Merge `snapshot` into `tree`, preserving the identity of every container
/// whose kind did not change.
pub fn merge(tree: &ObservableMap, snapshot: &SnapshotMap) -> MergeStats {
    action(|| {
        let mut stats = MergeStats::default();
        let root = Container::Map(tree.clone());
        let mut queue: VecDeque<WorkItem<'_>> = tree
            .keys_untracked()
            .into_iter()
            .map(|key| WorkItem {
                key: SlotKey::Field(key),
                target: root.clone(),
                source: Source::Map(snapshot),
            })
            .collect();
        drain(&mut queue, &mut stats);

        for (key, value) in snapshot {
            if !tree.contains_key_untracked(key) {
                tree.insert(key.clone(), Node::from_snapshot(value));
                stats.writes += 1;
            }
        }

        debug!(
            message = "merge.complete",
            visited = stats.visited,
            writes = stats.writes,
            deletions = stats.deletions
        );
        stats
    })
}

/// Merge `value` into the single slot `parent[key]`.
///
/// The slot is created when missing; an existing container of the same kind
/// keeps its identity.
pub fn merge_slot(parent: &Container, key: SlotKey, value: &Value) -> MergeStats {
    action(|| {
        let mut stats = MergeStats::default();
        let mut queue = VecDeque::from([WorkItem {
            key,
            target: parent.clone(),
            source: Source::Single(value),
        }]);
        drain(&mut queue, &mut stats);
        trace!(
            message = "merge.slot",
            visited = stats.visited,
            writes = stats.writes,
            deletions = stats.deletions
        );
        stats
    })
}

fn drain(queue: &mut VecDeque<WorkItem<'_>>, stats: &mut MergeStats) {
    while let Some(item) = queue.pop_front() {
        stats.visited += 1;

        let Some(next) = item.source.lookup(&item.key) else {
            if item.target.remove(&item.key).is_some() {
                stats.deletions += 1;
            }
            continue;
        };

        match (classify_ref(next), item.target.get_untracked(&item.key)) {
            (Classified::Map(next_map), Some(Node::Map(current))) => {
                for key in current.keys_untracked() {
                    if !next_map.contains_key(&key) && current.remove(&key).is_some() {
                        stats.deletions += 1;
                    }
                }
                let target = Container::Map(current);
                queue.extend(next_map.keys().map(|key| WorkItem {
                    key: SlotKey::Field(key.clone()),
                    target: target.clone(),
                    source: Source::Map(next_map),
                }));
            }
            (Classified::List(next_items), Some(Node::List(current))) => {
                stats.deletions += current.truncate(next_items.len());
                let target = Container::List(current);
                queue.extend((0..next_items.len()).map(|index| WorkItem {
                    key: SlotKey::Index(index),
                    target: target.clone(),
                    source: Source::List(next_items),
                }));
            }
            (classified, current) => {
                if !current.as_ref().is_some_and(|node| node.matches_leaf(next)) {
                    trace!(
                        message = "merge.assign",
                        key = %item.key,
                        from = ?current.as_ref().map(Node::shape),
                        to = ?classified.shape()
                    );
                    item.target.assign(&item.key, Node::from_snapshot(next));
                    stats.writes += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ObservableList;
    use serde_json::json;

    fn object(value: Value) -> SnapshotMap {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn identical_snapshot_is_noop() {
        let snapshot = object(json!({"a": 1, "b": {"c": [1, 2, {"d": "x"}]}}));
        let tree = ObservableMap::from_snapshot(&snapshot);
        let stats = merge(&tree, &snapshot);
        assert!(stats.is_noop());
        assert!(stats.visited > 0);
    }

    #[test]
    fn unchanged_branch_keeps_identity() {
        let tree = ObservableMap::from_snapshot(&object(json!({
            "left": {"x": 1},
            "right": {"y": 2}
        })));
        let left = tree.get_untracked("left").unwrap();
        let right = tree.get_untracked("right").unwrap();

        let stats = merge(&tree, &object(json!({"left": {"x": 1}, "right": {"y": 3}})));
        assert_eq!(stats.writes, 1);
        assert_eq!(tree.get_untracked("left").unwrap(), left);
        assert_eq!(tree.get_untracked("right").unwrap(), right);
        assert_eq!(tree.to_snapshot(), json!({"left": {"x": 1}, "right": {"y": 3}}));
    }

    #[test]
    fn missing_keys_are_deleted_at_every_depth() {
        let tree = ObservableMap::from_snapshot(&object(json!({
            "keep": {"a": 1, "gone": 2},
            "drop": true
        })));
        let stats = merge(&tree, &object(json!({"keep": {"a": 1}})));
        assert_eq!(stats.deletions, 2);
        assert_eq!(tree.to_snapshot(), json!({"keep": {"a": 1}}));
    }

    #[test]
    fn null_is_present() {
        let tree = ObservableMap::from_snapshot(&object(json!({"a": 1})));
        merge(&tree, &object(json!({"a": null})));
        assert!(tree.contains_key_untracked("a"));
        assert_eq!(tree.to_snapshot(), json!({"a": null}));
    }

    #[test]
    fn new_top_level_keys_are_added() {
        let tree = ObservableMap::new();
        let stats = merge(&tree, &object(json!({"name": "x", "flag": false})));
        assert_eq!(stats.writes, 2);
        assert_eq!(tree.to_snapshot(), json!({"name": "x", "flag": false}));
    }

    #[test]
    fn list_shrinks_and_keeps_identity() {
        let tree = ObservableMap::from_snapshot(&object(json!({"items": [{"v": 1}, {"v": 2}, {"v": 3}]})));
        let items = tree.get_untracked("items").unwrap();
        let first = items.as_list().unwrap().get_untracked(0).unwrap();

        let stats = merge(&tree, &object(json!({"items": [{"v": 1}]})));
        assert_eq!(stats.deletions, 2);
        let after = tree.get_untracked("items").unwrap();
        assert_eq!(after, items);
        assert_eq!(after.as_list().unwrap().get_untracked(0).unwrap(), first);
    }

    #[test]
    fn list_grows_by_assignment() {
        let tree = ObservableMap::from_snapshot(&object(json!({"items": [1]})));
        merge(&tree, &object(json!({"items": [1, 2, 3]})));
        assert_eq!(tree.to_snapshot(), json!({"items": [1, 2, 3]}));
    }

    #[test]
    fn kind_change_replaces_slot() {
        let tree = ObservableMap::from_snapshot(&object(json!({"a": {"b": 1}})));
        let before = tree.get_untracked("a").unwrap();
        merge(&tree, &object(json!({"a": [1]})));
        let after = tree.get_untracked("a").unwrap();
        assert_ne!(before, after);
        assert!(after.as_list().is_some());
    }

    #[test]
    fn map_with_index_keys_replaces_list() {
        let tree = ObservableMap::from_snapshot(&object(json!({"a": [1], "b": "x"})));
        let stats = merge(&tree, &object(json!({"a": {"0": 1}, "b": ["x"]})));
        assert_eq!(stats.writes, 2);
        assert!(tree.get_untracked("a").unwrap().as_map().is_some());
        assert!(tree.get_untracked("b").unwrap().as_list().is_some());
        assert_eq!(tree.to_snapshot(), json!({"a": {"0": 1}, "b": ["x"]}));
    }

    #[test]
    fn merge_slot_creates_and_preserves() {
        let parent = Container::Map(ObservableMap::new());
        let stats = merge_slot(&parent, SlotKey::from("a"), &json!({"b": [1]}));
        assert_eq!(stats.writes, 1);
        let created = parent.get_untracked(&SlotKey::from("a")).unwrap();

        let stats = merge_slot(&parent, SlotKey::from("a"), &json!({"b": [1, 2]}));
        assert_eq!(stats.writes, 1);
        assert_eq!(parent.get_untracked(&SlotKey::from("a")).unwrap(), created);
        assert!(created.deep_eq(&json!({"b": [1, 2]})));
    }

    #[test]
    fn merge_slot_into_list() {
        let list = ObservableList::from_snapshot(&[json!({"x": 1})]);
        let parent = Container::List(list.clone());
        let item = list.get_untracked(0).unwrap();
        merge_slot(&parent, SlotKey::Index(0), &json!({"x": 2}));
        assert_eq!(list.get_untracked(0).unwrap(), item);
        assert_eq!(list.to_snapshot(), json!([{"x": 2}]));
    }

    #[test]
    fn deep_snapshot_walks_every_level() {
        let mut value = json!(0);
        for _ in 0..200 {
            value = json!({ "n": value });
        }
        let snapshot = object(json!({ "root": value }));
        let tree = ObservableMap::from_snapshot(&snapshot);
        let stats = merge(&tree, &snapshot);
        assert!(stats.is_noop());
        assert_eq!(stats.visited, 201);
    }
}
