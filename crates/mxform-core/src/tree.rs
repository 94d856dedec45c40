//! The observable tree.
//!
//! Every slot of every container owns its own [`Atom`]; each container also
//! owns a structure atom that changes when keys (maps) or the length (lists)
//! change. A reaction that reads `a.b` therefore depends on the slot `a` of
//! the root map and the slot `b` of the map stored there, and nothing else.
//!
//! Container identity is reference identity: [`Node`] equality compares
//! containers with [`Rc::ptr_eq`] and leaves by value. The merge engine relies
//! on this to keep unchanged subtrees untouched.
//!
//! Mutations release their interior borrows before reporting changes, so
//! callbacks that run during the flush may freely read the tree again.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use mxform_reactive::{Atom, AtomId, action, untracked};
use serde_json::Value;

use crate::path::parse_index;
use crate::snapshot::{Classified, Shape, SnapshotMap, classify, classify_ref};

/// How many nulls a write past the end of a list may pad in.
pub const MAX_LIST_GAP: usize = 1024;

struct Slot {
    atom: Atom,
    node: Node,
}

impl Slot {
    fn new(node: Node) -> Self {
        Self {
            atom: Atom::new(),
            node,
        }
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A value stored in an observable slot.
#[derive(Clone)]
pub enum Node {
    Leaf(Value),
    Map(ObservableMap),
    List(ObservableList),
}

impl Node {
    /// Build a fresh observable subtree from a snapshot.
    #[must_use]
    pub fn from_snapshot(value: &Value) -> Self {
        match classify_ref(value) {
            Classified::Map(map) => Self::Map(ObservableMap::from_snapshot(map)),
            Classified::List(items) => Self::List(ObservableList::from_snapshot(items)),
            Classified::Scalar(scalar) => Self::Leaf(scalar.clone()),
        }
    }

    #[must_use]
    pub fn null() -> Self {
        Self::Leaf(Value::Null)
    }

    #[must_use]
    pub fn shape(&self) -> Shape {
        match self {
            Self::Leaf(value) => classify(value),
            Self::Map(_) => Shape::Map,
            Self::List(_) => Shape::List,
        }
    }

    /// Deep plain copy. Reads every slot it visits.
    #[must_use]
    pub fn to_snapshot(&self) -> Value {
        match self {
            Self::Leaf(value) => value.clone(),
            Self::Map(map) => map.to_snapshot(),
            Self::List(list) => list.to_snapshot(),
        }
    }

    /// Identity for containers, value equality for leaves.
    #[must_use]
    pub fn same(&self, other: &Node) -> bool {
        match (self, other) {
            (Self::Leaf(a), Self::Leaf(b)) => a == b,
            (Self::Map(a), Self::Map(b)) => a.ptr_eq(b),
            (Self::List(a), Self::List(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Whether this is a leaf holding exactly `value`.
    #[must_use]
    pub fn matches_leaf(&self, value: &Value) -> bool {
        matches!(self, Self::Leaf(current) if current == value)
    }

    /// Structural comparison against a snapshot. Does not track.
    #[must_use]
    pub fn deep_eq(&self, value: &Value) -> bool {
        untracked(|| self.to_snapshot() == *value)
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&ObservableMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&ObservableList> {
        match self {
            Self::List(list) => Some(list),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_leaf(&self) -> Option<&Value> {
        match self {
            Self::Leaf(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Leaf(Value::Null))
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.same(other)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf(value) => f.debug_tuple("Leaf").field(value).finish(),
            Self::Map(map) => fmt::Debug::fmt(map, f),
            Self::List(list) => fmt::Debug::fmt(list, f),
        }
    }
}

impl From<&Value> for Node {
    fn from(value: &Value) -> Self {
        Self::from_snapshot(value)
    }
}

impl From<ObservableMap> for Node {
    fn from(map: ObservableMap) -> Self {
        Self::Map(map)
    }
}

impl From<ObservableList> for Node {
    fn from(list: ObservableList) -> Self {
        Self::List(list)
    }
}

// ---------------------------------------------------------------------------
// ObservableMap
// ---------------------------------------------------------------------------

struct MapInner {
    keys: Atom,
    entries: RefCell<IndexMap<String, Slot>>,
}

/// An insertion-ordered observable object.
///
/// Cloning creates another handle to the same map.
#[derive(Clone)]
pub struct ObservableMap {
    inner: Rc<MapInner>,
}

impl Default for ObservableMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ObservableMap {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(MapInner {
                keys: Atom::new(),
                entries: RefCell::new(IndexMap::new()),
            }),
        }
    }

    #[must_use]
    pub fn from_snapshot(map: &SnapshotMap) -> Self {
        let entries = map
            .iter()
            .map(|(key, value)| (key.clone(), Slot::new(Node::from_snapshot(value))))
            .collect();
        Self {
            inner: Rc::new(MapInner {
                keys: Atom::new(),
                entries: RefCell::new(entries),
            }),
        }
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Tracked read of one key. A missing key tracks the key set, so the
    /// reader re-runs once the key appears.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Node> {
        let entries = self.inner.entries.borrow();
        match entries.get(key) {
            Some(slot) => {
                slot.atom.report_read();
                Some(slot.node.clone())
            }
            None => {
                self.inner.keys.report_read();
                None
            }
        }
    }

    #[must_use]
    pub fn get_untracked(&self, key: &str) -> Option<Node> {
        self.inner
            .entries
            .borrow()
            .get(key)
            .map(|slot| slot.node.clone())
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.keys.report_read();
        self.contains_key_untracked(key)
    }

    #[must_use]
    pub fn contains_key_untracked(&self, key: &str) -> bool {
        self.inner.entries.borrow().contains_key(key)
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner.keys.report_read();
        self.keys_untracked()
    }

    #[must_use]
    pub fn keys_untracked(&self) -> Vec<String> {
        self.inner.entries.borrow().keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.keys.report_read();
        self.inner.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tracked read of every entry, in key order.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, Node)> {
        self.inner.keys.report_read();
        self.inner
            .entries
            .borrow()
            .iter()
            .map(|(key, slot)| {
                slot.atom.report_read();
                (key.clone(), slot.node.clone())
            })
            .collect()
    }

    /// Store `node` under `key`.
    ///
    /// Returns `false` without notifying anyone when the slot already holds
    /// the same node. Adding a key also changes the key set.
    pub fn insert(&self, key: impl Into<String>, node: Node) -> bool {
        let key = key.into();
        let (atom, added) = {
            let mut entries = self.inner.entries.borrow_mut();
            match entries.get_mut(&key) {
                Some(slot) => {
                    if slot.node.same(&node) {
                        return false;
                    }
                    slot.node = node;
                    (Some(slot.atom), false)
                }
                None => {
                    entries.insert(key, Slot::new(node));
                    (None, true)
                }
            }
        };
        action(|| {
            if let Some(atom) = atom {
                atom.report_changed();
            }
            if added {
                self.inner.keys.report_changed();
            }
        });
        true
    }

    /// Store a fresh subtree built from `value`.
    pub fn insert_snapshot(&self, key: impl Into<String>, value: &Value) -> bool {
        self.insert(key, Node::from_snapshot(value))
    }

    /// Delete `key`, keeping the order of the remaining keys.
    pub fn remove(&self, key: &str) -> Option<Node> {
        let slot = self.inner.entries.borrow_mut().shift_remove(key)?;
        action(|| {
            slot.atom.report_changed();
            self.inner.keys.report_changed();
        });
        Some(slot.node)
    }

    pub fn clear(&self) {
        let removed = std::mem::take(&mut *self.inner.entries.borrow_mut());
        if removed.is_empty() {
            return;
        }
        action(|| {
            for slot in removed.values() {
                slot.atom.report_changed();
            }
            self.inner.keys.report_changed();
        });
    }

    /// Deep plain copy. Reads every slot it visits.
    #[must_use]
    pub fn to_snapshot(&self) -> Value {
        Value::Object(self.to_snapshot_map())
    }

    #[must_use]
    pub fn to_snapshot_map(&self) -> SnapshotMap {
        self.entries()
            .into_iter()
            .map(|(key, node)| (key, node.to_snapshot()))
            .collect()
    }

    /// Structural comparison against a snapshot. Does not track.
    #[must_use]
    pub fn deep_eq(&self, other: &SnapshotMap) -> bool {
        untracked(|| self.to_snapshot_map() == *other)
    }

    /// Atom of the slot under `key`, if present.
    #[must_use]
    pub fn slot_atom(&self, key: &str) -> Option<AtomId> {
        self.inner
            .entries
            .borrow()
            .get(key)
            .map(|slot| slot.atom.id())
    }

    /// Atom that changes whenever a key is added or removed.
    #[must_use]
    pub fn keys_atom(&self) -> AtomId {
        self.inner.keys.id()
    }
}

impl PartialEq for ObservableMap {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ObservableMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = untracked(|| self.to_snapshot());
        f.debug_tuple("ObservableMap").field(&snapshot).finish()
    }
}

// ---------------------------------------------------------------------------
// ObservableList
// ---------------------------------------------------------------------------

struct ListInner {
    len: Atom,
    items: RefCell<Vec<Slot>>,
}

/// An observable array. Index slots own their atoms.
#[derive(Clone)]
pub struct ObservableList {
    inner: Rc<ListInner>,
}

impl Default for ObservableList {
    fn default() -> Self {
        Self::new()
    }
}

impl ObservableList {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ListInner {
                len: Atom::new(),
                items: RefCell::new(Vec::new()),
            }),
        }
    }

    #[must_use]
    pub fn from_snapshot(items: &[Value]) -> Self {
        let items = items
            .iter()
            .map(|value| Slot::new(Node::from_snapshot(value)))
            .collect();
        Self {
            inner: Rc::new(ListInner {
                len: Atom::new(),
                items: RefCell::new(items),
            }),
        }
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Tracked read of one index. Out-of-range reads track the length.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Node> {
        let items = self.inner.items.borrow();
        match items.get(index) {
            Some(slot) => {
                slot.atom.report_read();
                Some(slot.node.clone())
            }
            None => {
                self.inner.len.report_read();
                None
            }
        }
    }

    #[must_use]
    pub fn get_untracked(&self, index: usize) -> Option<Node> {
        self.inner
            .items
            .borrow()
            .get(index)
            .map(|slot| slot.node.clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len.report_read();
        self.len_untracked()
    }

    #[must_use]
    pub fn len_untracked(&self) -> usize {
        self.inner.items.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tracked read of every item.
    #[must_use]
    pub fn items(&self) -> Vec<Node> {
        self.inner.len.report_read();
        self.inner
            .items
            .borrow()
            .iter()
            .map(|slot| {
                slot.atom.report_read();
                slot.node.clone()
            })
            .collect()
    }

    /// Store `node` at `index`. Writing past the end pads with nulls.
    ///
    /// Returns `false` without writing when `index` lies more than
    /// [`MAX_LIST_GAP`] past the end.
    pub fn set(&self, index: usize, node: Node) -> bool {
        let replaced = {
            let mut items = self.inner.items.borrow_mut();
            if let Some(slot) = items.get_mut(index) {
                if slot.node.same(&node) {
                    return false;
                }
                slot.node = node;
                Some(slot.atom)
            } else if index - items.len() > MAX_LIST_GAP {
                return false;
            } else {
                while items.len() < index {
                    items.push(Slot::new(Node::null()));
                }
                items.push(Slot::new(node));
                None
            }
        };
        match replaced {
            Some(atom) => atom.report_changed(),
            None => self.inner.len.report_changed(),
        }
        true
    }

    pub fn push(&self, node: Node) {
        self.inner.items.borrow_mut().push(Slot::new(node));
        self.inner.len.report_changed();
    }

    /// Shrink to `len` items. Returns how many were dropped.
    pub fn truncate(&self, len: usize) -> usize {
        let removed: Vec<Slot> = {
            let mut items = self.inner.items.borrow_mut();
            if items.len() <= len {
                return 0;
            }
            items.drain(len..).collect()
        };
        action(|| {
            for slot in &removed {
                slot.atom.report_changed();
            }
            self.inner.len.report_changed();
        });
        removed.len()
    }

    /// Remove the item at `index`, shifting later items down.
    pub fn remove(&self, index: usize) -> Option<Node> {
        let (slot, shifted) = {
            let mut items = self.inner.items.borrow_mut();
            if index >= items.len() {
                return None;
            }
            let slot = items.remove(index);
            let shifted: Vec<Atom> = items[index..].iter().map(|slot| slot.atom).collect();
            (slot, shifted)
        };
        // Later slots now sit at new indices; their readers must re-run.
        action(|| {
            slot.atom.report_changed();
            for atom in shifted {
                atom.report_changed();
            }
            self.inner.len.report_changed();
        });
        Some(slot.node)
    }

    #[must_use]
    pub fn to_snapshot(&self) -> Value {
        Value::Array(self.items().iter().map(Node::to_snapshot).collect())
    }

    #[must_use]
    pub fn deep_eq(&self, other: &[Value]) -> bool {
        untracked(|| match self.to_snapshot() {
            Value::Array(items) => items == other,
            _ => false,
        })
    }

    #[must_use]
    pub fn slot_atom(&self, index: usize) -> Option<AtomId> {
        self.inner
            .items
            .borrow()
            .get(index)
            .map(|slot| slot.atom.id())
    }

    #[must_use]
    pub fn len_atom(&self) -> AtomId {
        self.inner.len.id()
    }
}

impl PartialEq for ObservableList {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ObservableList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = untracked(|| self.to_snapshot());
        f.debug_tuple("ObservableList").field(&snapshot).finish()
    }
}

// ---------------------------------------------------------------------------
// Container / SlotKey
// ---------------------------------------------------------------------------

/// Key of a slot inside a container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SlotKey {
    Field(String),
    Index(usize),
}

impl SlotKey {
    fn as_index(&self) -> Option<usize> {
        match self {
            Self::Index(index) => Some(*index),
            Self::Field(name) => parse_index(name),
        }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => f.write_str(name),
            Self::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for SlotKey {
    fn from(name: &str) -> Self {
        Self::Field(name.to_owned())
    }
}

impl From<String> for SlotKey {
    fn from(name: String) -> Self {
        Self::Field(name)
    }
}

impl From<usize> for SlotKey {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// A map or list addressed through [`SlotKey`]s.
///
/// Maps accept index keys by their decimal rendering; lists accept field keys
/// that parse as an index and ignore the rest.
#[derive(Debug, Clone, PartialEq)]
pub enum Container {
    Map(ObservableMap),
    List(ObservableList),
}

impl Container {
    #[must_use]
    pub fn get(&self, key: &SlotKey) -> Option<Node> {
        match self {
            Self::Map(map) => map.get(&key.to_string()),
            Self::List(list) => list.get(key.as_index()?),
        }
    }

    #[must_use]
    pub fn get_untracked(&self, key: &SlotKey) -> Option<Node> {
        match self {
            Self::Map(map) => map.get_untracked(&key.to_string()),
            Self::List(list) => list.get_untracked(key.as_index()?),
        }
    }

    /// Store `node` in the slot. Returns whether anything changed.
    pub fn assign(&self, key: &SlotKey, node: Node) -> bool {
        match self {
            Self::Map(map) => map.insert(key.to_string(), node),
            Self::List(list) => match key.as_index() {
                Some(index) => list.set(index, node),
                None => false,
            },
        }
    }

    pub fn remove(&self, key: &SlotKey) -> Option<Node> {
        match self {
            Self::Map(map) => map.remove(&key.to_string()),
            Self::List(list) => list.remove(key.as_index()?),
        }
    }

    #[must_use]
    pub fn into_node(self) -> Node {
        match self {
            Self::Map(map) => Node::Map(map),
            Self::List(list) => Node::List(list),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mxform_reactive::Reaction;
    use serde_json::json;
    use std::cell::Cell;

    fn map_of(value: Value) -> ObservableMap {
        match Node::from_snapshot(&value) {
            Node::Map(map) => map,
            other => panic!("expected map, got {other:?}"),
        }
    }

    #[test]
    fn from_snapshot_round_trips_structure() {
        let value = json!({"a": 1, "b": {"c": [1, {"d": null}]}, "e": "x"});
        let map = map_of(value.clone());
        assert_eq!(map.to_snapshot(), value);
        assert_eq!(map.keys_untracked(), vec!["a", "b", "e"]);
    }

    #[test]
    fn insert_same_leaf_is_noop() {
        let map = map_of(json!({"a": 1}));
        assert!(!map.insert("a", Node::Leaf(json!(1))));
        assert!(map.insert("a", Node::Leaf(json!(2))));
    }

    #[test]
    fn insert_equal_but_distinct_container_replaces() {
        let map = map_of(json!({"a": {"x": 1}}));
        let before = map.get_untracked("a").unwrap();
        assert!(map.insert_snapshot("a", &json!({"x": 1})));
        let after = map.get_untracked("a").unwrap();
        assert_ne!(before, after);
        assert!(after.deep_eq(&json!({"x": 1})));
    }

    #[test]
    fn remove_keeps_order() {
        let map = map_of(json!({"a": 1, "b": 2, "c": 3}));
        assert_eq!(map.remove("b"), Some(Node::Leaf(json!(2))));
        assert_eq!(map.keys_untracked(), vec!["a", "c"]);
        assert!(map.remove("missing").is_none());
    }

    #[test]
    fn slot_reads_are_fine_grained() {
        let map = map_of(json!({"a": 1, "b": 2}));
        let runs = Rc::new(Cell::new(0u32));
        let runs_clone = Rc::clone(&runs);
        let watched = map.clone();
        let _r = Reaction::autorun(move || {
            let _ = watched.get("a");
            runs_clone.set(runs_clone.get() + 1);
        });
        assert_eq!(runs.get(), 1);

        map.insert("b", Node::Leaf(json!(3)));
        assert_eq!(runs.get(), 1);

        map.insert("a", Node::Leaf(json!(5)));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn missing_key_read_tracks_key_set() {
        let map = ObservableMap::new();
        let seen = Rc::new(Cell::new(false));
        let seen_clone = Rc::clone(&seen);
        let watched = map.clone();
        let _r = Reaction::autorun(move || {
            seen_clone.set(watched.get("late").is_some());
        });
        assert!(!seen.get());
        map.insert("late", Node::Leaf(json!(true)));
        assert!(seen.get());
    }

    #[test]
    fn list_set_pads_with_null() {
        let list = ObservableList::new();
        list.set(2, Node::Leaf(json!("z")));
        assert_eq!(list.to_snapshot(), json!([null, null, "z"]));
    }

    #[test]
    fn list_set_refuses_distant_index() {
        let list = ObservableList::from_snapshot(&[json!(1)]);
        let lens = Rc::new(Cell::new(0u32));
        let lens_clone = Rc::clone(&lens);
        let watched = list.clone();
        let _r = Reaction::autorun(move || {
            let _ = watched.len();
            lens_clone.set(lens_clone.get() + 1);
        });

        assert!(!list.set(usize::MAX, Node::null()));
        assert!(!list.set(1 + MAX_LIST_GAP + 1, Node::null()));
        assert_eq!(list.len_untracked(), 1);
        assert_eq!(lens.get(), 1);

        assert!(list.set(1 + MAX_LIST_GAP, Node::null()));
        assert_eq!(list.len_untracked(), MAX_LIST_GAP + 2);
    }

    #[test]
    fn from_snapshot_shape_matches_classify() {
        for value in [json!({"a": 1}), json!([1]), json!(null), json!("x"), json!(2.5)] {
            assert_eq!(Node::from_snapshot(&value).shape(), classify(&value));
        }
    }

    #[test]
    fn list_truncate_notifies_length() {
        let list = ObservableList::from_snapshot(&[json!(1), json!(2), json!(3)]);
        let lens = Rc::new(Cell::new(0usize));
        let lens_clone = Rc::clone(&lens);
        let watched = list.clone();
        let _r = Reaction::autorun(move || lens_clone.set(watched.len()));
        assert_eq!(lens.get(), 3);
        assert_eq!(list.truncate(1), 2);
        assert_eq!(lens.get(), 1);
        assert_eq!(list.truncate(5), 0);
    }

    #[test]
    fn list_remove_notifies_shifted_readers() {
        let list = ObservableList::from_snapshot(&[json!("a"), json!("b"), json!("c")]);
        let second = Rc::new(RefCell::new(None));
        let second_clone = Rc::clone(&second);
        let watched = list.clone();
        let _r = Reaction::autorun(move || {
            *second_clone.borrow_mut() = watched.get(1).and_then(|n| n.as_leaf().cloned());
        });
        assert_eq!(*second.borrow(), Some(json!("b")));
        list.remove(0);
        assert_eq!(*second.borrow(), Some(json!("c")));
    }

    #[test]
    fn container_keys_coerce() {
        let list = Container::List(ObservableList::from_snapshot(&[json!(1)]));
        assert_eq!(list.get_untracked(&SlotKey::from("0")), Some(Node::Leaf(json!(1))));
        assert!(!list.assign(&SlotKey::from("name"), Node::null()));
        assert!(list.get_untracked(&SlotKey::from("00")).is_none());
        assert!(!list.assign(&SlotKey::from("+0"), Node::null()));

        let map = Container::Map(ObservableMap::new());
        assert!(map.assign(&SlotKey::Index(3), Node::null()));
        assert!(map.get_untracked(&SlotKey::from("3")).is_some());
    }

    #[test]
    fn debug_is_untracked() {
        let map = map_of(json!({"a": 1}));
        let (text, deps) = mxform_reactive::track(|| format!("{map:?}"));
        assert!(text.contains("ObservableMap"));
        assert!(deps.is_empty());
    }
}
