//! The persistent root that form state is merged into.
//!
//! [`DeepObservableStruct`] owns one [`ObservableMap`] for its whole life.
//! Every update goes through [`merge`] or [`merge_slot`]; nothing swaps the
//! root out, so a reader that captured the root or any container under it
//! keeps seeing live data.

use std::fmt;

use serde_json::Value;

use crate::error::Result;
use crate::merge::{MergeStats, merge, merge_slot};
use crate::snapshot::{SnapshotMap, into_map};
use crate::tree::{Container, Node, ObservableMap, SlotKey};

/// A persistent observable mirror of a series of snapshots.
///
/// The root map is created once and never replaced. Each [`set`](Self::set)
/// merges the next snapshot into it, so consumers holding a child container
/// keep observing the same object for as long as its kind stays the same.
#[derive(Clone, Default)]
pub struct DeepObservableStruct {
    data: ObservableMap,
}

impl DeepObservableStruct {
    #[must_use]
    pub fn new(data: &SnapshotMap) -> Self {
        Self {
            data: ObservableMap::from_snapshot(data),
        }
    }

    /// Build from an arbitrary snapshot, which must be an object.
    pub fn from_snapshot(value: Value) -> Result<Self> {
        Ok(Self::new(&into_map(value)?))
    }

    /// The root observable map.
    #[must_use]
    pub fn data(&self) -> &ObservableMap {
        &self.data
    }

    /// Tracked read of one top-level key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Node> {
        self.data.get(key)
    }

    /// Merge the next snapshot in a single action.
    pub fn set(&self, snapshot: &SnapshotMap) -> MergeStats {
        merge(&self.data, snapshot)
    }

    /// Merge one top-level key, leaving the others alone.
    pub fn set_key(&self, key: &str, value: &Value) -> MergeStats {
        merge_slot(
            &Container::Map(self.data.clone()),
            SlotKey::Field(key.to_owned()),
            value,
        )
    }

    /// Untracked plain copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> SnapshotMap {
        mxform_reactive::untracked(|| self.data.to_snapshot_map())
    }
}

impl fmt::Debug for DeepObservableStruct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeepObservableStruct")
            .field("data", &self.data)
            .finish()
    }
}
