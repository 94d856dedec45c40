#![forbid(unsafe_code)]

//! Core: the observable form-state tree and the incremental merge engine.
//!
//! A form library produces a plain-data [`Snapshot`] on every state change.
//! [`DeepObservableStruct::set`] folds each snapshot into a persistent
//! [`ObservableMap`] so that containers whose content did not change keep
//! their identity, and only the slots that actually differ notify their
//! dependents.

pub mod deep_struct;
pub mod error;
pub mod errors;
pub mod merge;
pub mod path;
pub mod snapshot;
pub mod tree;

pub use deep_struct::DeepObservableStruct;
pub use error::{CoreError, Result};
pub use errors::{ErrorWithPath, FieldError, collect_errors, collect_snapshot_errors, is_field_error};
pub use merge::{MergeStats, merge, merge_slot};
pub use path::{get_path, parse_index, set_path, snapshot_get, snapshot_remove, snapshot_set, split_path};
pub use snapshot::{Classified, Shape, Snapshot, SnapshotMap, classify, classify_ref, into_map};
pub use tree::{Container, MAX_LIST_GAP, Node, ObservableList, ObservableMap, SlotKey};
