//! The seam to the form engine.
//!
//! A [`FormControl`] owns field registration, validation and the canonical
//! form state. It reports every state change to its listeners as a
//! [`RawFormState`]; [`Form`](crate::Form) mirrors those reports into an
//! observable tree.

use std::error::Error;
use std::fmt;

use mxform_core::{FieldError, SnapshotMap};
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

/// A full state report from the form engine.
///
/// The five trees are always present. `None` flags were not part of this
/// report and leave the mirrored value untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawFormState {
    pub values: Value,
    pub errors: Value,
    pub dirty_fields: Value,
    pub touched_fields: Value,
    pub validating_fields: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_dirty: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_loading: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_submitted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_submit_successful: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_submitting: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_validating: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_valid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_ready: Option<bool>,
}

impl Default for RawFormState {
    fn default() -> Self {
        Self {
            values: empty_object(),
            errors: empty_object(),
            dirty_fields: empty_object(),
            touched_fields: empty_object(),
            validating_fields: empty_object(),
            is_dirty: None,
            is_loading: None,
            is_submitted: None,
            is_submit_successful: None,
            is_submitting: None,
            is_validating: None,
            is_valid: None,
            disabled: None,
            submit_count: None,
            is_ready: None,
        }
    }
}

impl RawFormState {
    /// A report carrying only `values`.
    #[must_use]
    pub fn with_values(values: Value) -> Self {
        Self {
            values,
            ..Self::default()
        }
    }

    /// The five trees keyed the way the observable mirror stores them.
    #[must_use]
    pub fn trees(&self) -> SnapshotMap {
        let mut map = SnapshotMap::new();
        map.insert("values".to_owned(), self.values.clone());
        map.insert("errors".to_owned(), self.errors.clone());
        map.insert("dirtyFields".to_owned(), self.dirty_fields.clone());
        map.insert("touchedFields".to_owned(), self.touched_fields.clone());
        map.insert("validatingFields".to_owned(), self.validating_fields.clone());
        map
    }
}

/// Options accepted by [`FormControl::set_value`]. `None` means "engine
/// default", which is `false` for all three.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SetValueOptions {
    pub should_validate: Option<bool>,
    pub should_dirty: Option<bool>,
    pub should_touch: Option<bool>,
}

impl SetValueOptions {
    #[must_use]
    pub fn validate(self) -> bool {
        self.should_validate.unwrap_or(false)
    }

    #[must_use]
    pub fn dirty(self) -> bool {
        self.should_dirty.unwrap_or(false)
    }

    #[must_use]
    pub fn touch(self) -> bool {
        self.should_touch.unwrap_or(false)
    }

    #[must_use]
    pub fn with_validate(mut self, enabled: bool) -> Self {
        self.should_validate = Some(enabled);
        self
    }

    #[must_use]
    pub fn with_dirty(mut self, enabled: bool) -> Self {
        self.should_dirty = Some(enabled);
        self
    }

    #[must_use]
    pub fn with_touch(mut self, enabled: bool) -> Self {
        self.should_touch = Some(enabled);
        self
    }
}

/// Which parts of the state survive a reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeepStateOptions {
    pub keep_errors: bool,
    pub keep_dirty: bool,
    pub keep_values: bool,
    pub keep_default_values: bool,
    pub keep_is_submitted: bool,
    pub keep_touched: bool,
    pub keep_submit_count: bool,
}

/// Identifies a listener registered with [`FormControl::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlListenerId(pub u64);

pub type ControlListener = Box<dyn Fn(&RawFormState)>;

/// Error returned by a submit handler.
pub type SubmitHandlerError = Box<dyn Error>;

/// Result of [`FormControl::handle_submit`].
pub enum SubmitOutcome {
    /// Validation passed and the handler accepted the data.
    Submitted(Value),
    /// Validation failed; carries the engine's error tree.
    Invalid(Value),
    /// Validation passed but the handler returned an error.
    HandlerFailed {
        data: Value,
        error: SubmitHandlerError,
    },
}

impl fmt::Debug for SubmitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submitted(data) => f.debug_tuple("Submitted").field(data).finish(),
            Self::Invalid(errors) => f.debug_tuple("Invalid").field(errors).finish(),
            Self::HandlerFailed { data, error } => f
                .debug_struct("HandlerFailed")
                .field("data", data)
                .field("error", &error.to_string())
                .finish(),
        }
    }
}

/// A form engine.
///
/// Methods take `&self`; engines keep their state behind interior
/// mutability and may notify listeners synchronously from any method.
pub trait FormControl {
    /// Current values.
    fn values(&self) -> Value;

    fn set_value(&self, name: &str, value: Value, options: SetValueOptions);

    /// Reset to `values`, or to the engine's defaults when `None`.
    fn reset(&self, values: Option<&Value>, options: KeepStateOptions);

    fn reset_field(&self, name: &str);

    fn set_error(&self, name: &str, error: FieldError);

    /// Clear errors for `names`, or every error when `names` is empty.
    fn clear_errors(&self, names: &[&str]);

    /// Validate `names` (every field when empty). Returns whether they passed.
    fn trigger(&self, names: &[&str]) -> bool;

    fn unregister(&self, name: &str);

    /// Run the submit cycle: validate, then hand valid data to `on_valid`.
    fn handle_submit(
        &self,
        on_valid: &mut dyn FnMut(&Value) -> Result<(), SubmitHandlerError>,
    ) -> SubmitOutcome;

    fn subscribe(&self, listener: ControlListener) -> ControlListenerId;

    fn unsubscribe(&self, id: ControlListenerId);
}
