//! An in-memory form engine.
//!
//! [`MemoryFormControl`] implements [`FormControl`] with plain snapshots and
//! a small rule set. It behaves like a typical form library closely enough
//! to drive [`Form`](mxform_form::Form) end to end: values, per-field rules,
//! dirty and touched tracking, the submit cycle and a full state report
//! after every operation.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use mxform_core::{FieldError, snapshot_get, snapshot_remove, snapshot_set};
use mxform_form::{
    ControlListener, ControlListenerId, FormControl, KeepStateOptions, RawFormState,
    SetValueOptions, SubmitHandlerError, SubmitOutcome,
};
use serde_json::{Map, Value};
use tracing::{debug, trace};

pub type CustomCheck = Rc<dyn Fn(&Value) -> Result<(), String>>;

/// A validation rule attached to one field.
#[derive(Clone)]
pub enum Rule {
    Required,
    MinLength(usize),
    MaxLength(usize),
    Min(f64),
    Max(f64),
    Custom(CustomCheck),
}

impl Rule {
    /// Build a [`Rule::Custom`].
    pub fn custom(check: impl Fn(&Value) -> Result<(), String> + 'static) -> Self {
        Self::Custom(Rc::new(check))
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::MinLength(_) => "minLength",
            Self::MaxLength(_) => "maxLength",
            Self::Min(_) => "min",
            Self::Max(_) => "max",
            Self::Custom(_) => "validate",
        }
    }

    fn check(&self, value: Option<&Value>) -> Result<(), String> {
        let value = value.unwrap_or(&Value::Null);
        match self {
            Self::Required => {
                let empty = match value {
                    Value::Null => true,
                    Value::String(text) => text.is_empty(),
                    Value::Array(items) => items.is_empty(),
                    _ => false,
                };
                if empty {
                    Err("This field is required".to_owned())
                } else {
                    Ok(())
                }
            }
            Self::MinLength(min) => match value.as_str() {
                Some(text) if !text.is_empty() && text.chars().count() < *min => {
                    Err(format!("Must be at least {min} characters"))
                }
                _ => Ok(()),
            },
            Self::MaxLength(max) => match value.as_str() {
                Some(text) if text.chars().count() > *max => {
                    Err(format!("Must be at most {max} characters"))
                }
                _ => Ok(()),
            },
            Self::Min(min) => match value.as_f64() {
                Some(number) if number < *min => Err(format!("Must be at least {min}")),
                _ => Ok(()),
            },
            Self::Max(max) => match value.as_f64() {
                Some(number) if number > *max => Err(format!("Must be at most {max}")),
                _ => Ok(()),
            },
            Self::Custom(check) => check(value),
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => f.write_str("Required"),
            Self::MinLength(n) => write!(f, "MinLength({n})"),
            Self::MaxLength(n) => write!(f, "MaxLength({n})"),
            Self::Min(n) => write!(f, "Min({n})"),
            Self::Max(n) => write!(f, "Max({n})"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

fn is_empty_tree(value: &Value) -> bool {
    value.as_object().is_none_or(Map::is_empty)
}

#[derive(Debug)]
struct EngineState {
    defaults: Value,
    values: Value,
    errors: Value,
    dirty: Value,
    touched: Value,
    fields: Vec<(String, Vec<Rule>)>,
    is_submitted: bool,
    is_submit_successful: bool,
    is_submitting: bool,
    submit_count: u32,
}

/// Write `value` at `name`. A name the tree rejects is logged and skipped.
fn write(tree: &mut Value, name: &str, value: Value) -> bool {
    match snapshot_set(tree, name, value) {
        Ok(()) => true,
        Err(err) => {
            debug!(message = "engine.write.skipped", field = name, error = %err);
            false
        }
    }
}

impl EngineState {
    fn validate(&mut self, name: &str) -> bool {
        let Some(rules) = self
            .fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, rules)| rules.clone())
        else {
            return true;
        };
        let value = snapshot_get(&self.values, name);
        let failure = rules
            .iter()
            .find_map(|rule| rule.check(value).err().map(|message| (rule.kind(), message)));
        match failure {
            Some((kind, message)) => {
                let error = FieldError::new(kind).with_message(message);
                write(&mut self.errors, name, error.to_snapshot());
                false
            }
            None => {
                snapshot_remove(&mut self.errors, name);
                true
            }
        }
    }

    fn validate_all(&mut self) -> bool {
        let names: Vec<String> = self.fields.iter().map(|(name, _)| name.clone()).collect();
        names
            .iter()
            .fold(true, |valid, name| self.validate(name) && valid)
    }

    fn mark(tree: &mut Value, name: &str, on: bool) {
        if on {
            write(tree, name, Value::Bool(true));
        } else {
            snapshot_remove(tree, name);
        }
    }

    fn report(&self) -> RawFormState {
        RawFormState {
            values: self.values.clone(),
            errors: self.errors.clone(),
            dirty_fields: self.dirty.clone(),
            touched_fields: self.touched.clone(),
            validating_fields: empty_object(),
            is_dirty: Some(self.values != self.defaults),
            is_loading: Some(false),
            is_submitted: Some(self.is_submitted),
            is_submit_successful: Some(self.is_submit_successful),
            is_submitting: Some(self.is_submitting),
            is_validating: Some(false),
            is_valid: Some(is_empty_tree(&self.errors)),
            disabled: Some(false),
            submit_count: Some(self.submit_count),
            is_ready: Some(true),
        }
    }
}

/// Reference [`FormControl`] backed by snapshots.
pub struct MemoryFormControl {
    state: RefCell<EngineState>,
    listeners: RefCell<Vec<(ControlListenerId, Rc<ControlListener>)>>,
    next_listener: Cell<u64>,
    reports: Cell<u64>,
}

impl fmt::Debug for MemoryFormControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryFormControl")
            .field("state", &*self.state.borrow())
            .field("listeners", &self.listeners.borrow().len())
            .field("reports", &self.reports.get())
            .finish()
    }
}

impl MemoryFormControl {
    #[must_use]
    pub fn new(defaults: Value) -> Self {
        let defaults = if defaults.is_object() {
            defaults
        } else {
            empty_object()
        };
        Self {
            state: RefCell::new(EngineState {
                values: defaults.clone(),
                defaults,
                errors: empty_object(),
                dirty: empty_object(),
                touched: empty_object(),
                fields: Vec::new(),
                is_submitted: false,
                is_submit_successful: false,
                is_submitting: false,
                submit_count: 0,
            }),
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(0),
            reports: Cell::new(0),
        }
    }

    /// Attach validation rules to `name`. Replaces earlier rules.
    pub fn register(&self, name: &str, rules: Vec<Rule>) -> mxform_core::Result<()> {
        mxform_core::split_path(name)?;
        let mut state = self.state.borrow_mut();
        match state.fields.iter_mut().find(|(field, _)| field == name) {
            Some((_, existing)) => *existing = rules,
            None => state.fields.push((name.to_owned(), rules)),
        }
        Ok(())
    }

    /// Simulate the user leaving a field.
    pub fn blur(&self, name: &str) {
        {
            let mut state = self.state.borrow_mut();
            EngineState::mark(&mut state.touched, name, true);
        }
        self.emit();
    }

    /// Number of state reports sent so far.
    #[must_use]
    pub fn report_count(&self) -> u64 {
        self.reports.get()
    }

    #[must_use]
    pub fn errors(&self) -> Value {
        self.state.borrow().errors.clone()
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    fn emit(&self) {
        let report = self.state.borrow().report();
        self.reports.set(self.reports.get() + 1);
        let listeners: Vec<Rc<ControlListener>> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        trace!(listeners = listeners.len(), "engine.emit");
        for listener in listeners {
            listener(&report);
        }
    }
}

impl FormControl for MemoryFormControl {
    fn values(&self) -> Value {
        self.state.borrow().values.clone()
    }

    fn set_value(&self, name: &str, value: Value, options: SetValueOptions) {
        {
            let mut state = self.state.borrow_mut();
            let is_dirty = snapshot_get(&state.defaults, name) != Some(&value);
            if !write(&mut state.values, name, value) {
                return;
            }
            if options.dirty() {
                EngineState::mark(&mut state.dirty, name, is_dirty);
            }
            if options.touch() {
                EngineState::mark(&mut state.touched, name, true);
            }
            if options.validate() {
                state.validate(name);
            }
        }
        self.emit();
    }

    fn reset(&self, values: Option<&Value>, options: KeepStateOptions) {
        {
            let mut state = self.state.borrow_mut();
            match values {
                Some(values) => {
                    if !options.keep_default_values {
                        state.defaults = values.clone();
                    }
                    if !options.keep_values {
                        state.values = values.clone();
                    }
                }
                None => {
                    if !options.keep_values {
                        state.values = state.defaults.clone();
                    }
                }
            }
            if !options.keep_errors {
                state.errors = empty_object();
            }
            if !options.keep_dirty {
                state.dirty = empty_object();
            }
            if !options.keep_touched {
                state.touched = empty_object();
            }
            if !options.keep_is_submitted {
                state.is_submitted = false;
                state.is_submit_successful = false;
            }
            if !options.keep_submit_count {
                state.submit_count = 0;
            }
        }
        self.emit();
    }

    fn reset_field(&self, name: &str) {
        {
            let mut state = self.state.borrow_mut();
            let default = snapshot_get(&state.defaults, name)
                .cloned()
                .unwrap_or(Value::Null);
            write(&mut state.values, name, default);
            snapshot_remove(&mut state.errors, name);
            snapshot_remove(&mut state.dirty, name);
            snapshot_remove(&mut state.touched, name);
        }
        self.emit();
    }

    fn set_error(&self, name: &str, error: FieldError) {
        {
            let mut state = self.state.borrow_mut();
            write(&mut state.errors, name, error.to_snapshot());
        }
        self.emit();
    }

    fn clear_errors(&self, names: &[&str]) {
        {
            let mut state = self.state.borrow_mut();
            if names.is_empty() {
                state.errors = empty_object();
            } else {
                for name in names {
                    snapshot_remove(&mut state.errors, name);
                }
            }
        }
        self.emit();
    }

    fn trigger(&self, names: &[&str]) -> bool {
        let valid = {
            let mut state = self.state.borrow_mut();
            if names.is_empty() {
                state.validate_all()
            } else {
                names
                    .iter()
                    .fold(true, |valid, name| state.validate(name) && valid)
            }
        };
        self.emit();
        valid
    }

    fn unregister(&self, name: &str) {
        {
            let mut state = self.state.borrow_mut();
            state.fields.retain(|(field, _)| field != name);
            snapshot_remove(&mut state.values, name);
            snapshot_remove(&mut state.errors, name);
            snapshot_remove(&mut state.dirty, name);
            snapshot_remove(&mut state.touched, name);
        }
        self.emit();
    }

    fn handle_submit(
        &self,
        on_valid: &mut dyn FnMut(&Value) -> Result<(), SubmitHandlerError>,
    ) -> SubmitOutcome {
        self.state.borrow_mut().is_submitting = true;
        self.emit();

        let (valid, data) = {
            let mut state = self.state.borrow_mut();
            (state.validate_all(), state.values.clone())
        };
        let outcome = if valid {
            match on_valid(&data) {
                Ok(()) => SubmitOutcome::Submitted(data),
                Err(error) => SubmitOutcome::HandlerFailed { data, error },
            }
        } else {
            SubmitOutcome::Invalid(self.errors())
        };

        {
            let mut state = self.state.borrow_mut();
            state.is_submitting = false;
            state.is_submitted = true;
            state.is_submit_successful = matches!(outcome, SubmitOutcome::Submitted(_));
            state.submit_count += 1;
        }
        self.emit();
        outcome
    }

    fn subscribe(&self, listener: ControlListener) -> ControlListenerId {
        let id = ControlListenerId(self.next_listener.get());
        self.next_listener.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    fn unsubscribe(&self, id: ControlListenerId) {
        self.listeners
            .borrow_mut()
            .retain(|(current, _)| *current != id);
    }
}
