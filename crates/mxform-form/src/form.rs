#![forbid(unsafe_code)]

//! The reactive form.
//!
//! # Design
//!
//! [`Form`] subscribes to a [`FormControl`] and mirrors every state report
//! into a [`DeepObservableStruct`] holding five trees (`values`, `errors`,
//! `dirtyFields`, `touchedFields`, `validatingFields`) plus one
//! [`Observable`] per scalar flag. Reactions that read a single field re-run
//! only when that field changes.
//!
//! With lazy updates enabled (the default) reports are coalesced: each one
//! replaces the pending report and restarts its deadline. The host drives
//! delivery with [`Form::poll`] or forces it with [`Form::flush`].
//!
//! # Invariants
//!
//! 1. Applying a report is one action; observers never see a half-applied
//!    report.
//! 2. Writes made through [`Form::set_value`] are visible in the tree before
//!    the engine is told about them.
//! 3. After [`Form::destroy`] no report is applied and every delegating call
//!    returns [`FormError::Destroyed`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use mxform_core::{
    DeepObservableStruct, ErrorWithPath, FieldError, Node, collect_errors,
    collect_snapshot_errors, set_path, snapshot_get,
};
use mxform_reactive::{Computed, Observable, action, untracked};
use serde_json::Value;
use tracing::{debug, warn};
use web_time::{Duration, Instant};

use crate::abort::AbortController;
use crate::control::{
    ControlListenerId, FormControl, KeepStateOptions, RawFormState, SetValueOptions,
    SubmitOutcome,
};
use crate::error::FormError;
use crate::params::{FormParams, ResetHandler, SubmitFailedHandler, SubmitHandler};

/// Scalar form flags, one observable each.
#[derive(Debug, Default)]
struct FormFlags {
    is_dirty: Observable<bool>,
    is_loading: Observable<bool>,
    is_submitted: Observable<bool>,
    is_submit_successful: Observable<bool>,
    is_submitting: Observable<bool>,
    is_validating: Observable<bool>,
    is_valid: Observable<bool>,
    disabled: Observable<bool>,
    submit_count: Observable<u32>,
    is_ready: Observable<bool>,
}

fn write_flag<T: Clone + PartialEq + 'static>(target: &Observable<T>, value: Option<T>) {
    if let Some(value) = value {
        target.set(value);
    }
}

impl FormFlags {
    fn apply(&self, state: &RawFormState) {
        write_flag(&self.is_dirty, state.is_dirty);
        write_flag(&self.is_loading, state.is_loading);
        write_flag(&self.is_submitted, state.is_submitted);
        write_flag(&self.is_submit_successful, state.is_submit_successful);
        write_flag(&self.is_submitting, state.is_submitting);
        write_flag(&self.is_validating, state.is_validating);
        write_flag(&self.is_valid, state.is_valid);
        write_flag(&self.disabled, state.disabled);
        write_flag(&self.submit_count, state.submit_count);
        write_flag(&self.is_ready, state.is_ready);
    }
}

/// Longest lazy delay a form honors. Larger timers are clamped so the
/// deadline stays representable as an `Instant`.
const MAX_LAZY_DELAY: Duration = Duration::from_secs(60 * 60 * 24 * 365);

struct PendingUpdate {
    state: RawFormState,
    due: Instant,
}

struct FormInner<C> {
    control: RefCell<Option<Rc<C>>>,
    listener: Cell<Option<ControlListenerId>>,
    mirror: DeepObservableStruct,
    flags: FormFlags,
    default_values: Observable<Value>,
    errors_with_path: Computed<Vec<ErrorWithPath>>,
    lazy_updates: bool,
    lazy_delay: Duration,
    pending: RefCell<Option<PendingUpdate>>,
    destroyed: Cell<bool>,
    abort: AbortController,
    on_submit: Option<SubmitHandler>,
    on_submit_failed: Option<SubmitFailedHandler>,
    on_reset: Option<ResetHandler>,
}

impl<C: FormControl> FormInner<C> {
    fn receive(&self, state: &RawFormState) {
        if self.destroyed.get() {
            return;
        }
        if !self.lazy_updates {
            self.apply(state);
            return;
        }
        let due = Instant::now() + self.lazy_delay;
        let replaced = self
            .pending
            .replace(Some(PendingUpdate {
                state: state.clone(),
                due,
            }))
            .is_some();
        debug!(
            message = "form.update.scheduled",
            delay_ms = u64::try_from(self.lazy_delay.as_millis()).unwrap_or(u64::MAX),
            replaced
        );
    }

    fn apply(&self, state: &RawFormState) {
        action(|| {
            self.flags.apply(state);
            let stats = self.mirror.set(&state.trees());
            debug!(
                message = "form.update.applied",
                writes = stats.writes,
                deletions = stats.deletions
            );
        });
    }

    fn take_pending(&self, now: Option<Instant>) -> Option<RawFormState> {
        let mut pending = self.pending.borrow_mut();
        match (&*pending, now) {
            (None, _) => None,
            (Some(update), Some(now)) if update.due > now => None,
            _ => pending.take().map(|update| update.state),
        }
    }

    fn teardown(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        self.pending.borrow_mut().take();
        let control = self.control.borrow_mut().take();
        if let (Some(control), Some(id)) = (control, self.listener.take()) {
            control.unsubscribe(id);
        }
        debug!(message = "form.destroyed");
    }
}

/// A form whose state lives in an observable tree.
///
/// Cloning creates another handle to the same form.
pub struct Form<C> {
    inner: Rc<FormInner<C>>,
}

impl<C> Clone for Form<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<C> fmt::Debug for Form<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Form")
            .field("state", &self.inner.mirror)
            .field("lazy_updates", &self.inner.lazy_updates)
            .field("pending", &self.inner.pending.borrow().is_some())
            .field("destroyed", &self.inner.destroyed.get())
            .finish()
    }
}

impl<C: FormControl + 'static> Form<C> {
    /// Wrap `control`. The tree starts from the engine's current values with
    /// empty error, dirty, touched and validating maps.
    pub fn new(params: FormParams, control: C) -> Self {
        let FormParams {
            config,
            on_submit,
            on_submit_failed,
            on_reset,
            abort_signal,
        } = params;

        let mirror = DeepObservableStruct::new(&RawFormState::with_values(control.values()).trees());
        let errors_source = mirror.clone();
        let errors_with_path = Computed::new(move || {
            errors_source
                .get("errors")
                .map(|errors| collect_errors(&errors))
                .unwrap_or_default()
        });
        let control = Rc::new(control);

        let inner = Rc::new(FormInner {
            control: RefCell::new(Some(Rc::clone(&control))),
            listener: Cell::new(None),
            mirror,
            flags: FormFlags::default(),
            default_values: Observable::new(config.default_values.clone()),
            errors_with_path,
            lazy_updates: config.lazy_updates,
            lazy_delay: config.lazy_delay().min(MAX_LAZY_DELAY),
            pending: RefCell::new(None),
            destroyed: Cell::new(false),
            abort: AbortController::linked(abort_signal.as_ref()),
            on_submit,
            on_submit_failed,
            on_reset,
        });

        let weak = Rc::downgrade(&inner);
        let id = control.subscribe(Box::new(move |state: &RawFormState| {
            if let Some(inner) = weak.upgrade() {
                inner.receive(state);
            }
        }));
        inner.listener.set(Some(id));

        let weak = Rc::downgrade(&inner);
        inner.abort.signal().on_abort(move || {
            if let Some(inner) = weak.upgrade() {
                inner.teardown();
            }
        });

        Self { inner }
    }

    /// The engine, unless the form has been destroyed.
    pub fn control(&self) -> Result<Rc<C>, FormError> {
        self.inner.control.borrow().clone().ok_or_else(|| {
            warn!(message = "form.call_after_destroy");
            FormError::Destroyed
        })
    }

    // ── Observable state ─────────────────────────────────────────────

    fn part(&self, key: &str) -> Node {
        self.inner.mirror.get(key).unwrap_or_else(Node::null)
    }

    /// The whole mirrored state.
    #[must_use]
    pub fn state(&self) -> &DeepObservableStruct {
        &self.inner.mirror
    }

    #[must_use]
    pub fn values(&self) -> Node {
        self.part("values")
    }

    #[must_use]
    pub fn errors(&self) -> Node {
        self.part("errors")
    }

    #[must_use]
    pub fn dirty_fields(&self) -> Node {
        self.part("dirtyFields")
    }

    #[must_use]
    pub fn touched_fields(&self) -> Node {
        self.part("touchedFields")
    }

    #[must_use]
    pub fn validating_fields(&self) -> Node {
        self.part("validatingFields")
    }

    /// Untracked plain copy of the current values.
    #[must_use]
    pub fn values_snapshot(&self) -> Value {
        untracked(|| self.values().to_snapshot())
    }

    /// Every field error with its dotted path, depth first.
    #[must_use]
    pub fn errors_with_path(&self) -> Vec<ErrorWithPath> {
        self.inner.errors_with_path.get()
    }

    #[must_use]
    pub fn default_values(&self) -> Value {
        self.inner.default_values.get()
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.inner.flags.is_dirty.get()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.flags.is_loading.get()
    }

    #[must_use]
    pub fn is_submitted(&self) -> bool {
        self.inner.flags.is_submitted.get()
    }

    #[must_use]
    pub fn is_submit_successful(&self) -> bool {
        self.inner.flags.is_submit_successful.get()
    }

    #[must_use]
    pub fn is_submitting(&self) -> bool {
        self.inner.flags.is_submitting.get()
    }

    #[must_use]
    pub fn is_validating(&self) -> bool {
        self.inner.flags.is_validating.get()
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.inner.flags.is_valid.get()
    }

    #[must_use]
    pub fn disabled(&self) -> bool {
        self.inner.flags.disabled.get()
    }

    #[must_use]
    pub fn submit_count(&self) -> u32 {
        self.inner.flags.submit_count.get()
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner.flags.is_ready.get()
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    // ── Update delivery ──────────────────────────────────────────────

    #[must_use]
    pub fn has_pending_update(&self) -> bool {
        self.inner.pending.borrow().is_some()
    }

    /// When the pending update becomes due.
    #[must_use]
    pub fn next_update_due(&self) -> Option<Instant> {
        self.inner.pending.borrow().as_ref().map(|update| update.due)
    }

    /// Apply the pending update if it is due at `now`.
    pub fn poll(&self, now: Instant) -> bool {
        match self.inner.take_pending(Some(now)) {
            Some(state) => {
                self.inner.apply(&state);
                true
            }
            None => false,
        }
    }

    /// Apply the pending update now, due or not.
    pub fn flush(&self) -> bool {
        match self.inner.take_pending(None) {
            Some(state) => {
                self.inner.apply(&state);
                true
            }
            None => false,
        }
    }

    // ── Field operations ─────────────────────────────────────────────

    /// Write `value` at `name` in the tree, then hand it to the engine.
    pub fn set_value(
        &self,
        name: &str,
        value: Value,
        options: SetValueOptions,
    ) -> Result<(), FormError> {
        let control = self.control()?;
        set_path(self.inner.mirror.data(), &format!("values.{name}"), &value)?;
        control.set_value(name, value, options);
        Ok(())
    }

    /// [`set_value`](Self::set_value) as an input would call it: validates
    /// by default once the form has been submitted.
    pub fn change_field(
        &self,
        name: &str,
        value: Value,
        options: SetValueOptions,
    ) -> Result<(), FormError> {
        let options = SetValueOptions {
            should_validate: options
                .should_validate
                .or_else(|| Some(self.inner.flags.is_submitted.get_untracked())),
            ..options
        };
        self.set_value(name, value, options)
    }

    /// Restore the default value at `name`, then reset the engine's field.
    pub fn reset_field(&self, name: &str) -> Result<(), FormError> {
        let control = self.control()?;
        let default = untracked(|| {
            self.inner
                .default_values
                .with(|defaults| snapshot_get(defaults, name).cloned())
        })
        .unwrap_or(Value::Null);
        set_path(self.inner.mirror.data(), &format!("values.{name}"), &default)?;
        control.reset_field(name);
        Ok(())
    }

    /// Replace the values with `values`, or the defaults when `None`.
    ///
    /// New values also become the defaults unless `keep_default_values`.
    pub fn reset_form(
        &self,
        values: Option<Value>,
        options: KeepStateOptions,
    ) -> Result<(), FormError> {
        let control = self.control()?;
        let next = match &values {
            Some(values) => values.clone(),
            None => self.inner.default_values.get_untracked(),
        };
        action(|| {
            if values.is_some() && !options.keep_default_values {
                self.inner.default_values.set(next.clone());
            }
            self.inner.mirror.set_key("values", &next);
        });
        control.reset(values.as_ref(), options);
        debug!(message = "form.reset", explicit_values = values.is_some());
        Ok(())
    }

    /// Reset to the defaults and run the reset callback.
    pub fn reset(&self) -> Result<(), FormError> {
        self.reset_form(None, KeepStateOptions::default())?;
        if let Some(on_reset) = &self.inner.on_reset {
            on_reset();
        }
        Ok(())
    }

    pub fn set_error(&self, name: &str, error: FieldError) -> Result<(), FormError> {
        self.control()?.set_error(name, error);
        Ok(())
    }

    pub fn clear_errors(&self, names: &[&str]) -> Result<(), FormError> {
        self.control()?.clear_errors(names);
        Ok(())
    }

    pub fn trigger(&self, names: &[&str]) -> Result<bool, FormError> {
        Ok(self.control()?.trigger(names))
    }

    pub fn unregister(&self, name: &str) -> Result<(), FormError> {
        self.control()?.unregister(name);
        Ok(())
    }

    // ── Submit ───────────────────────────────────────────────────────

    fn notify_submit_failed(&self, errors: &Value) {
        if let Some(on_submit_failed) = &self.inner.on_submit_failed {
            on_submit_failed(errors);
        }
    }

    /// Run the engine's submit cycle.
    ///
    /// Valid data goes to the submit callback and is returned. A failing
    /// callback is recorded as the form-level error `root.submit`; both
    /// failure kinds run the submit-failed callback.
    pub fn submit(&self) -> Result<Value, FormError> {
        let control = self.control()?;
        let on_submit = self.inner.on_submit.clone();
        let outcome = control.handle_submit(&mut |data: &Value| match &on_submit {
            Some(handler) => handler(data),
            None => Ok(()),
        });

        match outcome {
            SubmitOutcome::Submitted(data) => Ok(data),
            SubmitOutcome::Invalid(errors) => {
                self.notify_submit_failed(&errors);
                let errors = collect_snapshot_errors(&errors);
                debug!(
                    message = "form.submit.failed",
                    reason = "invalid",
                    errors = errors.len()
                );
                Err(FormError::Invalid { errors })
            }
            SubmitOutcome::HandlerFailed { error, .. } => {
                let reason = error.to_string();
                let field_error = FieldError::new("submit").with_message(reason.clone());
                set_path(
                    self.inner.mirror.data(),
                    "errors.root.submit",
                    &field_error.to_snapshot(),
                )?;
                control.set_error("root.submit", field_error);
                let errors = untracked(|| self.errors().to_snapshot());
                self.notify_submit_failed(&errors);
                debug!(
                    message = "form.submit.failed",
                    reason = "handler",
                    error = %reason
                );
                Err(FormError::SubmitHandler { message: reason })
            }
        }
    }

    /// Detach from the engine. Pending updates are dropped.
    pub fn destroy(&self) {
        self.inner.abort.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FormConfig;
    use crate::control::{ControlListener, SubmitHandlerError};
    use mxform_reactive::Reaction;
    use serde_json::json;

    /// Echoes every write back as a full state report.
    #[derive(Default)]
    struct EchoControl {
        values: RefCell<Value>,
        listeners: RefCell<Vec<(ControlListenerId, Rc<ControlListener>)>>,
        next_id: Cell<u64>,
        calls: RefCell<Vec<String>>,
    }

    impl EchoControl {
        fn new(values: Value) -> Self {
            Self {
                values: RefCell::new(values),
                ..Self::default()
            }
        }

        fn emit(&self, state: RawFormState) {
            let listeners: Vec<_> = self
                .listeners
                .borrow()
                .iter()
                .map(|(_, listener)| Rc::clone(listener))
                .collect();
            for listener in listeners {
                listener(&state);
            }
        }

        fn emit_values(&self) {
            self.emit(RawFormState::with_values(self.values.borrow().clone()));
        }
    }

    impl FormControl for EchoControl {
        fn values(&self) -> Value {
            self.values.borrow().clone()
        }

        fn set_value(&self, name: &str, value: Value, options: SetValueOptions) {
            self.calls
                .borrow_mut()
                .push(format!("set_value {name} validate={}", options.validate()));
            mxform_core::snapshot_set(&mut self.values.borrow_mut(), name, value)
                .expect("valid path");
            self.emit_values();
        }

        fn reset(&self, values: Option<&Value>, _options: KeepStateOptions) {
            self.calls.borrow_mut().push("reset".to_owned());
            if let Some(values) = values {
                *self.values.borrow_mut() = values.clone();
            }
            self.emit_values();
        }

        fn reset_field(&self, name: &str) {
            self.calls.borrow_mut().push(format!("reset_field {name}"));
        }

        fn set_error(&self, name: &str, error: FieldError) {
            let mut errors = json!({});
            mxform_core::snapshot_set(&mut errors, name, error.to_snapshot()).expect("valid path");
            self.emit(RawFormState {
                errors,
                ..RawFormState::with_values(self.values())
            });
        }

        fn clear_errors(&self, _names: &[&str]) {
            self.emit_values();
        }

        fn trigger(&self, _names: &[&str]) -> bool {
            true
        }

        fn unregister(&self, name: &str) {
            mxform_core::snapshot_remove(&mut self.values.borrow_mut(), name);
            self.emit_values();
        }

        fn handle_submit(
            &self,
            on_valid: &mut dyn FnMut(&Value) -> Result<(), SubmitHandlerError>,
        ) -> SubmitOutcome {
            let data = self.values();
            if data.get("invalid").is_some() {
                return SubmitOutcome::Invalid(json!({"invalid": {"type": "required"}}));
            }
            match on_valid(&data) {
                Ok(()) => SubmitOutcome::Submitted(data),
                Err(error) => SubmitOutcome::HandlerFailed { data, error },
            }
        }

        fn subscribe(&self, listener: ControlListener) -> ControlListenerId {
            let id = ControlListenerId(self.next_id.get());
            self.next_id.set(id.0 + 1);
            self.listeners.borrow_mut().push((id, Rc::new(listener)));
            id
        }

        fn unsubscribe(&self, id: ControlListenerId) {
            self.listeners.borrow_mut().retain(|(current, _)| *current != id);
        }
    }

    fn eager(values: Value) -> Form<EchoControl> {
        let config = FormConfig::default()
            .with_default_values(values.clone())
            .with_lazy_updates(false);
        Form::new(FormParams::new(config), EchoControl::new(values))
    }

    #[test]
    fn seeds_from_engine_values() {
        let form = eager(json!({"foo": 1, "bar": 2}));
        assert_eq!(form.values_snapshot(), json!({"foo": 1, "bar": 2}));
        assert_eq!(form.errors().to_snapshot(), json!({}));
        assert!(!form.is_submitted());
    }

    #[test]
    fn change_field_is_visible_immediately() {
        let config = FormConfig::default().with_default_values(json!({"foo": 1, "bar": 2}));
        let form = Form::new(FormParams::new(config), EchoControl::new(json!({"foo": 1, "bar": 2})));

        form.change_field("foo", json!(4), SetValueOptions::default())
            .unwrap();
        assert_eq!(form.values_snapshot(), json!({"foo": 4, "bar": 2}));
        assert!(form.has_pending_update());

        assert!(form.flush());
        assert_eq!(form.values_snapshot(), json!({"foo": 4, "bar": 2}));
    }

    #[test]
    fn change_field_validates_after_submit() {
        let form = eager(json!({"a": 1}));
        form.change_field("a", json!(2), SetValueOptions::default())
            .unwrap();
        form.inner.apply(&RawFormState {
            is_submitted: Some(true),
            ..RawFormState::with_values(json!({"a": 2}))
        });
        form.change_field("a", json!(3), SetValueOptions::default())
            .unwrap();
        form.change_field("a", json!(4), SetValueOptions::default().with_validate(false))
            .unwrap();

        let control = form.control().unwrap();
        let calls = control.calls.borrow();
        assert_eq!(
            *calls,
            vec![
                "set_value a validate=false",
                "set_value a validate=true",
                "set_value a validate=false",
            ]
        );
    }

    #[test]
    fn lazy_updates_coalesce() {
        let form = Form::new(FormParams::default(), EchoControl::new(json!({"n": 0})));
        let control = form.control().unwrap();
        let runs = Rc::new(Cell::new(0u32));
        let runs_clone = Rc::clone(&runs);
        let watched = form.clone();
        let _r = Reaction::autorun(move || {
            let _ = watched.errors().to_snapshot();
            runs_clone.set(runs_clone.get() + 1);
        });

        control.set_error("a", FieldError::new("x"));
        control.set_error("b", FieldError::new("y"));
        control.set_error("c", FieldError::new("z"));
        assert_eq!(runs.get(), 1);

        assert!(form.poll(Instant::now()));
        assert_eq!(runs.get(), 2);
        assert_eq!(form.errors().to_snapshot(), json!({"c": {"type": "z"}}));
        assert!(!form.poll(Instant::now()));
    }

    #[test]
    fn poll_waits_for_deadline() {
        let config = FormConfig::default().with_lazy_updates_timer(Duration::from_millis(50));
        let form = Form::new(FormParams::new(config), EchoControl::new(json!({"n": 0})));
        form.set_value("n", json!(1), SetValueOptions::default())
            .unwrap();

        let due = form.next_update_due().unwrap();
        assert!(!form.poll(due - Duration::from_millis(1)));
        assert!(form.poll(due));
        assert!(!form.has_pending_update());
    }

    #[test]
    fn huge_timer_is_clamped() {
        let config = FormConfig::default().with_lazy_updates_timer(Duration::MAX);
        assert_eq!(config.lazy_updates_timer_ms, u64::MAX);
        let form = Form::new(FormParams::new(config), EchoControl::new(json!({"n": 0})));
        form.set_value("n", json!(1), SetValueOptions::default())
            .unwrap();

        let now = Instant::now();
        let due = form.next_update_due().unwrap();
        assert!(due <= now + MAX_LAZY_DELAY);
        assert!(!form.poll(now));
        form.flush();
        assert_eq!(form.values_snapshot(), json!({"n": 1}));
    }

    #[test]
    fn flags_follow_reports() {
        let form = eager(json!({}));
        form.inner.apply(&RawFormState {
            is_valid: Some(true),
            submit_count: Some(3),
            ..RawFormState::default()
        });
        assert!(form.is_valid());
        assert_eq!(form.submit_count(), 3);

        form.inner.apply(&RawFormState::default());
        assert!(form.is_valid());
        assert_eq!(form.submit_count(), 3);
    }

    #[test]
    fn reset_field_restores_default() {
        let form = eager(json!({"a": {"b": "orig"}}));
        form.set_value("a.b", json!("edited"), SetValueOptions::default())
            .unwrap();
        form.reset_field("a.b").unwrap();
        assert_eq!(form.values_snapshot(), json!({"a": {"b": "orig"}}));
        assert!(
            form.control()
                .unwrap()
                .calls
                .borrow()
                .contains(&"reset_field a.b".to_owned())
        );
    }

    #[test]
    fn reset_form_with_values_updates_defaults() {
        let form = eager(json!({"a": 1}));
        form.reset_form(Some(json!({"a": 5})), KeepStateOptions::default())
            .unwrap();
        assert_eq!(form.values_snapshot(), json!({"a": 5}));
        assert_eq!(form.default_values(), json!({"a": 5}));

        form.reset_form(
            Some(json!({"a": 9})),
            KeepStateOptions {
                keep_default_values: true,
                ..KeepStateOptions::default()
            },
        )
        .unwrap();
        assert_eq!(form.default_values(), json!({"a": 5}));
    }

    #[test]
    fn reset_runs_callback() {
        let resets = Rc::new(Cell::new(0u32));
        let resets_clone = Rc::clone(&resets);
        let params = FormParams::new(FormConfig::default().with_default_values(json!({"a": 1})))
            .with_on_reset(move || resets_clone.set(resets_clone.get() + 1));
        let form = Form::new(params, EchoControl::new(json!({"a": 2})));
        form.reset().unwrap();
        assert_eq!(resets.get(), 1);
        assert_eq!(form.values_snapshot(), json!({"a": 1}));
    }

    #[test]
    fn submit_returns_data() {
        let seen = Rc::new(RefCell::new(None));
        let seen_clone = Rc::clone(&seen);
        let params = FormParams::default().with_on_submit(move |data| {
            *seen_clone.borrow_mut() = Some(data.clone());
            Ok(())
        });
        let form = Form::new(params, EchoControl::new(json!({"a": 1})));
        assert_eq!(form.submit().unwrap(), json!({"a": 1}));
        assert_eq!(*seen.borrow(), Some(json!({"a": 1})));
    }

    #[test]
    fn submit_handler_error_becomes_root_error() {
        let failed = Rc::new(Cell::new(0u32));
        let failed_clone = Rc::clone(&failed);
        let params = FormParams::new(FormConfig::default().with_lazy_updates(false))
            .with_on_submit(|_| Err("server down".into()))
            .with_on_submit_failed(move |_| failed_clone.set(failed_clone.get() + 1));
        let form = Form::new(params, EchoControl::new(json!({"a": 1})));

        let err = form.submit().unwrap_err();
        assert!(matches!(&err, FormError::SubmitHandler { message } if message == "server down"));
        assert_eq!(failed.get(), 1);
        let errors = form.errors_with_path();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "root.submit");
        assert_eq!(errors[0].error.kind, "submit");
    }

    #[test]
    fn invalid_submit_reports_errors() {
        let form = eager(json!({"invalid": true}));
        let err = form.submit().unwrap_err();
        match err {
            FormError::Invalid { errors } => assert_eq!(errors[0].path, "invalid"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn destroy_detaches() {
        let form = Form::new(FormParams::default(), EchoControl::new(json!({"a": 1})));
        let control = form.control().unwrap();
        form.set_value("a", json!(2), SetValueOptions::default())
            .unwrap();
        form.destroy();

        assert!(form.is_destroyed());
        assert!(!form.has_pending_update());
        assert!(control.listeners.borrow().is_empty());
        assert!(matches!(
            form.set_value("a", json!(3), SetValueOptions::default()),
            Err(FormError::Destroyed)
        ));
        assert!(!form.flush());
    }

    #[test]
    fn abort_signal_destroys() {
        let owner = AbortController::new();
        let params = FormParams::default().with_abort_signal(owner.signal());
        let form = Form::new(params, EchoControl::new(json!({})));
        owner.abort();
        assert!(form.is_destroyed());
        assert!(form.control().is_err());
    }
}
