use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::abort::AbortSignal;
use crate::config::FormConfig;
use crate::control::SubmitHandlerError;

pub type SubmitHandler = Rc<dyn Fn(&Value) -> Result<(), SubmitHandlerError>>;
pub type SubmitFailedHandler = Rc<dyn Fn(&Value)>;
pub type ResetHandler = Rc<dyn Fn()>;

/// Everything a [`Form`](crate::Form) is built from besides its engine.
#[derive(Clone, Default)]
pub struct FormParams {
    pub config: FormConfig,
    /// Receives validated data on submit.
    pub on_submit: Option<SubmitHandler>,
    /// Receives the error tree when a submit fails.
    pub on_submit_failed: Option<SubmitFailedHandler>,
    pub on_reset: Option<ResetHandler>,
    /// Aborting this signal destroys the form.
    pub abort_signal: Option<AbortSignal>,
}

impl FormParams {
    #[must_use]
    pub fn new(config: FormConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_on_submit(
        mut self,
        handler: impl Fn(&Value) -> Result<(), SubmitHandlerError> + 'static,
    ) -> Self {
        self.on_submit = Some(Rc::new(handler));
        self
    }

    #[must_use]
    pub fn with_on_submit_failed(mut self, handler: impl Fn(&Value) + 'static) -> Self {
        self.on_submit_failed = Some(Rc::new(handler));
        self
    }

    #[must_use]
    pub fn with_on_reset(mut self, handler: impl Fn() + 'static) -> Self {
        self.on_reset = Some(Rc::new(handler));
        self
    }

    #[must_use]
    pub fn with_abort_signal(mut self, signal: AbortSignal) -> Self {
        self.abort_signal = Some(signal);
        self
    }
}

impl fmt::Debug for FormParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormParams")
            .field("config", &self.config)
            .field("on_submit", &self.on_submit.is_some())
            .field("on_submit_failed", &self.on_submit_failed.is_some())
            .field("on_reset", &self.on_reset.is_some())
            .field("abort_signal", &self.abort_signal)
            .finish()
    }
}
