#![forbid(unsafe_code)]

//! Reactive form wrapper.
//!
//! [`Form`] binds a form engine (anything implementing [`FormControl`]) to
//! the observable tree from `mxform-core`. The engine stays the source of
//! truth for registration and validation; the form exposes its state as
//! fine-grained observables so that consumers re-run only for the fields
//! they read.

pub mod abort;
pub mod config;
pub mod control;
pub mod error;
pub mod form;
pub mod params;

pub use abort::{AbortController, AbortSignal};
pub use config::FormConfig;
pub use control::{
    ControlListener, ControlListenerId, FormControl, KeepStateOptions, RawFormState,
    SetValueOptions, SubmitHandlerError, SubmitOutcome,
};
pub use error::FormError;
pub use form::Form;
pub use params::{FormParams, ResetHandler, SubmitFailedHandler, SubmitHandler};
