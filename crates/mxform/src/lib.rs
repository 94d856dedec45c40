#![forbid(unsafe_code)]

//! mxform public facade crate.
//!
//! Re-exports the observable tree, the reactive runtime and, with the
//! `form` feature, the form wrapper.

pub use mxform_core::{DeepObservableStruct, MergeStats, Node, merge};
#[cfg(feature = "form")]
pub use mxform_form::{Form, FormConfig, FormControl, FormError, FormParams};
pub use mxform_reactive::{Computed, Observable, Reaction, action};

pub mod prelude {
    pub use mxform_core as core;
    #[cfg(feature = "form")]
    pub use mxform_form as form;
    pub use mxform_reactive as reactive;
}
