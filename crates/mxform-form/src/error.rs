use mxform_core::{CoreError, ErrorWithPath};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FormError {
    #[error("form has been destroyed")]
    Destroyed,

    #[error("form validation failed with {} field error(s)", .errors.len())]
    Invalid { errors: Vec<ErrorWithPath> },

    #[error("submit handler failed: {message}")]
    SubmitHandler { message: String },

    #[error("invalid form configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}
