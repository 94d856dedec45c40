use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid field path: {path:?}")]
    InvalidPath { path: String },

    #[error("segment {segment:?} of {path:?} does not index a list")]
    NotAnIndex { path: String, segment: String },

    #[error("index {index} of {path:?} is too far past the end of a list of {len}")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },

    #[error("snapshot root must be an object, got {kind}")]
    NotAnObject { kind: &'static str },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    #[must_use]
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath { path: path.into() }
    }
}
