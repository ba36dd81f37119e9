use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Errors produced when validating a snapshot path.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    /// An operation that needs a non-root path was given the empty path.
    #[error("path must not be empty")]
    EmptyPath,

    /// A path component is not allowed (`.`, `..`, or contains NUL).
    #[error("invalid component {component:?} in path {path:?}")]
    InvalidComponent { path: String, component: String },
}
