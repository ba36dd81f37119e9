//! Error types for the diff crate.

use strata_store::StoreError;
use strata_types::PathError;

use crate::conflict::Conflicts;

/// Errors that can occur during diff, layer, apply and merge operations.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// Store operation failed.
    #[error("store error: {0}")]
    Store(StoreError),

    /// A write target passes through an existing non-directory.
    #[error("cannot apply {path:?}: {blocker:?} exists and is not a directory")]
    ApplyPath { path: String, blocker: String },

    /// A non-root path was required.
    #[error("path must not be empty")]
    EmptyPath,

    /// The path names a file where a directory was required.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// The path is absent from the snapshot it was looked up in.
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// The operation was cancelled before completing.
    #[error("operation cancelled")]
    Cancelled,

    /// Two change sets touch the same paths incompatibly.
    #[error("{0}")]
    Conflicts(Conflicts),

    /// A conflicting file is not text and cannot carry conflict markers.
    #[error("binary file has conflicts: {0}")]
    BinaryConflict(String),
}

impl From<StoreError> for DiffError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::PathBlocked { path, blocker } => Self::ApplyPath { path, blocker },
            StoreError::Path(PathError::EmptyPath) => Self::EmptyPath,
            other => Self::Store(other),
        }
    }
}

impl From<PathError> for DiffError {
    fn from(err: PathError) -> Self {
        StoreError::Path(err).into()
    }
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
