use strata_types::{ObjectId, PathError};

/// Errors from snapshot store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    NotFound(ObjectId),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The object data is malformed or has the wrong kind.
    #[error("corrupt object {id}: {reason}")]
    CorruptObject { id: ObjectId, reason: String },

    /// Attempted to write an object whose id hashed to null.
    #[error("cannot store object with null ID")]
    NullObjectId,

    /// A write target passes through an ancestor that is not a directory.
    #[error("cannot write {path:?}: ancestor {blocker:?} is not a directory")]
    PathBlocked { path: String, blocker: String },

    /// The path itself is unusable.
    #[error(transparent)]
    Path(#[from] PathError),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
