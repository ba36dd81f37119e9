use strata_diff::DiffError;
use strata_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PatchError {
    /// Malformed patch input. `line` is 1-based.
    #[error("malformed patch at line {line}: {reason}")]
    Format { line: usize, reason: String },

    #[error("compression failed: {0}")]
    Compression(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Diff(#[from] DiffError),
}

impl PatchError {
    pub(crate) fn format(line: usize, reason: impl Into<String>) -> Self {
        Self::Format {
            line,
            reason: reason.into(),
        }
    }
}

pub type PatchResult<T> = Result<T, PatchError>;
