use thiserror::Error;

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("path not found: {0}")]
    NotFound(String),

    #[error("not a file: {0}")]
    NotAFile(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] strata_store::StoreError),

    #[error(transparent)]
    Diff(#[from] strata_diff::DiffError),

    #[error(transparent)]
    Patch(#[from] strata_patch::PatchError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type SdkResult<T> = Result<T, SdkError>;
