//! High-level API for strata.
//!
//! [`Strata`] bundles an object store with an [`EngineConfig`] and exposes
//! the whole change-tracking surface: diff, layer, patch encode and decode,
//! apply, and merge. [`SnapshotBuilder`] describes snapshots for tests and
//! embedders that do not ingest from disk.

pub mod builder;
pub mod config;
pub mod error;
pub mod repository;

pub use builder::SnapshotBuilder;
pub use config::EngineConfig;
pub use error::{SdkError, SdkResult};
pub use repository::Strata;

// Re-export key types
pub use strata_diff::{
    ApplySummary, CancelToken, ChangeKind, Changeset, Conflict, ConflictKind, Conflicts, LineDiff,
    MergeStrategy, SnapshotPair,
};
pub use strata_patch::{Patch, PatchSummary, Record};
pub use strata_store::{EntryMode, FileMeta, InMemoryObjectStore, ObjectStore, TreeEntry};
pub use strata_types::ObjectId;
