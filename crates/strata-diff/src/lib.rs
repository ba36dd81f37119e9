//! Diff, layer, apply and merge engine over strata snapshots.
//!
//! Every operation takes an [`ObjectStore`](strata_store::ObjectStore) and
//! snapshot root ids, and returns new values; no snapshot is ever mutated.
//!
//! # Key Types
//!
//! - [`Changeset`] -- added / removed / modified paths between two snapshots
//! - [`ApplyPlan`] / [`ApplySummary`] -- ordered removals and writes onto a base
//! - [`Conflicts`] / [`MergeStrategy`] / [`SnapshotPair`] -- combining change sets
//! - [`EngineOptions`] / [`CancelToken`] -- fan-out and cancellation
//! - [`LineDiff`] -- line-level view of a modified text file

pub mod apply;
pub mod changeset;
pub mod conflict;
pub mod error;
pub mod layer;
pub mod merge;
pub mod options;
pub mod text_diff;
pub mod tree_diff;

#[cfg(test)]
pub(crate) mod testutil;

pub use apply::{apply_changes, apply_changes_with, apply_plan, ApplyPlan, ApplySummary, ApplyWrite};
pub use changeset::{ChangeKind, Changeset};
pub use conflict::{check_conflicts, Conflict, ConflictKind, Conflicts};
pub use error::{DiffError, DiffResult};
pub use layer::{build_layer, build_layer_with};
pub use merge::{merge, merge_many, overlay, MergeStrategy, SnapshotPair};
pub use options::{CancelToken, EngineOptions, DEFAULT_PARALLELISM};
pub use text_diff::LineDiff;
pub use tree_diff::{diff, diff_with, scope};
