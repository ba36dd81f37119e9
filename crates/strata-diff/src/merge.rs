//! Merging independent change sets made against related snapshots.
//!
//! Each side is a [`SnapshotPair`]: the snapshot a change started from and
//! the snapshot it produced. Merging overlays the two starting points, applies
//! our changes, then applies theirs with conflicts resolved by a
//! [`MergeStrategy`]. Directories added on both sides merge file by file.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};
use strata_store::{EntryMode, FileMeta, ObjectStore, SnapshotStore, TreeEditor, TreeEntry};
use strata_types::path::{is_descendant, join_path, trim_dir_suffix};
use strata_types::ObjectId;
use tracing::{debug, info};

use crate::apply::{apply_plan, ApplyPlan, ApplyWrite};
use crate::changeset::{ChangeKind, Changeset};
use crate::conflict::{check_conflicts, Conflict, Conflicts};
use crate::error::{DiffError, DiffResult};
use crate::options::EngineOptions;
use crate::tree_diff::diff_with;

/// How conflicting changes are resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeStrategy {
    /// Refuse to merge if any path is touched by both sides, even identically.
    FailEarly,
    /// Fail only when the two sides actually diverge at a path.
    #[default]
    Fail,
    /// Write conflict markers into text files; keep the modified side of a
    /// modify/remove conflict.
    LeaveConflictMarkers,
    PreferOurs,
    PreferTheirs,
}

impl std::str::FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail-early" => Ok(Self::FailEarly),
            "fail" => Ok(Self::Fail),
            "leave-conflict-markers" => Ok(Self::LeaveConflictMarkers),
            "prefer-ours" => Ok(Self::PreferOurs),
            "prefer-theirs" => Ok(Self::PreferTheirs),
            other => Err(format!("unknown merge strategy: {other}")),
        }
    }
}

/// A change expressed as the snapshots before and after it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotPair {
    pub before: ObjectId,
    pub after: ObjectId,
}

impl SnapshotPair {
    pub fn new(before: ObjectId, after: ObjectId) -> Self {
        Self { before, after }
    }

    /// The changes leading from `before` to `after`.
    pub fn changeset(
        &self,
        store: &dyn ObjectStore,
        options: &EngineOptions,
    ) -> DiffResult<Changeset> {
        diff_with(store, &self.after, &self.before, options)
    }
}

/// Lay `upper` over `lower`: every path of `upper` wins, directories present
/// on both sides are merged recursively.
pub fn overlay(store: &dyn ObjectStore, lower: &ObjectId, upper: &ObjectId) -> DiffResult<ObjectId> {
    if lower == upper {
        return Ok(*lower);
    }
    let mut editor = TreeEditor::open(store, lower)?;
    let mut pending = vec![(String::new(), *upper, *lower)];
    while let Some((prefix, upper_id, lower_id)) = pending.pop() {
        let below = store.list_children(&lower_id)?;
        for entry in store.list_children(&upper_id)?.entries {
            let path = join_path(&prefix, &entry.name);
            match below.get(&entry.name) {
                Some(existing) if existing.is_dir() && entry.is_dir() => {
                    if existing.object_id != entry.object_id {
                        pending.push((path, entry.object_id, existing.object_id));
                    }
                }
                _ => editor.put(&path, entry)?,
            }
        }
    }
    Ok(editor.finish()?)
}

/// Merge `theirs` into `ours`.
///
/// The merged starting point is `theirs.before` laid over `ours.before`. The
/// result pairs that starting point with the merged outcome, so its change
/// set can be recomputed with [`SnapshotPair::changeset`].
pub fn merge(
    store: &dyn ObjectStore,
    ours: &SnapshotPair,
    theirs: &SnapshotPair,
    strategy: MergeStrategy,
    options: &EngineOptions,
) -> DiffResult<SnapshotPair> {
    let our_changes = ours.changeset(store, options)?;
    let their_changes = theirs.changeset(store, options)?;

    if strategy == MergeStrategy::FailEarly {
        let conflicts = check_conflicts(&our_changes, &their_changes);
        if !conflicts.is_empty() {
            return Err(DiffError::Conflicts(conflicts));
        }
    }

    let before = overlay(store, &ours.before, &theirs.before)?;
    let our_plan = ApplyPlan::from_changeset(store, &our_changes, &ours.after)?.expanded(store)?;
    let their_plan =
        ApplyPlan::from_changeset(store, &their_changes, &theirs.after)?.expanded(store)?;

    let with_ours = apply_plan(store, &before, &our_plan, options)?.root;
    let (their_plan, conflicts) = reconcile(store, &our_plan, &their_plan, strategy)?;
    if !conflicts.is_empty() {
        if matches!(strategy, MergeStrategy::Fail | MergeStrategy::FailEarly) {
            return Err(DiffError::Conflicts(conflicts));
        }
        debug!(count = conflicts.len(), ?strategy, "resolved conflicts");
    }
    let after = apply_plan(store, &with_ours, &their_plan, options)?.root;

    info!(before = %before.short_hex(), after = %after.short_hex(), ?strategy, "merge complete");
    Ok(SnapshotPair { before, after })
}

/// Octopus merge: fold every pair in `others` into `first`, in order.
///
/// With [`MergeStrategy::FailEarly`] every pair of sides (including pairs
/// among `others`) is checked before anything is merged. An empty `others`
/// returns `first` unchanged.
pub fn merge_many(
    store: &dyn ObjectStore,
    first: &SnapshotPair,
    others: &[SnapshotPair],
    strategy: MergeStrategy,
    options: &EngineOptions,
) -> DiffResult<SnapshotPair> {
    if others.is_empty() {
        return Ok(*first);
    }
    if strategy == MergeStrategy::FailEarly {
        let changesets = std::iter::once(first)
            .chain(others)
            .map(|pair| pair.changeset(store, options))
            .collect::<DiffResult<Vec<_>>>()?;
        let mut conflicts = Conflicts::default();
        for (i, ours) in changesets.iter().enumerate() {
            for theirs in &changesets[i + 1..] {
                conflicts.extend(check_conflicts(ours, theirs));
            }
        }
        if !conflicts.is_empty() {
            return Err(DiffError::Conflicts(conflicts));
        }
    }
    let mut merged = *first;
    for other in others {
        merged = merge(store, &merged, other, strategy, options)?;
    }
    Ok(merged)
}

/// Filter their expanded plan against ours, collecting conflicts and
/// resolving them per `strategy`.
fn reconcile(
    store: &dyn ObjectStore,
    ours: &ApplyPlan,
    theirs: &ApplyPlan,
    strategy: MergeStrategy,
) -> DiffResult<(ApplyPlan, Conflicts)> {
    let our_writes: HashMap<&str, &ApplyWrite> = ours
        .writes()
        .iter()
        .map(|w| (trim_dir_suffix(&w.path), w))
        .collect();
    let covered = |removed: &[String], path: &str| {
        removed.iter().any(|r| {
            trim_dir_suffix(r) == trim_dir_suffix(path) || is_descendant(path, r)
        })
    };

    let mut conflicts = Vec::new();
    let mut removed = Vec::new();
    for path in theirs.removed() {
        let modified_by_us = ours.writes().iter().find(|w| {
            w.kind == ChangeKind::Modified
                && (trim_dir_suffix(&w.path) == trim_dir_suffix(path)
                    || is_descendant(&w.path, path))
        });
        match modified_by_us {
            None => removed.push(path.clone()),
            Some(write) => {
                conflicts.push(Conflict::new(&write.path, ChangeKind::Modified, ChangeKind::Removed));
                if strategy == MergeStrategy::PreferTheirs {
                    removed.push(path.clone());
                }
            }
        }
    }

    let mut writes = Vec::new();
    for write in theirs.writes() {
        if let Some(mine) = our_writes.get(trim_dir_suffix(&write.path)) {
            if (mine.entry.is_dir() && write.entry.is_dir()) || mine.entry.same_content(&write.entry)
            {
                continue;
            }
            conflicts.push(Conflict::new(&write.path, mine.kind, write.kind));
            match strategy {
                MergeStrategy::PreferTheirs => writes.push(write.clone()),
                MergeStrategy::LeaveConflictMarkers => writes.push(ApplyWrite {
                    path: write.path.clone(),
                    kind: write.kind,
                    entry: with_markers(store, &write.path, &mine.entry, &write.entry)?,
                }),
                _ => {}
            }
            continue;
        }
        if write.kind == ChangeKind::Modified && covered(ours.removed(), &write.path) {
            conflicts.push(Conflict::new(&write.path, ChangeKind::Removed, ChangeKind::Modified));
            if strategy == MergeStrategy::PreferOurs {
                continue;
            }
        }
        writes.push(write.clone());
    }

    Ok((ApplyPlan::new(removed, writes), Conflicts(conflicts)))
}

/// A file holding both versions of each differing region between markers.
fn with_markers(
    store: &dyn ObjectStore,
    path: &str,
    ours: &TreeEntry,
    theirs: &TreeEntry,
) -> DiffResult<TreeEntry> {
    let binary = || DiffError::BinaryConflict(path.to_string());
    let regular = |e: &TreeEntry| matches!(e.mode, EntryMode::Regular | EntryMode::Executable);
    if !regular(ours) || !regular(theirs) {
        return Err(binary());
    }
    let text = |e: &TreeEntry| -> DiffResult<String> {
        let bytes = store.read_file(&e.object_id)?;
        match String::from_utf8(bytes) {
            Ok(s) if !s.contains('\0') => Ok(s),
            _ => Err(binary()),
        }
    };
    let merged = conflict_markers(&text(ours)?, &text(theirs)?);
    let meta = FileMeta {
        executable: ours.mode == EntryMode::Executable,
        mtime_ns: ours.mtime_ns.max(theirs.mtime_ns),
        link_target: None,
    };
    Ok(store.create_file(&ours.name, merged.as_bytes(), meta)?)
}

fn conflict_markers(ours: &str, theirs: &str) -> String {
    fn push_line(out: &mut String, line: &str) {
        out.push_str(line);
        if !line.ends_with('\n') {
            out.push('\n');
        }
    }
    fn flush(out: &mut String, mine: &mut Vec<&str>, other: &mut Vec<&str>) {
        if mine.is_empty() && other.is_empty() {
            return;
        }
        out.push_str("<<<<<<< ours\n");
        mine.drain(..).for_each(|l| push_line(out, l));
        out.push_str("=======\n");
        other.drain(..).for_each(|l| push_line(out, l));
        out.push_str(">>>>>>> theirs\n");
    }

    let diff = TextDiff::from_lines(ours, theirs);
    let mut out = String::with_capacity(ours.len() + theirs.len() + 40);
    let (mut mine, mut other) = (Vec::new(), Vec::new());
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Equal => {
                flush(&mut out, &mut mine, &mut other);
                out.push_str(change.value());
            }
            ChangeTag::Delete => mine.push(change.value()),
            ChangeTag::Insert => other.push(change.value()),
        }
    }
    flush(&mut out, &mut mine, &mut other);
    out
}
