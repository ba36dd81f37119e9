//! Apply engine: merge a change plan onto an arbitrary base snapshot.
//!
//! Removals run first and are unconditional: whatever the base holds at a
//! removed path goes, and a path the base lacks is skipped. Writes then run
//! shallowest first and overwrite whatever is at their target. A write whose
//! ancestor exists as a non-directory fails with [`DiffError::ApplyPath`].

use strata_store::{resolve, walk, ObjectStore, SnapshotStore, TreeEditor, TreeEntry};
use strata_types::path::{depth, join_path};
use strata_types::ObjectId;
use tracing::{debug, info, warn};

use crate::changeset::{ChangeKind, Changeset};
use crate::error::{DiffError, DiffResult};
use crate::options::EngineOptions;

/// One entry to place at a path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplyWrite {
    /// Target path; directories in trailing-slash form.
    pub path: String,
    /// `Added` or `Modified`.
    pub kind: ChangeKind,
    pub entry: TreeEntry,
}

/// Removals and writes in the order they are applied.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApplyPlan {
    removed: Vec<String>,
    writes: Vec<ApplyWrite>,
}

impl ApplyPlan {
    /// Order removals lexicographically and writes shallowest first.
    pub fn new(mut removed: Vec<String>, mut writes: Vec<ApplyWrite>) -> Self {
        removed.sort();
        removed.dedup();
        writes.sort_by(|a, b| {
            depth(&a.path)
                .cmp(&depth(&b.path))
                .then_with(|| a.path.cmp(&b.path))
        });
        Self { removed, writes }
    }

    /// Plan for `changeset`, with written entries resolved from `new`.
    pub fn from_changeset(
        store: &dyn ObjectStore,
        changeset: &Changeset,
        new: &ObjectId,
    ) -> DiffResult<Self> {
        let mut writes = Vec::with_capacity(changeset.added().len() + changeset.modified().len());
        for (paths, kind) in [
            (changeset.added(), ChangeKind::Added),
            (changeset.modified(), ChangeKind::Modified),
        ] {
            for path in paths {
                let entry = resolve(store, new, path)?
                    .ok_or_else(|| DiffError::PathNotFound(path.clone()))?;
                writes.push(ApplyWrite {
                    path: path.clone(),
                    kind,
                    entry,
                });
            }
        }
        Ok(Self::new(changeset.removed().to_vec(), writes))
    }

    pub fn removed(&self) -> &[String] {
        &self.removed
    }

    pub fn writes(&self) -> &[ApplyWrite] {
        &self.writes
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.writes.is_empty()
    }

    /// Replace every directory write by file-level writes.
    ///
    /// A directory becomes an empty-directory write at its own path (so it
    /// still replaces whatever the base holds there), followed by one write
    /// per contained file and per contained empty directory. Applying the
    /// expanded plan builds the same tree as applying the original.
    pub fn expanded(&self, store: &dyn ObjectStore) -> DiffResult<Self> {
        let empty = store.empty_dir()?;
        let mut writes = Vec::new();
        for write in &self.writes {
            if !write.entry.is_dir() {
                writes.push(write.clone());
                continue;
            }
            writes.push(ApplyWrite {
                path: write.path.clone(),
                kind: write.kind,
                entry: TreeEntry::directory(write.entry.name.clone(), empty),
            });
            for (relative, entry) in walk(store, &write.entry.object_id)? {
                if entry.is_dir() && entry.object_id != empty {
                    continue;
                }
                writes.push(ApplyWrite {
                    path: join_path(&write.path, &relative),
                    kind: write.kind,
                    entry,
                });
            }
        }
        Ok(Self::new(self.removed.clone(), writes))
    }
}

/// Outcome of applying a plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ApplySummary {
    /// The new snapshot.
    pub root: ObjectId,
    /// Removals that deleted something.
    pub removed: usize,
    /// Removals whose path the base did not have.
    pub absent: usize,
    pub written: usize,
}

/// Apply `plan` onto `base`, returning the new root and counts.
///
/// `base` itself is left untouched; the result shares every subtree the plan
/// does not reach.
pub fn apply_plan(
    store: &dyn ObjectStore,
    base: &ObjectId,
    plan: &ApplyPlan,
    options: &EngineOptions,
) -> DiffResult<ApplySummary> {
    options.cancel.check()?;
    let mut editor = TreeEditor::open(store, base)?;

    debug!(count = plan.removed.len(), "apply removals");
    let (mut removed, mut absent) = (0, 0);
    for path in &plan.removed {
        options.cancel.check()?;
        if editor.remove(path)? {
            removed += 1;
        } else {
            warn!(path = %path, "removal target absent from base");
            absent += 1;
        }
    }

    debug!(count = plan.writes.len(), "apply writes");
    for write in &plan.writes {
        options.cancel.check()?;
        editor.put(&write.path, write.entry.clone())?;
    }

    options.cancel.check()?;
    let root = editor.finish()?;
    info!(removed, absent, written = plan.writes.len(), root = %root.short_hex(), "apply complete");
    Ok(ApplySummary {
        root,
        removed,
        absent,
        written: plan.writes.len(),
    })
}

/// Apply `changeset` (with content from `new`) onto `base`.
pub fn apply_changes(
    store: &dyn ObjectStore,
    base: &ObjectId,
    changeset: &Changeset,
    new: &ObjectId,
) -> DiffResult<ObjectId> {
    apply_changes_with(store, base, changeset, new, &EngineOptions::default())
}

pub fn apply_changes_with(
    store: &dyn ObjectStore,
    base: &ObjectId,
    changeset: &Changeset,
    new: &ObjectId,
    options: &EngineOptions,
) -> DiffResult<ObjectId> {
    let plan = ApplyPlan::from_changeset(store, changeset, new)?;
    Ok(apply_plan(store, base, &plan, options)?.root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::build_layer;
    use crate::testutil::{arb_files, build, contents, snapshot, with_empty_dir};
    use crate::tree_diff::diff;
    use proptest::prelude::*;
    use strata_store::InMemoryObjectStore;

    fn scenario_one(store: &InMemoryObjectStore) -> (ObjectId, ObjectId) {
        let old = snapshot(
            store,
            &[
                ("file1.txt", "content1"),
                ("dir/file2.txt", "content2"),
                ("removed.txt", "to be removed"),
            ],
        );
        let new = snapshot(store, &[("file1.txt", "content1"), ("dir/file2.txt", "content2")]);
        (old, new)
    }

    #[test]
    fn applying_to_old_reconstructs_new() {
        let store = InMemoryObjectStore::new();
        let old = snapshot(&store, &[("a.txt", "1"), ("gone/x", "x"), ("keep/k", "k")]);
        let new = snapshot(&store, &[("a.txt", "2"), ("fresh/y", "y"), ("keep/k", "k")]);
        let cs = diff(&store, &new, &old).unwrap();
        assert_eq!(apply_changes(&store, &old, &cs, &new).unwrap(), new);
    }

    #[test]
    fn cross_base_removes_and_keeps() {
        let store = InMemoryObjectStore::new();
        let (old, new) = scenario_one(&store);
        let cs = diff(&store, &new, &old).unwrap();
        let base = snapshot(&store, &[("keep.txt", "keep"), ("removed.txt", "other bytes")]);
        let result = apply_changes(&store, &base, &cs, &new).unwrap();
        let files = contents(&store, &result);
        assert_eq!(files.keys().collect::<Vec<_>>(), ["keep.txt"]);
        assert_eq!(files["keep.txt"], "keep");
    }

    #[test]
    fn removing_absent_path_is_counted_not_fatal() {
        let store = InMemoryObjectStore::new();
        let (old, new) = scenario_one(&store);
        let cs = diff(&store, &new, &old).unwrap();
        let base = snapshot(&store, &[("unrelated.txt", "u")]);
        let plan = ApplyPlan::from_changeset(&store, &cs, &new).unwrap();
        let summary = apply_plan(&store, &base, &plan, &EngineOptions::default()).unwrap();
        assert_eq!(summary.absent, 1);
        assert_eq!(summary.removed, 0);
        assert_eq!(summary.root, base);
    }

    #[test]
    fn removing_directory_drops_whole_subtree() {
        let store = InMemoryObjectStore::new();
        let old = snapshot(&store, &[("d/a", "a")]);
        let new = snapshot(&store, &[("other", "o")]);
        let cs = diff(&store, &new, &old).unwrap();
        assert!(cs.removed().contains(&"d/".to_string()));
        let base = snapshot(&store, &[("d/a", "a"), ("d/unrelated/b", "b"), ("z", "z")]);
        let result = apply_changes(&store, &base, &cs, &new).unwrap();
        let paths: Vec<String> = contents(&store, &result).into_keys().collect();
        assert_eq!(paths, ["other", "z"]);
    }

    #[test]
    fn overwrite_wins_for_type_changes() {
        let store = InMemoryObjectStore::new();
        let old = snapshot(&store, &[("x", "file")]);
        let new = snapshot(&store, &[("x/child", "c")]);
        let cs = diff(&store, &new, &old).unwrap();

        // The base has a directory where the change adds one; it is replaced.
        let base = snapshot(&store, &[("x/stale", "s")]);
        let result = apply_changes(&store, &base, &cs, &new).unwrap();
        let paths: Vec<String> = contents(&store, &result).into_keys().collect();
        assert_eq!(paths, ["x/", "x/child"]);
    }

    #[test]
    fn file_overwrites_directory() {
        let store = InMemoryObjectStore::new();
        let old = snapshot(&store, &[]);
        let new = snapshot(&store, &[("t", "now a file")]);
        let cs = diff(&store, &new, &old).unwrap();
        let base = snapshot(&store, &[("t/inner", "i")]);
        let result = apply_changes(&store, &base, &cs, &new).unwrap();
        assert_eq!(contents(&store, &result)["t"], "now a file");
    }

    #[test]
    fn write_through_file_is_apply_path_error() {
        let store = InMemoryObjectStore::new();
        let old = snapshot(&store, &[("a/b/keep", "k")]);
        let new = snapshot(&store, &[("a/b/keep", "k"), ("a/b/c", "c")]);
        let cs = diff(&store, &new, &old).unwrap();
        let base = snapshot(&store, &[("a", "a file")]);
        match apply_changes(&store, &base, &cs, &new) {
            Err(DiffError::ApplyPath { path, blocker }) => {
                assert_eq!(path, "a/b/c");
                assert_eq!(blocker, "a");
            }
            other => panic!("expected ApplyPath, got {other:?}"),
        }
    }

    #[test]
    fn write_below_written_file_is_apply_path_error() {
        let store = InMemoryObjectStore::new();
        let file = store
            .create_file("", b"f", strata_store::FileMeta::default())
            .unwrap();
        let plan = ApplyPlan::new(
            vec![],
            vec![
                ApplyWrite { path: "a/b".into(), kind: ChangeKind::Added, entry: file.clone() },
                ApplyWrite { path: "a".into(), kind: ChangeKind::Added, entry: file },
            ],
        );
        assert_eq!(plan.writes()[0].path, "a");
        let base = snapshot(&store, &[]);
        assert!(matches!(
            apply_plan(&store, &base, &plan, &EngineOptions::default()),
            Err(DiffError::ApplyPath { .. })
        ));
    }

    #[test]
    fn cancelled_apply_publishes_nothing() {
        let store = InMemoryObjectStore::new();
        let old = snapshot(&store, &[("a", "1")]);
        let new = snapshot(&store, &[("a", "2")]);
        let cs = diff(&store, &new, &old).unwrap();
        let opts = EngineOptions::default();
        opts.cancel.cancel();
        let before = store.len();
        assert!(matches!(
            apply_changes_with(&store, &old, &cs, &new, &opts),
            Err(DiffError::Cancelled)
        ));
        assert_eq!(store.len(), before);
    }

    #[test]
    fn expanded_plan_builds_same_tree() {
        let store = InMemoryObjectStore::new();
        let old = snapshot(&store, &[("x", "file")]);
        let new = snapshot(&store, &[("x/a/b", "b"), ("x/c", "c")]);
        let new = with_empty_dir(&store, &new, "x/hollow");
        let cs = diff(&store, &new, &old).unwrap();
        let plan = ApplyPlan::from_changeset(&store, &cs, &new).unwrap();
        let expanded = plan.expanded(&store).unwrap();
        let paths: Vec<&str> = expanded.writes().iter().map(|w| w.path.as_str()).collect();
        assert_eq!(paths, ["x/", "x/c", "x/hollow/", "x/a/b"]);

        let base = snapshot(&store, &[("x/stale", "s")]);
        let direct = apply_plan(&store, &base, &plan, &EngineOptions::default()).unwrap();
        let via_files = apply_plan(&store, &base, &expanded, &EngineOptions::default()).unwrap();
        assert_eq!(direct.root, via_files.root);
    }

    #[test]
    fn add_then_remove_is_empty_again() {
        let store = InMemoryObjectStore::new();
        let original = snapshot(&store, &[("dir/a", "a")]);
        let grown = snapshot(&store, &[("dir/a", "a"), ("dir/b", "b")]);
        let added = diff(&store, &grown, &original).unwrap();
        let with_b = apply_changes(&store, &original, &added, &grown).unwrap();
        let removed = diff(&store, &original, &with_b).unwrap();
        let back = apply_changes(&store, &with_b, &removed, &original).unwrap();
        assert!(diff(&store, &back, &original).unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn reflexive_and_disjoint(a in arb_files(), b in arb_files()) {
            let store = InMemoryObjectStore::new();
            let old = build(&store, &a);
            let new = build(&store, &b);
            prop_assert!(diff(&store, &old, &old).unwrap().is_empty());

            let cs = diff(&store, &new, &old).unwrap();
            let mut all: Vec<&String> = cs.added().iter().chain(cs.removed()).chain(cs.modified()).collect();
            let total = all.len();
            all.sort();
            all.dedup();
            prop_assert_eq!(all.len(), total);
            for list in [cs.added(), cs.removed()] {
                for p in list {
                    prop_assert!(!list.iter().any(|q| strata_types::path::is_descendant(p, q)));
                }
            }
        }

        #[test]
        fn layer_and_apply_round_trip(a in arb_files(), b in arb_files(), c in arb_files()) {
            let store = InMemoryObjectStore::new();
            let old = build(&store, &a);
            let new = build(&store, &b);
            let cs = diff(&store, &new, &old).unwrap();
            prop_assert_eq!(apply_changes(&store, &old, &cs, &new).unwrap(), new);

            // The layer holds exactly the written paths, with new's content.
            let layer = build_layer(&store, &cs, &new).unwrap();
            let in_new = contents(&store, &new);
            let in_layer = contents(&store, &layer);
            for path in cs.written() {
                prop_assert!(resolve(&store, &layer, path).unwrap().is_some());
                prop_assert_eq!(in_layer.get(path), in_new.get(path));
            }

            // Applying elsewhere never fails for trees without blocked ancestors
            // and leaves every untouched top-level name of the base alone.
            let base = build(&store, &c);
            if let Ok(result) = apply_changes(&store, &base, &cs, &new) {
                let in_result = contents(&store, &result);
                let touched: Vec<&str> = cs.all_paths().into_iter().map(|(p, _)| p).collect();
                for (path, value) in contents(&store, &base) {
                    let untouched = !touched.iter().any(|t| {
                        let t = strata_types::path::trim_dir_suffix(t);
                        strata_types::path::trim_dir_suffix(&path) == t
                            || strata_types::path::is_descendant(&path, t)
                            || strata_types::path::is_descendant(t, &path)
                    });
                    if untouched {
                        prop_assert_eq!(in_result.get(&path), Some(&value));
                    }
                }
            }
        }
    }
}
