//! Tree-level diff: compare two snapshots and produce a [`Changeset`].
//!
//! The walk goes level by level. Each level is a list of directory pairs
//! whose ids differ; pairs are compared independently (in parallel, bounded
//! by [`EngineOptions::parallelism`]) and yield emissions plus the next
//! level's pairs. Equal subtree ids are never loaded.

use std::collections::BTreeSet;

use strata_store::{resolve, ObjectStore, SnapshotStore, Tree, TreeEntry};
use strata_types::path::{dir_path, join_path, require_non_root};
use strata_types::ObjectId;
use tracing::{debug, info};

use crate::changeset::Changeset;
use crate::error::{DiffError, DiffResult};
use crate::options::{map_bounded, CancelToken, EngineOptions};

/// A pair of directories at the same path that still need comparing.
struct DirPair {
    path: String,
    new: ObjectId,
    old: ObjectId,
}

/// What comparing one directory pair produced.
#[derive(Default)]
struct LevelOutput {
    added: Vec<String>,
    removed: Vec<String>,
    modified: Vec<String>,
    descend: Vec<DirPair>,
}

/// Compare `new` against `old` with default options.
pub fn diff(store: &dyn ObjectStore, new: &ObjectId, old: &ObjectId) -> DiffResult<Changeset> {
    diff_with(store, new, old, &EngineOptions::default())
}

/// Compare `new` against `old`.
///
/// Paths present only in `new` are added, only in `old` removed; files
/// present in both with different content are modified. Wholly added or
/// removed directories are reported once as `"dir/"`. A file replaced by a
/// directory (or the reverse) is reported as removed and added.
pub fn diff_with(
    store: &dyn ObjectStore,
    new: &ObjectId,
    old: &ObjectId,
    options: &EngineOptions,
) -> DiffResult<Changeset> {
    let mut added = Vec::new();
    let mut removed = Vec::new();
    let mut modified = Vec::new();

    let mut level = Vec::new();
    if new != old {
        level.push(DirPair {
            path: String::new(),
            new: *new,
            old: *old,
        });
    }

    let mut depth = 0usize;
    while !level.is_empty() {
        debug!(depth, dirs = level.len(), "diff level");
        let outputs = map_bounded(&level, options.parallelism, |pair| {
            compare_dirs(store, pair, &options.cancel)
        });
        let mut next = Vec::new();
        for output in outputs {
            let output = output?;
            added.extend(output.added);
            removed.extend(output.removed);
            modified.extend(output.modified);
            next.extend(output.descend);
        }
        level = next;
        depth += 1;
    }

    let changeset = Changeset::new(added, removed, modified);
    info!(
        added = changeset.added().len(),
        removed = changeset.removed().len(),
        modified = changeset.modified().len(),
        "diff complete"
    );
    Ok(changeset)
}

fn load(store: &dyn ObjectStore, id: &ObjectId, cancel: &CancelToken) -> DiffResult<Tree> {
    cancel.check()?;
    Ok(store.list_children(id)?)
}

/// Reported form of a path: directories carry a trailing slash.
fn reported(path: &str, entry: &TreeEntry) -> String {
    if entry.is_dir() {
        dir_path(path)
    } else {
        path.to_string()
    }
}

fn compare_dirs(
    store: &dyn ObjectStore,
    pair: &DirPair,
    cancel: &CancelToken,
) -> DiffResult<LevelOutput> {
    let new_tree = load(store, &pair.new, cancel)?;
    let old_tree = load(store, &pair.old, cancel)?;

    let names: BTreeSet<&str> = new_tree
        .entries
        .iter()
        .chain(old_tree.entries.iter())
        .map(|e| e.name.as_str())
        .collect();

    let mut out = LevelOutput::default();
    for name in names {
        let path = join_path(&pair.path, name);
        match (new_tree.get(name), old_tree.get(name)) {
            (Some(n), None) => out.added.push(reported(&path, n)),
            (None, Some(o)) => out.removed.push(reported(&path, o)),
            (Some(n), Some(o)) => match (n.is_dir(), o.is_dir()) {
                (true, true) => {
                    if n.object_id != o.object_id {
                        out.descend.push(DirPair {
                            path,
                            new: n.object_id,
                            old: o.object_id,
                        });
                    }
                }
                (false, false) => {
                    if !n.same_content(o) {
                        out.modified.push(path);
                    }
                }
                _ => {
                    out.removed.push(reported(&path, o));
                    out.added.push(reported(&path, n));
                }
            },
            (None, None) => {}
        }
    }
    Ok(out)
}

/// The tree id of the directory at `path` below `root`.
///
/// Diffing two scoped ids yields paths relative to that directory.
pub fn scope(store: &dyn ObjectStore, root: &ObjectId, path: &str) -> DiffResult<ObjectId> {
    let path = require_non_root(path)?;
    match resolve(store, root, path)? {
        Some(entry) if entry.is_dir() => Ok(entry.object_id),
        Some(_) => Err(DiffError::NotADirectory(path.to_string())),
        None => Err(DiffError::PathNotFound(path.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{snapshot, snapshot_with_mtimes};
    use strata_store::InMemoryObjectStore;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn removed_file_only() {
        let store = InMemoryObjectStore::new();
        let old = snapshot(
            &store,
            &[
                ("file1.txt", "content1"),
                ("dir/file2.txt", "content2"),
                ("removed.txt", "to be removed"),
            ],
        );
        let new = snapshot(&store, &[("file1.txt", "content1"), ("dir/file2.txt", "content2")]);
        let cs = diff(&store, &new, &old).unwrap();
        assert_eq!(cs.removed(), ["removed.txt"]);
        assert!(cs.added().is_empty());
        assert!(cs.modified().is_empty());
    }

    #[test]
    fn removed_directory_is_coalesced() {
        let store = InMemoryObjectStore::new();
        let old = snapshot(
            &store,
            &[
                ("keep.txt", "k"),
                ("remove-dir/file.txt", "f"),
                ("remove-dir/subdir/nested.txt", "n"),
            ],
        );
        let new = snapshot(&store, &[("keep.txt", "k")]);
        let cs = diff(&store, &new, &old).unwrap();
        assert_eq!(cs.removed(), ["remove-dir/"]);
        assert!(cs.added().is_empty());
    }

    #[test]
    fn added_directory_is_coalesced() {
        let store = InMemoryObjectStore::new();
        let old = snapshot(&store, &[("a.txt", "a")]);
        let new = snapshot(
            &store,
            &[("a.txt", "a"), ("new-dir/file.txt", "x"), ("new-dir/sub/deep.txt", "y")],
        );
        let cs = diff(&store, &new, &old).unwrap();
        assert_eq!(cs.added(), ["new-dir/"]);
    }

    #[test]
    fn modified_file() {
        let store = InMemoryObjectStore::new();
        let old = snapshot(&store, &[("file.txt", "original")]);
        let new = snapshot(&store, &[("file.txt", "modified")]);
        let cs = diff(&store, &new, &old).unwrap();
        assert_eq!(cs.modified(), ["file.txt"]);
        assert!(cs.added().is_empty() && cs.removed().is_empty());
    }

    #[test]
    fn nested_modification_attributed_to_leaf() {
        let store = InMemoryObjectStore::new();
        let old = snapshot(&store, &[("a/b/c.txt", "1"), ("a/other.txt", "o")]);
        let new = snapshot(&store, &[("a/b/c.txt", "2"), ("a/other.txt", "o")]);
        let cs = diff(&store, &new, &old).unwrap();
        assert_eq!(cs.modified(), ["a/b/c.txt"]);
        assert_eq!(cs.len(), 1);
    }

    #[test]
    fn identical_snapshots_are_empty() {
        let store = InMemoryObjectStore::new();
        let x = snapshot_with_mtimes(&store, &[("f.txt", "same", 10), ("d/g.txt", "g", 20)]);
        let y = snapshot_with_mtimes(&store, &[("f.txt", "same", 10), ("d/g.txt", "g", 20)]);
        assert_eq!(x, y);
        assert!(diff(&store, &x, &y).unwrap().is_empty());
    }

    #[test]
    fn reflexive_diff_touches_no_objects() {
        let store = InMemoryObjectStore::new();
        let x = snapshot(&store, &[("a/b/c", "c")]);
        store.reset_reads();
        assert!(diff(&store, &x, &x).unwrap().is_empty());
        assert_eq!(store.reads(), 0);
    }

    #[test]
    fn mtime_alone_is_a_modification() {
        let store = InMemoryObjectStore::new();
        let old = snapshot_with_mtimes(&store, &[("file.txt", "same", 1)]);
        let new = snapshot_with_mtimes(&store, &[("file.txt", "same", 2)]);
        let cs = diff(&store, &new, &old).unwrap();
        assert_eq!(cs.modified(), ["file.txt"]);
    }

    #[test]
    fn type_change_reports_both_sides() {
        let store = InMemoryObjectStore::new();
        let old = snapshot(&store, &[("x", "file"), ("y/inner.txt", "i")]);
        let new = snapshot(&store, &[("x/child.txt", "c"), ("y", "now a file")]);
        let cs = diff(&store, &new, &old).unwrap();
        assert_eq!(cs.removed(), strings(&["x", "y/"]));
        assert_eq!(cs.added(), strings(&["x/", "y"]));
        assert!(cs.modified().is_empty());
    }

    #[test]
    fn unchanged_subtrees_are_pruned() {
        let store = InMemoryObjectStore::new();
        let mut files: Vec<(String, String)> = (0..20)
            .map(|i| (format!("big/sub{i}/file.txt"), format!("{i}")))
            .collect();
        files.push(("small/x.txt".into(), "1".into()));
        let borrowed: Vec<(&str, &str)> =
            files.iter().map(|(p, c)| (p.as_str(), c.as_str())).collect();
        let old = snapshot(&store, &borrowed);
        files.pop();
        files.push(("small/x.txt".into(), "2".into()));
        let borrowed: Vec<(&str, &str)> =
            files.iter().map(|(p, c)| (p.as_str(), c.as_str())).collect();
        let new = snapshot(&store, &borrowed);

        store.reset_reads();
        let cs = diff(&store, &new, &old).unwrap();
        assert_eq!(cs.modified(), ["small/x.txt"]);
        // Two roots plus the two `small` trees; nothing under `big`.
        assert_eq!(store.reads(), 4);
    }

    #[test]
    fn parallelism_does_not_change_output() {
        let store = InMemoryObjectStore::new();
        let old = snapshot(
            &store,
            &[("a/1", "1"), ("b/2", "2"), ("c/3", "3"), ("d/4", "4"), ("e/5", "5")],
        );
        let new = snapshot(
            &store,
            &[("a/1", "x"), ("b/9", "2"), ("c/3", "3"), ("d/4/deep", "4"), ("f/6", "6")],
        );
        let serial = diff_with(&store, &new, &old, &EngineOptions::default().with_parallelism(1))
            .unwrap();
        let parallel = diff_with(&store, &new, &old, &EngineOptions::default().with_parallelism(8))
            .unwrap();
        assert_eq!(serial, parallel);
        assert_eq!(serial.modified(), ["a/1"]);
        assert_eq!(serial.added(), strings(&["b/9", "d/4/", "f/"]));
        assert_eq!(serial.removed(), strings(&["b/2", "d/4", "e/"]));
    }

    #[test]
    fn cancelled_diff_fails() {
        let store = InMemoryObjectStore::new();
        let old = snapshot(&store, &[("a", "1")]);
        let new = snapshot(&store, &[("a", "2")]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let opts = EngineOptions::default().with_cancel(cancel);
        assert!(matches!(diff_with(&store, &new, &old, &opts), Err(DiffError::Cancelled)));
    }

    #[test]
    fn missing_tree_is_store_error() {
        let store = InMemoryObjectStore::new();
        let new = snapshot(&store, &[("a", "1")]);
        let ghost = ObjectId::from_bytes(b"ghost");
        assert!(matches!(diff(&store, &new, &ghost), Err(DiffError::Store(_))));
    }

    #[test]
    fn scoped_diff_is_relative() {
        let store = InMemoryObjectStore::new();
        let old = snapshot(&store, &[("sub/a.txt", "1"), ("outside.txt", "o")]);
        let new = snapshot(&store, &[("sub/a.txt", "2"), ("outside.txt", "changed")]);
        let cs = diff(
            &store,
            &scope(&store, &new, "sub/").unwrap(),
            &scope(&store, &old, "sub").unwrap(),
        )
        .unwrap();
        assert_eq!(cs.modified(), ["a.txt"]);
        assert_eq!(cs.len(), 1);
    }

    #[test]
    fn scope_errors() {
        let store = InMemoryObjectStore::new();
        let root = snapshot(&store, &[("f.txt", "f")]);
        assert!(matches!(scope(&store, &root, ""), Err(DiffError::EmptyPath)));
        assert!(matches!(scope(&store, &root, "f.txt"), Err(DiffError::NotADirectory(_))));
        assert!(matches!(scope(&store, &root, "nope"), Err(DiffError::PathNotFound(_))));
    }
}
