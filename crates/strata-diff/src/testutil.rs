//! Snapshot fixtures shared by the engine tests.

use std::collections::BTreeMap;

use proptest::prelude::*;
use strata_store::{walk, FileMeta, InMemoryObjectStore, SnapshotStore, TreeEditor};
use strata_types::path::is_descendant;
use strata_types::ObjectId;

/// Build a snapshot of text files, all with mtime zero.
pub(crate) fn snapshot(store: &InMemoryObjectStore, files: &[(&str, &str)]) -> ObjectId {
    let with_mtimes: Vec<(&str, &str, i64)> = files.iter().map(|(p, c)| (*p, *c, 0)).collect();
    snapshot_with_mtimes(store, &with_mtimes)
}

pub(crate) fn snapshot_with_mtimes(
    store: &InMemoryObjectStore,
    files: &[(&str, &str, i64)],
) -> ObjectId {
    let mut editor = TreeEditor::empty(store);
    for (path, content, mtime_ns) in files {
        let meta = FileMeta {
            mtime_ns: *mtime_ns,
            ..FileMeta::default()
        };
        let entry = store.create_file("", content.as_bytes(), meta).unwrap();
        editor.put(path, entry).unwrap();
    }
    editor.finish().unwrap()
}

/// Add an empty directory at `path`.
pub(crate) fn with_empty_dir(store: &InMemoryObjectStore, root: &ObjectId, path: &str) -> ObjectId {
    let mut editor = TreeEditor::open(store, root).unwrap();
    let empty = store.empty_dir().unwrap();
    editor
        .put(path, strata_store::TreeEntry::directory("", empty))
        .unwrap();
    editor.finish().unwrap()
}

/// Every path in a snapshot: files map to their text, directories to `"/"`.
pub(crate) fn contents(store: &InMemoryObjectStore, root: &ObjectId) -> BTreeMap<String, String> {
    walk(store, root)
        .unwrap()
        .into_iter()
        .map(|(path, entry)| {
            let value = if entry.is_dir() {
                "/".to_string()
            } else {
                String::from_utf8(store.read_file(&entry.object_id).unwrap()).unwrap()
            };
            (path, value)
        })
        .collect()
}

/// Small generated trees over a tiny alphabet, so that generated pairs
/// collide often: shared files, changed files, and file/directory swaps.
pub(crate) fn arb_files() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::btree_map("[abc](/[abc]){0,2}", "[xy]{0,2}", 0..10).prop_map(|map| {
        let paths: Vec<String> = map.keys().cloned().collect();
        map.into_iter()
            .filter(|(path, _)| !paths.iter().any(|other| is_descendant(path, other)))
            .collect()
    })
}

pub(crate) fn build(store: &InMemoryObjectStore, files: &[(String, String)]) -> ObjectId {
    let borrowed: Vec<(&str, &str)> = files.iter().map(|(p, c)| (p.as_str(), c.as_str())).collect();
    snapshot(store, &borrowed)
}
