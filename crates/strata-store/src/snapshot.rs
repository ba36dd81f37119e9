//! Typed snapshot access over any [`ObjectStore`].
//!
//! A snapshot is identified by the id of its root tree. Everything reachable
//! from that id is immutable, so snapshots share unchanged subtrees by id.

use strata_types::path::{dir_path, is_dir_path, join_path, split_path, validate_path};
use strata_types::ObjectId;
use tracing::trace;

use crate::error::{StoreError, StoreResult};
use crate::object::{Blob, EntryMode, FileMeta, Tree, TreeEntry};
use crate::traits::ObjectStore;

/// Snapshot-level operations, available on every [`ObjectStore`].
pub trait SnapshotStore {
    /// The entries of a directory, sorted by name.
    fn list_children(&self, tree_id: &ObjectId) -> StoreResult<Tree>;

    /// The bytes of a file (or the target of a symlink).
    fn read_file(&self, blob_id: &ObjectId) -> StoreResult<Vec<u8>>;

    /// Store file bytes and return the entry that names them.
    fn create_file(&self, name: &str, data: &[u8], meta: FileMeta) -> StoreResult<TreeEntry>;

    /// Store a directory listing and return its tree id.
    fn create_dir(&self, children: Vec<TreeEntry>) -> StoreResult<ObjectId>;

    /// Tree id of the empty directory.
    fn empty_dir(&self) -> StoreResult<ObjectId> {
        self.create_dir(Vec::new())
    }
}

impl<S: ObjectStore + ?Sized> SnapshotStore for S {
    fn list_children(&self, tree_id: &ObjectId) -> StoreResult<Tree> {
        trace!(tree = %tree_id.short_hex(), "list children");
        let obj = self.read(tree_id)?.ok_or(StoreError::NotFound(*tree_id))?;
        Tree::from_stored_object(&obj)
    }

    fn read_file(&self, blob_id: &ObjectId) -> StoreResult<Vec<u8>> {
        let obj = self.read(blob_id)?.ok_or(StoreError::NotFound(*blob_id))?;
        Ok(Blob::from_stored_object(obj)?.data)
    }

    fn create_file(&self, name: &str, data: &[u8], meta: FileMeta) -> StoreResult<TreeEntry> {
        let (mode, bytes) = match &meta.link_target {
            Some(target) => (EntryMode::Symlink, target.as_bytes()),
            None if meta.executable => (EntryMode::Executable, data),
            None => (EntryMode::Regular, data),
        };
        let object_id = self.write(&Blob::new(bytes.to_vec()).to_stored_object())?;
        Ok(TreeEntry {
            mode,
            name: name.to_string(),
            object_id,
            size: bytes.len() as u64,
            mtime_ns: meta.mtime_ns,
            link_target: meta.link_target,
        })
    }

    fn create_dir(&self, children: Vec<TreeEntry>) -> StoreResult<ObjectId> {
        self.write(&Tree::new(children).to_stored_object()?)
    }
}

/// Look up the entry at `path` below the tree `root`.
///
/// The empty path resolves to the root directory itself (with an empty name).
/// A path in reported-directory form (`"dir/"`) only matches directories.
pub fn resolve(
    store: &dyn ObjectStore,
    root: &ObjectId,
    path: &str,
) -> StoreResult<Option<TreeEntry>> {
    validate_path(path)?;
    let mut current = TreeEntry::directory("", *root);
    for component in split_path(path) {
        if !current.is_dir() {
            return Ok(None);
        }
        let tree = store.list_children(&current.object_id)?;
        match tree.get(component) {
            Some(entry) => current = entry.clone(),
            None => return Ok(None),
        }
    }
    if is_dir_path(path) && !current.is_dir() {
        return Ok(None);
    }
    Ok(Some(current))
}

/// Every entry below the tree `root`, sorted by path.
///
/// Paths are relative to `root`; directories are reported with a trailing
/// slash. Traversal uses an explicit stack, so depth is unbounded.
pub fn walk(store: &dyn ObjectStore, root: &ObjectId) -> StoreResult<Vec<(String, TreeEntry)>> {
    let mut out = Vec::new();
    let mut pending = vec![(String::new(), *root)];
    while let Some((prefix, tree_id)) = pending.pop() {
        for entry in store.list_children(&tree_id)?.entries {
            let path = join_path(&prefix, &entry.name);
            if entry.is_dir() {
                pending.push((path.clone(), entry.object_id));
                out.push((dir_path(&path), entry));
            } else {
                out.push((path, entry));
            }
        }
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}
