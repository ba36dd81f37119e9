//! Copy-on-write editing of snapshot trees.
//!
//! [`TreeEditor`] starts from an existing root and only loads the directories
//! an edit actually passes through. Everything else stays as the original
//! [`TreeEntry`] and is written back by id, so the result shares every
//! untouched subtree with its base.

use std::collections::BTreeMap;

use strata_types::path::{require_non_root, split_path};
use strata_types::{ObjectId, PathError};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::object::TreeEntry;
use crate::snapshot::SnapshotStore;
use crate::traits::ObjectStore;

type Children = BTreeMap<String, Node>;

enum Node {
    /// Untouched entry: a file, or a directory that was never opened.
    Stored(TreeEntry),
    /// Directory opened for editing.
    Dir(Children),
}

/// Open a stored directory in place. Returns `None` for non-directories.
fn open<'a>(store: &dyn ObjectStore, node: &'a mut Node) -> StoreResult<Option<&'a mut Children>> {
    if let Node::Stored(entry) = node {
        if !entry.is_dir() {
            return Ok(None);
        }
        let children = load(store, &entry.object_id)?;
        *node = Node::Dir(children);
    }
    match node {
        Node::Dir(children) => Ok(Some(children)),
        Node::Stored(_) => Ok(None),
    }
}

fn load(store: &dyn ObjectStore, tree_id: &ObjectId) -> StoreResult<Children> {
    Ok(store
        .list_children(tree_id)?
        .entries
        .into_iter()
        .map(|entry| (entry.name.clone(), Node::Stored(entry)))
        .collect())
}

fn write(store: &dyn ObjectStore, children: Children) -> StoreResult<ObjectId> {
    let entries = children
        .into_iter()
        .map(|(name, node)| match node {
            Node::Stored(entry) => Ok(entry),
            Node::Dir(grandchildren) => Ok(TreeEntry::directory(name, write(store, grandchildren)?)),
        })
        .collect::<StoreResult<Vec<_>>>()?;
    store.create_dir(entries)
}

/// Mutable view of a snapshot that produces a new root on [`finish`].
///
/// [`finish`]: TreeEditor::finish
pub struct TreeEditor<'s> {
    store: &'s dyn ObjectStore,
    root: Children,
}

impl<'s> TreeEditor<'s> {
    /// Start editing from an existing root tree.
    pub fn open(store: &'s dyn ObjectStore, root: &ObjectId) -> StoreResult<Self> {
        Ok(Self {
            store,
            root: load(store, root)?,
        })
    }

    /// Start from an empty directory.
    pub fn empty(store: &'s dyn ObjectStore) -> Self {
        Self {
            store,
            root: Children::new(),
        }
    }

    /// Remove the entry at `path` and everything below it.
    ///
    /// Returns `false` if nothing was there.
    pub fn remove(&mut self, path: &str) -> StoreResult<bool> {
        let path = require_non_root(path)?;
        let components = split_path(path);
        let Some((name, parents)) = components.split_last() else {
            return Err(PathError::EmptyPath.into());
        };
        let store = self.store;
        let mut dir = &mut self.root;
        for component in parents {
            let Some(node) = dir.get_mut(*component) else {
                return Ok(false);
            };
            dir = match open(store, node)? {
                Some(children) => children,
                None => return Ok(false),
            };
        }
        Ok(dir.remove(*name).is_some())
    }

    /// Place `entry` at `path`, creating missing parent directories.
    ///
    /// An existing entry at `path` is replaced. Fails with
    /// [`StoreError::PathBlocked`] if an ancestor exists and is not a
    /// directory.
    pub fn put(&mut self, path: &str, entry: TreeEntry) -> StoreResult<()> {
        self.insert(path, entry, false)
    }

    /// Like [`put`](Self::put), but non-directory ancestors are replaced by
    /// directories instead of failing.
    pub fn force_put(&mut self, path: &str, entry: TreeEntry) -> StoreResult<()> {
        self.insert(path, entry, true)
    }

    fn insert(&mut self, path: &str, entry: TreeEntry, force: bool) -> StoreResult<()> {
        let path = require_non_root(path)?;
        let components = split_path(path);
        let Some((name, parents)) = components.split_last() else {
            return Err(PathError::EmptyPath.into());
        };
        let store = self.store;
        let mut dir = &mut self.root;
        for (depth, component) in parents.iter().enumerate() {
            let node = dir
                .entry((*component).to_string())
                .or_insert_with(|| Node::Dir(Children::new()));
            if force && matches!(node, Node::Stored(existing) if !existing.is_dir()) {
                debug!(path, blocker = %components[..=depth].join("/"), "replacing file with directory");
                *node = Node::Dir(Children::new());
            }
            dir = match open(store, node)? {
                Some(children) => children,
                None => {
                    return Err(StoreError::PathBlocked {
                        path: path.to_string(),
                        blocker: components[..=depth].join("/"),
                    })
                }
            };
        }
        dir.insert((*name).to_string(), Node::Stored(entry.renamed(*name)));
        Ok(())
    }

    /// Write every opened directory and return the new root id.
    pub fn finish(self) -> StoreResult<ObjectId> {
        write(self.store, self.root)
    }
}
