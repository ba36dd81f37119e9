//! Layer builder: the sparse tree holding only added and modified content.

use strata_store::{resolve, ObjectStore, TreeEditor};
use strata_types::ObjectId;
use tracing::{debug, info};

use crate::changeset::Changeset;
use crate::error::{DiffError, DiffResult};
use crate::options::EngineOptions;

/// Build the layer of `changeset` taken from `new`, with default options.
pub fn build_layer(
    store: &dyn ObjectStore,
    changeset: &Changeset,
    new: &ObjectId,
) -> DiffResult<ObjectId> {
    build_layer_with(store, changeset, new, &EngineOptions::default())
}

/// Build a tree containing exactly the added and modified paths of
/// `changeset`, with their entries taken from `new`.
///
/// Parent directories are created as plain containers. A wholly added
/// directory is placed as one entry pointing at its subtree in `new`, so its
/// content is shared rather than copied. Removed paths are never consulted.
pub fn build_layer_with(
    store: &dyn ObjectStore,
    changeset: &Changeset,
    new: &ObjectId,
    options: &EngineOptions,
) -> DiffResult<ObjectId> {
    let mut editor = TreeEditor::empty(store);
    for path in changeset.written() {
        options.cancel.check()?;
        let entry =
            resolve(store, new, path)?.ok_or_else(|| DiffError::PathNotFound(path.to_string()))?;
        debug!(path, "layer entry");
        editor.put(path, entry)?;
    }
    let layer = editor.finish()?;
    info!(paths = changeset.added().len() + changeset.modified().len(), layer = %layer.short_hex(), "layer built");
    Ok(layer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{contents, snapshot};
    use crate::tree_diff::diff;
    use strata_store::{walk, InMemoryObjectStore};

    #[test]
    fn layer_holds_only_changed_paths() {
        let store = InMemoryObjectStore::new();
        let old = snapshot(
            &store,
            &[("same.txt", "s"), ("dir/changed.txt", "1"), ("gone.txt", "g")],
        );
        let new = snapshot(
            &store,
            &[("same.txt", "s"), ("dir/changed.txt", "2"), ("added/deep/f.txt", "f")],
        );
        let cs = diff(&store, &new, &old).unwrap();
        let layer = build_layer(&store, &cs, &new).unwrap();
        let paths: Vec<String> = contents(&store, &layer).into_keys().collect();
        assert_eq!(
            paths,
            ["added/", "added/deep/", "added/deep/f.txt", "dir/", "dir/changed.txt"]
        );
    }

    #[test]
    fn added_directory_shares_subtree() {
        let store = InMemoryObjectStore::new();
        let old = snapshot(&store, &[("a", "a")]);
        let new = snapshot(&store, &[("a", "a"), ("pkg/x", "x"), ("pkg/y", "y")]);
        let cs = diff(&store, &new, &old).unwrap();
        let layer = build_layer(&store, &cs, &new).unwrap();
        let in_new = resolve(&store, &new, "pkg").unwrap().unwrap();
        let in_layer = resolve(&store, &layer, "pkg").unwrap().unwrap();
        assert_eq!(in_new.object_id, in_layer.object_id);
    }

    #[test]
    fn empty_changeset_gives_empty_layer() {
        let store = InMemoryObjectStore::new();
        let x = snapshot(&store, &[("a", "a")]);
        let cs = diff(&store, &x, &x).unwrap();
        let layer = build_layer(&store, &cs, &x).unwrap();
        assert!(walk(&store, &layer).unwrap().is_empty());
    }

    #[test]
    fn path_missing_from_new_fails() {
        let store = InMemoryObjectStore::new();
        let new = snapshot(&store, &[("a", "a")]);
        let cs = Changeset::new(vec!["ghost.txt".into()], vec![], vec![]);
        assert!(matches!(
            build_layer(&store, &cs, &new),
            Err(DiffError::PathNotFound(p)) if p == "ghost.txt"
        ));
    }

    #[test]
    fn cancelled_layer_fails() {
        let store = InMemoryObjectStore::new();
        let old = snapshot(&store, &[]);
        let new = snapshot(&store, &[("a", "a")]);
        let cs = diff(&store, &new, &old).unwrap();
        let opts = EngineOptions::default();
        opts.cancel.cancel();
        assert!(matches!(
            build_layer_with(&store, &cs, &new, &opts),
            Err(DiffError::Cancelled)
        ));
    }
}
