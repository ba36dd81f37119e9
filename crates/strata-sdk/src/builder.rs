use strata_store::{FileMeta, ObjectStore, SnapshotStore, TreeEditor, TreeEntry};
use strata_types::ObjectId;
use tracing::debug;

use crate::error::SdkResult;

#[derive(Clone, Debug)]
enum Step {
    File { data: Vec<u8>, meta: FileMeta },
    Directory,
    Remove,
}

/// Describes a snapshot as edits on top of a base (or the empty tree).
///
/// Steps apply in the order they were added, so a later step at the same
/// path wins. Nothing touches the store until [`build`](Self::build).
#[derive(Clone, Debug, Default)]
pub struct SnapshotBuilder {
    base: Option<ObjectId>,
    steps: Vec<(String, Step)>,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing snapshot instead of the empty tree.
    pub fn on(base: ObjectId) -> Self {
        Self {
            base: Some(base),
            steps: Vec::new(),
        }
    }

    pub fn with_new_file(self, path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.with_file(path, contents, FileMeta::default())
    }

    pub fn with_file(
        mut self,
        path: impl Into<String>,
        contents: impl Into<Vec<u8>>,
        meta: FileMeta,
    ) -> Self {
        self.steps.push((
            path.into(),
            Step::File {
                data: contents.into(),
                meta,
            },
        ));
        self
    }

    pub fn with_executable(self, path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        let meta = FileMeta {
            executable: true,
            ..FileMeta::default()
        };
        self.with_file(path, contents, meta)
    }

    pub fn with_symlink(self, path: impl Into<String>, target: impl Into<String>) -> Self {
        let meta = FileMeta {
            link_target: Some(target.into()),
            ..FileMeta::default()
        };
        self.with_file(path, Vec::new(), meta)
    }

    /// An empty directory; replaces whatever is at `path`.
    pub fn with_new_directory(mut self, path: impl Into<String>) -> Self {
        self.steps.push((path.into(), Step::Directory));
        self
    }

    pub fn without(mut self, path: impl Into<String>) -> Self {
        self.steps.push((path.into(), Step::Remove));
        self
    }

    /// Write the snapshot to `store` and return its root id.
    ///
    /// With `normalize_mtime` every file written here gets mtime zero.
    pub fn build(&self, store: &dyn ObjectStore, normalize_mtime: bool) -> SdkResult<ObjectId> {
        let mut editor = match &self.base {
            Some(base) => TreeEditor::open(store, base)?,
            None => TreeEditor::empty(store),
        };
        for (path, step) in &self.steps {
            match step {
                Step::File { data, meta } => {
                    let mut meta = meta.clone();
                    if normalize_mtime {
                        meta.mtime_ns = 0;
                    }
                    let entry = store.create_file("", data, meta)?;
                    editor.put(path, entry)?;
                }
                Step::Directory => {
                    editor.put(path, TreeEntry::directory("", store.empty_dir()?))?;
                }
                Step::Remove => {
                    editor.remove(path)?;
                }
            }
        }
        let root = editor.finish()?;
        debug!(steps = self.steps.len(), root = %root.short_hex(), "snapshot built");
        Ok(root)
    }
}
