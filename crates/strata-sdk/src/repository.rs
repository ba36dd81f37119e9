use std::sync::Arc;

use strata_diff::{
    apply_changes_with, apply_plan, build_layer_with, check_conflicts, diff_with, merge,
    merge_many, scope, ApplySummary, CancelToken, Changeset, Conflicts, EngineOptions, LineDiff,
    MergeStrategy, SnapshotPair,
};
use strata_patch::{encode_changeset, Patch};
use strata_store::{resolve, walk, InMemoryObjectStore, ObjectStore, SnapshotStore, TreeEditor, TreeEntry};
use strata_types::ObjectId;
use tracing::{debug, info};

use crate::builder::SnapshotBuilder;
use crate::config::EngineConfig;
use crate::error::{SdkError, SdkResult};

/// High-level strata API over one object store.
///
/// Snapshots are root tree ids in that store. Every operation returns new
/// ids and leaves its inputs untouched.
pub struct Strata {
    store: Arc<dyn ObjectStore>,
    config: EngineConfig,
    cancel: CancelToken,
}

impl Strata {
    /// An engine over a fresh in-memory store.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_store(Arc::new(InMemoryObjectStore::new()), config)
    }

    pub fn with_store(store: Arc<dyn ObjectStore>, config: EngineConfig) -> Self {
        Self {
            store,
            config,
            cancel: CancelToken::new(),
        }
    }

    // ---- Diff ----

    /// Changes leading from `old` to `new`.
    pub fn diff(&self, new: &ObjectId, old: &ObjectId) -> SdkResult<Changeset> {
        Ok(diff_with(self.store(), new, old, &self.options())?)
    }

    pub fn added_paths<'c>(&self, cs: &'c Changeset) -> &'c [String] {
        cs.added()
    }

    pub fn removed_paths<'c>(&self, cs: &'c Changeset) -> &'c [String] {
        cs.removed()
    }

    pub fn modified_paths<'c>(&self, cs: &'c Changeset) -> &'c [String] {
        cs.modified()
    }

    pub fn is_empty(&self, cs: &Changeset) -> bool {
        cs.is_empty()
    }

    /// Line-level view of a file at `path` in two snapshots.
    ///
    /// A side that lacks the file counts as empty.
    pub fn line_diff(&self, new: &ObjectId, old: &ObjectId, path: &str) -> SdkResult<LineDiff> {
        let before = self.file_or_empty(old, path)?;
        let after = self.file_or_empty(new, path)?;
        Ok(LineDiff::compute(path, &before, &after))
    }

    // ---- Layer and patch ----

    /// Sparse snapshot holding only what `cs` adds or modifies.
    pub fn layer(&self, cs: &Changeset, new: &ObjectId) -> SdkResult<ObjectId> {
        Ok(build_layer_with(self.store(), cs, new, &self.options())?)
    }

    /// Encode `cs` with its content from `new` as portable patch text.
    pub fn as_patch(&self, cs: &Changeset, new: &ObjectId) -> SdkResult<Vec<u8>> {
        self.cancel.check()?;
        let text = encode_changeset(self.store(), cs, new, self.config.compression_level)?;
        Ok(text.into_bytes())
    }

    pub fn from_patch(&self, bytes: &[u8]) -> SdkResult<Patch> {
        self.cancel.check()?;
        Ok(Patch::decode_bytes(bytes)?)
    }

    // ---- Apply ----

    /// Apply `cs`, with content from `new`, onto `base`.
    pub fn apply_changes(
        &self,
        base: &ObjectId,
        cs: &Changeset,
        new: &ObjectId,
    ) -> SdkResult<ObjectId> {
        Ok(apply_changes_with(self.store(), base, cs, new, &self.options())?)
    }

    /// Apply a decoded patch onto `base`, storing its embedded content first.
    pub fn apply_patch(&self, base: &ObjectId, patch: Patch) -> SdkResult<ApplySummary> {
        let plan = patch.into_plan(self.store())?;
        Ok(apply_plan(self.store(), base, &plan, &self.options())?)
    }

    // ---- Merge ----

    pub fn conflicts(&self, ours: &Changeset, theirs: &Changeset) -> Conflicts {
        check_conflicts(ours, theirs)
    }

    pub fn merge(
        &self,
        ours: &SnapshotPair,
        theirs: &SnapshotPair,
        strategy: MergeStrategy,
    ) -> SdkResult<SnapshotPair> {
        Ok(merge(self.store(), ours, theirs, strategy, &self.options())?)
    }

    pub fn merge_many(
        &self,
        first: &SnapshotPair,
        others: &[SnapshotPair],
        strategy: MergeStrategy,
    ) -> SdkResult<SnapshotPair> {
        Ok(merge_many(self.store(), first, others, strategy, &self.options())?)
    }

    // ---- Snapshots ----

    /// Write a described snapshot, honouring `normalize_mtime`.
    pub fn build(&self, builder: &SnapshotBuilder) -> SdkResult<ObjectId> {
        builder.build(self.store(), self.config.normalize_mtime)
    }

    /// The sub-snapshot rooted at a non-root directory `path`.
    pub fn directory(&self, root: &ObjectId, path: &str) -> SdkResult<ObjectId> {
        Ok(scope(self.store(), root, path)?)
    }

    /// Every path in the snapshot, sorted; directories end in `/`.
    pub fn entries(&self, root: &ObjectId) -> SdkResult<Vec<(String, TreeEntry)>> {
        Ok(walk(self.store(), root)?)
    }

    pub fn file_contents(&self, root: &ObjectId, path: &str) -> SdkResult<Vec<u8>> {
        let entry = resolve(self.store(), root, path)?
            .ok_or_else(|| SdkError::NotFound(path.to_string()))?;
        if entry.is_dir() {
            return Err(SdkError::NotAFile(path.to_string()));
        }
        Ok(self.store().read_file(&entry.object_id)?)
    }

    /// The same snapshot with every modification time zeroed.
    pub fn normalize_mtimes(&self, root: &ObjectId) -> SdkResult<ObjectId> {
        let mut editor = TreeEditor::open(self.store(), root)?;
        let mut touched = 0usize;
        for (path, entry) in walk(self.store(), root)? {
            if !entry.is_dir() && entry.mtime_ns != 0 {
                editor.put(&path, entry.without_mtime())?;
                touched += 1;
            }
        }
        if touched == 0 {
            return Ok(*root);
        }
        let normalized = editor.finish()?;
        info!(touched, root = %normalized.short_hex(), "modification times normalized");
        Ok(normalized)
    }

    // ---- Accessors ----

    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Token that cancels every in-flight and future operation of this engine.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn options(&self) -> EngineOptions {
        self.config.engine_options().with_cancel(self.cancel.clone())
    }

    fn file_or_empty(&self, root: &ObjectId, path: &str) -> SdkResult<Vec<u8>> {
        match resolve(self.store(), root, path)? {
            Some(entry) if !entry.is_dir() => Ok(self.store().read_file(&entry.object_id)?),
            Some(_) => Err(SdkError::NotAFile(path.to_string())),
            None => {
                debug!(path, "file absent, diffing against empty");
                Ok(Vec::new())
            }
        }
    }
}

impl Default for Strata {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
