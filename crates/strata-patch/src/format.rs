//! In-memory form of a patch and its text grammar.
//!
//! ```text
//! strata-patch 1
//! - "removed.txt"
//! + "added.txt" 100644 <size> <mtime_ns> <blob-hex>
//! + "empty-dir/" 040000
//! ~ "changed.sh" 100755 <size> <mtime_ns> <blob-hex>
//! @ <blob-hex> <raw-len>
//! <hex of zstd-compressed content, wrapped>
//! end <checksum-hex>
//! ```
//!
//! Paths are JSON string literals. Removals come first, then writes, each
//! group sorted by path. Every referenced blob is embedded once. The trailer
//! checksum covers every byte before the `end` line.

use std::collections::BTreeMap;
use std::fmt;

use strata_diff::{ApplyPlan, ApplyWrite, ChangeKind};
use strata_store::{Blob, ObjectStore, SnapshotStore, StoreError, Tree, TreeEntry};
use strata_types::ObjectId;
use tracing::debug;

use crate::error::PatchResult;

/// First line of every patch.
pub const HEADER: &str = "strata-patch 1";
/// Hex characters per blob data line.
pub const LINE_WIDTH: usize = 120;
/// zstd level used when none is configured.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// One change record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Record {
    /// `- "path"`
    Remove { path: String },
    /// `+ "path" ...` (added) or `~ "path" ...` (modified).
    Write {
        path: String,
        kind: ChangeKind,
        entry: TreeEntry,
    },
}

impl Record {
    pub fn path(&self) -> &str {
        match self {
            Self::Remove { path } | Self::Write { path, .. } => path,
        }
    }

    pub fn tag(&self) -> char {
        match self {
            Self::Remove { .. } => '-',
            Self::Write {
                kind: ChangeKind::Modified,
                ..
            } => '~',
            Self::Write { .. } => '+',
        }
    }
}

/// Renders the record line exactly as it appears in a patch.
impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quoted = serde_json::to_string(self.path()).map_err(|_| fmt::Error)?;
        write!(f, "{} {quoted}", self.tag())?;
        if let Self::Write { entry, .. } = self {
            write!(f, " {}", entry.mode)?;
            if !entry.is_dir() {
                write!(f, " {} {} {}", entry.size, entry.mtime_ns, entry.object_id)?;
            }
        }
        Ok(())
    }
}

/// Counts of what a patch contains.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PatchSummary {
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
    pub blobs: usize,
    /// Uncompressed bytes across all embedded blobs.
    pub blob_bytes: u64,
}

impl fmt::Display for PatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} added, {} modified, {} removed ({} blobs, {} bytes)",
            self.added, self.modified, self.removed, self.blobs, self.blob_bytes
        )
    }
}

/// A decoded or about-to-be-encoded patch: records plus embedded content.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Patch {
    pub(crate) records: Vec<Record>,
    pub(crate) blobs: BTreeMap<ObjectId, Vec<u8>>,
}

/// Id of the empty directory tree, which every store shares.
pub(crate) fn empty_tree_id() -> PatchResult<ObjectId> {
    Ok(Tree::empty().to_stored_object()?.compute_id())
}

impl Patch {
    /// Capture `plan` with the content it writes read from `store`.
    ///
    /// Directory writes are expanded to file-level records plus one record
    /// per directory that must exist empty (including each added directory
    /// itself, so it still replaces what the base has there).
    pub fn from_plan(store: &dyn ObjectStore, plan: &ApplyPlan) -> PatchResult<Self> {
        let plan = plan.expanded(store)?;
        let mut records: Vec<Record> = plan
            .removed()
            .iter()
            .map(|path| Record::Remove { path: path.clone() })
            .collect();
        let mut writes: Vec<&ApplyWrite> = plan.writes().iter().collect();
        writes.sort_by(|a, b| a.path.cmp(&b.path));

        let mut blobs = BTreeMap::new();
        for write in writes {
            if !write.entry.is_dir() && !blobs.contains_key(&write.entry.object_id) {
                let data = store.read_file(&write.entry.object_id)?;
                blobs.insert(write.entry.object_id, data);
            }
            records.push(Record::Write {
                path: write.path.clone(),
                kind: write.kind,
                entry: write.entry.clone(),
            });
        }
        debug!(records = records.len(), blobs = blobs.len(), "patch captured");
        Ok(Self { records, blobs })
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Embedded content by blob id.
    pub fn blob(&self, id: &ObjectId) -> Option<&[u8]> {
        self.blobs.get(id).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn summary(&self) -> PatchSummary {
        let mut summary = PatchSummary {
            blobs: self.blobs.len(),
            blob_bytes: self.blobs.values().map(|b| b.len() as u64).sum(),
            ..PatchSummary::default()
        };
        for record in &self.records {
            match record {
                Record::Remove { .. } => summary.removed += 1,
                Record::Write {
                    kind: ChangeKind::Modified,
                    ..
                } => summary.modified += 1,
                Record::Write { .. } => summary.added += 1,
            }
        }
        summary
    }

    /// Store the embedded content in `store` and return the apply plan.
    pub fn into_plan(self, store: &dyn ObjectStore) -> PatchResult<ApplyPlan> {
        for (id, data) in self.blobs {
            let written = store.write(&Blob::new(data).to_stored_object())?;
            if written != id {
                return Err(StoreError::CorruptObject {
                    id,
                    reason: format!("stored as {written}"),
                }
                .into());
            }
        }
        let mut removed = Vec::new();
        let mut writes = Vec::new();
        for record in self.records {
            match record {
                Record::Remove { path } => removed.push(path),
                Record::Write { path, kind, entry } => {
                    if entry.is_dir() {
                        store.empty_dir()?;
                    }
                    writes.push(ApplyWrite { path, kind, entry });
                }
            }
        }
        Ok(ApplyPlan::new(removed, writes))
    }
}
