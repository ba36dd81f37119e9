use std::fmt::Write as _;

use strata_crypto::ContentHasher;
use strata_diff::{ApplyPlan, Changeset};
use strata_store::ObjectStore;
use strata_types::ObjectId;
use tracing::info;

use crate::error::{PatchError, PatchResult};
use crate::format::{Patch, HEADER, LINE_WIDTH};

impl Patch {
    /// Render the patch text, compressing blobs at `compression_level`.
    pub fn encode(&self, compression_level: i32) -> PatchResult<String> {
        let mut out = String::new();
        out.push_str(HEADER);
        out.push('\n');
        for record in &self.records {
            // Writing to a String cannot fail.
            let _ = writeln!(out, "{record}");
        }
        for (id, data) in &self.blobs {
            let compressed = zstd::encode_all(data.as_slice(), compression_level)
                .map_err(|e| PatchError::Compression(e.to_string()))?;
            let _ = writeln!(out, "@ {id} {}", data.len());
            let encoded = hex::encode(compressed);
            for chunk in encoded.as_bytes().chunks(LINE_WIDTH) {
                out.push_str(&String::from_utf8_lossy(chunk));
                out.push('\n');
            }
        }
        let checksum = ContentHasher::PATCH.hash(out.as_bytes());
        let _ = writeln!(out, "end {checksum}");

        let summary = self.summary();
        info!(
            added = summary.added,
            modified = summary.modified,
            removed = summary.removed,
            bytes = out.len(),
            "patch encoded"
        );
        Ok(out)
    }
}

/// Encode the changes from `old` to `new` as patch text.
pub fn encode_changeset(
    store: &dyn ObjectStore,
    changeset: &Changeset,
    new: &ObjectId,
    compression_level: i32,
) -> PatchResult<String> {
    let plan = ApplyPlan::from_changeset(store, changeset, new)?;
    Patch::from_plan(store, &plan)?.encode(compression_level)
}
