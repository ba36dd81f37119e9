//! The three-way partition of paths between two snapshots.

use serde::{Deserialize, Serialize};

/// Kind of change recorded for a path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Modified => write!(f, "modified"),
            Self::Removed => write!(f, "removed"),
        }
    }
}

/// Paths added, removed and modified between an old and a new snapshot.
///
/// Each list is sorted and free of duplicates. Directories appear only in
/// `added`/`removed`, in trailing-slash form, and only at the highest level:
/// a wholly added `"dir/"` never has its descendants listed as well.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changeset {
    added: Vec<String>,
    removed: Vec<String>,
    modified: Vec<String>,
}

impl Changeset {
    /// Build a changeset, sorting and deduplicating each list.
    pub fn new(added: Vec<String>, removed: Vec<String>, modified: Vec<String>) -> Self {
        fn normalize(mut paths: Vec<String>) -> Vec<String> {
            paths.sort();
            paths.dedup();
            paths
        }
        Self {
            added: normalize(added),
            removed: normalize(removed),
            modified: normalize(modified),
        }
    }

    pub fn added(&self) -> &[String] {
        &self.added
    }

    pub fn removed(&self) -> &[String] {
        &self.removed
    }

    pub fn modified(&self) -> &[String] {
        &self.modified
    }

    /// Returns `true` if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    /// Total number of recorded paths.
    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }

    /// Every recorded path with its kind, sorted by path.
    pub fn all_paths(&self) -> Vec<(&str, ChangeKind)> {
        let mut all: Vec<(&str, ChangeKind)> = self
            .added
            .iter()
            .map(|p| (p.as_str(), ChangeKind::Added))
            .chain(self.removed.iter().map(|p| (p.as_str(), ChangeKind::Removed)))
            .chain(self.modified.iter().map(|p| (p.as_str(), ChangeKind::Modified)))
            .collect();
        all.sort();
        all
    }

    /// How `path` changed, if at all. Exact match only.
    pub fn kind_of(&self, path: &str) -> Option<ChangeKind> {
        let has = |list: &[String]| list.binary_search_by(|p| p.as_str().cmp(path)).is_ok();
        if has(&self.added) {
            Some(ChangeKind::Added)
        } else if has(&self.removed) {
            Some(ChangeKind::Removed)
        } else if has(&self.modified) {
            Some(ChangeKind::Modified)
        } else {
            None
        }
    }

    /// Paths to write when applying: `added` and `modified`, sorted.
    pub fn written(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self
            .added
            .iter()
            .chain(self.modified.iter())
            .map(String::as_str)
            .collect();
        paths.sort_unstable();
        paths
    }
}

impl std::fmt::Display for Changeset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} added, {} removed, {} modified",
            self.added.len(),
            self.removed.len(),
            self.modified.len()
        )
    }
}
