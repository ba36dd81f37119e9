//! Path-level conflicts between two change sets.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::changeset::{ChangeKind, Changeset};

/// Why two changes at the same path conflict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ConflictKind {
    AddedTwice,
    ModifiedTwice,
    ModifiedRemoved,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddedTwice => write!(f, "path added in both changesets"),
            Self::ModifiedTwice => write!(f, "path modified in both changesets"),
            Self::ModifiedRemoved => {
                write!(f, "path modified in one changeset and removed in the other")
            }
        }
    }
}

/// One conflicting path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub path: String,
    pub ours: ChangeKind,
    pub theirs: ChangeKind,
}

impl Conflict {
    pub fn new(path: impl Into<String>, ours: ChangeKind, theirs: ChangeKind) -> Self {
        Self {
            path: path.into(),
            ours,
            theirs,
        }
    }

    pub fn kind(&self) -> ConflictKind {
        match (self.ours, self.theirs) {
            (ChangeKind::Removed, _) | (_, ChangeKind::Removed) => ConflictKind::ModifiedRemoved,
            (ChangeKind::Added, ChangeKind::Added) => ConflictKind::AddedTwice,
            _ => ConflictKind::ModifiedTwice,
        }
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conflict at path {:?}: {}", self.path, self.kind())
    }
}

/// Every conflict found between two change sets, in discovery order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Conflicts(pub Vec<Conflict>);

impl Conflicts {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Conflict> {
        self.0.iter()
    }

    pub fn extend(&mut self, other: Conflicts) {
        self.0.extend(other.0);
    }
}

impl fmt::Display for Conflicts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for conflict in &self.0 {
            if !first {
                writeln!(f)?;
            }
            write!(f, "{conflict}")?;
            first = false;
        }
        Ok(())
    }
}

/// Paths both change sets touch incompatibly.
///
/// Added in both, modified in both, or modified in one and removed in the
/// other. Paths removed by both sides do not conflict.
pub fn check_conflicts(ours: &Changeset, theirs: &Changeset) -> Conflicts {
    fn set(paths: &[String]) -> HashSet<&str> {
        paths.iter().map(String::as_str).collect()
    }
    let (their_added, their_modified, their_removed) =
        (set(theirs.added()), set(theirs.modified()), set(theirs.removed()));

    let mut conflicts = Vec::new();
    for path in ours.added() {
        if their_added.contains(path.as_str()) {
            conflicts.push(Conflict::new(path, ChangeKind::Added, ChangeKind::Added));
        }
    }
    for path in ours.modified() {
        if their_modified.contains(path.as_str()) {
            conflicts.push(Conflict::new(path, ChangeKind::Modified, ChangeKind::Modified));
        } else if their_removed.contains(path.as_str()) {
            conflicts.push(Conflict::new(path, ChangeKind::Modified, ChangeKind::Removed));
        }
    }
    for path in ours.removed() {
        if their_modified.contains(path.as_str()) {
            conflicts.push(Conflict::new(path, ChangeKind::Removed, ChangeKind::Modified));
        }
    }
    Conflicts(conflicts)
}
