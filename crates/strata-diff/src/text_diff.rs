//! Line-level rendering of a modified file, for display only.
//!
//! Files are atomic in a changeset; this is what `diff --patch` prints for
//! text files so a reader can see what changed inside them.

use similar::{ChangeTag, TextDiff};

/// Lines of context around each hunk.
pub const CONTEXT_LINES: usize = 3;

/// Line-level comparison of two file versions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LineDiff {
    /// At least one side is not UTF-8 text or contains NUL bytes.
    Binary { old_len: usize, new_len: usize },
    Text {
        added: usize,
        removed: usize,
        /// Unified-format hunks (`@@ ... @@` headers and `+`/`-`/` ` lines).
        unified: String,
    },
}

impl LineDiff {
    /// Compare `old` and `new`, labelling the unified header with `path`.
    pub fn compute(path: &str, old: &[u8], new: &[u8]) -> Self {
        let (Some(old_text), Some(new_text)) = (as_text(old), as_text(new)) else {
            return Self::Binary {
                old_len: old.len(),
                new_len: new.len(),
            };
        };
        let diff = TextDiff::from_lines(old_text, new_text);
        let (mut added, mut removed) = (0, 0);
        for change in diff.iter_all_changes() {
            match change.tag() {
                ChangeTag::Insert => added += 1,
                ChangeTag::Delete => removed += 1,
                ChangeTag::Equal => {}
            }
        }
        let unified = diff
            .unified_diff()
            .context_radius(CONTEXT_LINES)
            .header(&format!("a/{path}"), &format!("b/{path}"))
            .to_string();
        Self::Text {
            added,
            removed,
            unified,
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary { .. })
    }

    /// `(added, removed)` line counts; zero for binary files.
    pub fn counts(&self) -> (usize, usize) {
        match self {
            Self::Binary { .. } => (0, 0),
            Self::Text { added, removed, .. } => (*added, *removed),
        }
    }
}

fn as_text(bytes: &[u8]) -> Option<&str> {
    std::str::from_utf8(bytes).ok().filter(|s| !s.contains('\0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_has_no_hunks() {
        let diff = LineDiff::compute("f", b"a\nb\n", b"a\nb\n");
        assert_eq!(diff.counts(), (0, 0));
        match diff {
            LineDiff::Text { unified, .. } => assert!(!unified.contains("@@")),
            LineDiff::Binary { .. } => panic!("text reported as binary"),
        }
    }

    #[test]
    fn replaced_line_counts_both_ways() {
        let diff = LineDiff::compute("file.txt", b"hello world\n", b"hello universe\n");
        assert_eq!(diff.counts(), (1, 1));
        let LineDiff::Text { unified, .. } = diff else {
            panic!("expected text diff");
        };
        assert!(unified.contains("--- a/file.txt"));
        assert!(unified.contains("+++ b/file.txt"));
        assert!(unified.contains("-hello world"));
        assert!(unified.contains("+hello universe"));
    }

    #[test]
    fn context_is_bounded() {
        let old: String = (0..20).map(|i| format!("line{i}\n")).collect();
        let new = old.replace("line10\n", "changed\n");
        let LineDiff::Text { unified, .. } = LineDiff::compute("f", old.as_bytes(), new.as_bytes())
        else {
            panic!("expected text diff");
        };
        assert!(unified.contains(" line7\n"));
        assert!(!unified.contains(" line6\n"));
        assert!(!unified.contains(" line14\n"));
    }

    #[test]
    fn nul_bytes_are_binary() {
        let diff = LineDiff::compute("bin", &[0, 1, 2], &[0, 1, 3]);
        assert!(diff.is_binary());
        assert_eq!(diff, LineDiff::Binary { old_len: 3, new_len: 3 });
        assert!(LineDiff::compute("bad", &[0xff, 0xfe], b"text").is_binary());
    }
}
