//! Slash-separated snapshot paths.
//!
//! Paths are relative to a snapshot root and never carry a leading slash.
//! Directories are *reported* with a trailing slash (`"dir/"`) so callers can
//! tell them apart from files, but are *looked up* without one; every helper
//! here accepts either form.
//!
//! Rules enforced by [`validate_path`]:
//! - Components must not be `.` or `..`
//! - Components must not contain NUL
//! - Repeated or leading/trailing slashes are tolerated and ignored

use crate::error::PathError;

/// Split a path into its non-empty components.
pub fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|c| !c.is_empty()).collect()
}

/// Join a parent path and a child name. An empty parent means the root.
pub fn join_path(parent: &str, name: &str) -> String {
    let parent = trim_dir_suffix(parent);
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// Returns `true` if the path is in reported-directory form (`"dir/"`).
pub fn is_dir_path(path: &str) -> bool {
    path.ends_with('/')
}

/// Strip the trailing slash of a reported directory path.
pub fn trim_dir_suffix(path: &str) -> &str {
    path.trim_end_matches('/')
}

/// Render a path in reported-directory form.
pub fn dir_path(path: &str) -> String {
    format!("{}/", trim_dir_suffix(path))
}

/// Number of components; the root has depth zero.
pub fn depth(path: &str) -> usize {
    split_path(path).len()
}

/// Returns `true` if `path` lies strictly below `ancestor`.
///
/// ```
/// use strata_types::path::is_descendant;
///
/// assert!(is_descendant("dir/sub/file.txt", "dir/"));
/// assert!(!is_descendant("dir", "dir/"));
/// assert!(!is_descendant("dirt/file", "dir"));
/// ```
pub fn is_descendant(path: &str, ancestor: &str) -> bool {
    let ancestor = trim_dir_suffix(ancestor);
    if ancestor.is_empty() {
        return !trim_dir_suffix(path).is_empty();
    }
    path.len() > ancestor.len() + 1
        && path.starts_with(ancestor)
        && path.as_bytes()[ancestor.len()] == b'/'
}

/// Validate every component of a path.
pub fn validate_path(path: &str) -> Result<(), PathError> {
    for component in split_path(path) {
        if component == "." || component == ".." || component.contains('\0') {
            return Err(PathError::InvalidComponent {
                path: path.to_string(),
                component: component.to_string(),
            });
        }
    }
    Ok(())
}

/// Validate a path that must name something below the root.
///
/// Returns the path without its trailing slash.
pub fn require_non_root(path: &str) -> Result<&str, PathError> {
    validate_path(path)?;
    let trimmed = trim_dir_suffix(path.trim_start_matches('/'));
    if trimmed.is_empty() {
        return Err(PathError::EmptyPath);
    }
    Ok(trimmed)
}
