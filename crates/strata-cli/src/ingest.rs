//! Moving snapshots between host directories and the store.

use std::fs;
use std::path::{Component, Path};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use strata_sdk::{EntryMode, FileMeta, ObjectId, SnapshotBuilder, Strata};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Read the directory tree at `root` into a snapshot.
///
/// Symlinks are stored as links, never followed. The engine's
/// `normalize_mtime` setting decides whether timestamps are kept.
pub fn ingest(strata: &Strata, root: &Path) -> Result<ObjectId> {
    if !root.is_dir() {
        bail!("{} is not a directory", root.display());
    }
    let mut builder = SnapshotBuilder::new();
    let mut files = 0usize;
    for entry in WalkDir::new(root).follow_links(false).min_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
        let path = snapshot_path(root, entry.path())?;
        let file_type = entry.file_type();
        if file_type.is_dir() {
            builder = builder.with_new_directory(path);
        } else if file_type.is_symlink() {
            let target = fs::read_link(entry.path())?;
            let target = target
                .to_str()
                .with_context(|| format!("symlink target of {path} is not UTF-8"))?
                .to_string();
            let meta = FileMeta {
                mtime_ns: mtime_ns(&entry.path().symlink_metadata()?),
                link_target: Some(target),
                ..FileMeta::default()
            };
            builder = builder.with_file(path, Vec::new(), meta);
            files += 1;
        } else {
            let metadata = entry.metadata()?;
            let data = fs::read(entry.path())
                .with_context(|| format!("failed to read {}", entry.path().display()))?;
            let meta = FileMeta {
                executable: is_executable(&metadata),
                mtime_ns: mtime_ns(&metadata),
                link_target: None,
            };
            builder = builder.with_file(path, data, meta);
            files += 1;
        }
    }
    let snapshot = strata.build(&builder)?;
    info!(dir = %root.display(), files, snapshot = %snapshot.short_hex(), "ingested");
    Ok(snapshot)
}

/// Write snapshot `root` out as a new directory at `dest`.
///
/// `dest` must not exist, or be an empty directory. File timestamps are
/// restored unless the engine normalizes them.
pub fn export(strata: &Strata, root: &ObjectId, dest: &Path) -> Result<()> {
    if dest.exists() && fs::read_dir(dest)?.next().is_some() {
        bail!("{} already exists and is not empty", dest.display());
    }
    fs::create_dir_all(dest)?;
    let restore_mtime = !strata.config().normalize_mtime;
    for (path, entry) in strata.entries(root)? {
        let target = dest.join(&path);
        match entry.mode {
            EntryMode::Directory => fs::create_dir_all(&target)?,
            EntryMode::Symlink => {
                let link = entry.link_target.clone().unwrap_or_default();
                write_symlink(&link, &target)?;
            }
            EntryMode::Regular | EntryMode::Executable => {
                let data = strata.file_contents(root, &path)?;
                fs::write(&target, data)
                    .with_context(|| format!("failed to write {}", target.display()))?;
                if entry.mode == EntryMode::Executable {
                    set_executable(&target)?;
                }
                if restore_mtime {
                    let file = fs::File::options().write(true).open(&target)?;
                    file.set_modified(system_time(entry.mtime_ns))?;
                }
            }
        }
        debug!(path = %path, "exported");
    }
    Ok(())
}

/// Slash-separated path of `path` relative to `root`.
fn snapshot_path(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root)?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(
                part.to_str()
                    .with_context(|| format!("{} is not valid UTF-8", path.display()))?,
            ),
            other => bail!("unexpected path component {other:?} in {}", path.display()),
        }
    }
    Ok(parts.join("/"))
}

fn mtime_ns(metadata: &fs::Metadata) -> i64 {
    metadata.modified().map_or(0, unix_nanos)
}

/// Signed nanoseconds since the Unix epoch, saturating at the `i64` range.
fn unix_nanos(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_nanos()).unwrap_or(i64::MAX),
        Err(before) => i64::try_from(before.duration().as_nanos()).map_or(i64::MIN, |ns| -ns),
    }
}

fn system_time(ns: i64) -> SystemTime {
    let offset = Duration::from_nanos(ns.unsigned_abs());
    if ns < 0 {
        UNIX_EPOCH - offset
    } else {
        UNIX_EPOCH + offset
    }
}

#[cfg(unix)]
fn is_executable(metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &fs::Metadata) -> bool {
    false
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    fs::set_permissions(path, permissions)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn write_symlink(link: &str, target: &Path) -> Result<()> {
    std::os::unix::fs::symlink(link, target)?;
    Ok(())
}

#[cfg(not(unix))]
fn write_symlink(link: &str, target: &Path) -> Result<()> {
    fs::write(target, link)?;
    Ok(())
}
