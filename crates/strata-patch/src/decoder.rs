use std::collections::{BTreeMap, HashSet};

use strata_crypto::ContentHasher;
use strata_diff::ChangeKind;
use strata_store::{EntryMode, TreeEntry};
use strata_types::path::{is_dir_path, split_path, validate_path};
use strata_types::ObjectId;
use tracing::debug;

use crate::error::{PatchError, PatchResult};
use crate::format::{empty_tree_id, Patch, Record, HEADER};

/// A blob section before its content is checked.
struct Section {
    line: usize,
    id: ObjectId,
    raw_len: usize,
    hex: String,
}

impl Patch {
    /// Parse and verify patch text.
    ///
    /// Every structural problem, checksum mismatch or corrupt blob is
    /// reported as [`PatchError::Format`] with the offending line.
    pub fn decode(text: &str) -> PatchResult<Self> {
        let (body, trailer, trailer_line) = split_trailer(text)?;
        let expected = parse_trailer(trailer, trailer_line)?;
        if !ContentHasher::PATCH.verify(body.as_bytes(), &expected) {
            return Err(PatchError::format(trailer_line, "checksum mismatch"));
        }

        let mut lines = body.lines().enumerate().map(|(i, l)| (i + 1, l));
        match lines.next() {
            Some((_, HEADER)) => {}
            Some((n, line)) if line.starts_with("strata-patch ") => {
                return Err(PatchError::format(n, format!("unsupported version {line:?}")));
            }
            _ => return Err(PatchError::format(1, format!("expected {HEADER:?}"))),
        }

        let mut records = Vec::new();
        let mut record_lines = Vec::new();
        let mut sections: Vec<Section> = Vec::new();
        for (n, line) in lines {
            if let Some(rest) = line.strip_prefix("@ ") {
                sections.push(parse_section_header(rest, n)?);
            } else if let Some(section) = sections.last_mut() {
                if line.starts_with(['-', '+', '~']) {
                    return Err(PatchError::format(n, "change record after blob data"));
                }
                if line.is_empty() || !line.bytes().all(|b| b.is_ascii_hexdigit()) {
                    return Err(PatchError::format(n, "expected blob data"));
                }
                section.hex.push_str(line);
            } else {
                records.push(parse_record(line, n)?);
                record_lines.push(n);
            }
        }

        let blobs = decode_sections(sections)?;
        let records = link_records(records, &record_lines, &blobs)?;
        debug!(records = records.len(), blobs = blobs.len(), "patch decoded");
        Ok(Self { records, blobs })
    }

    /// Parse patch bytes, which must be UTF-8.
    pub fn decode_bytes(bytes: &[u8]) -> PatchResult<Self> {
        match std::str::from_utf8(bytes) {
            Ok(text) => Self::decode(text),
            Err(e) => {
                let line = bytes[..e.valid_up_to()].iter().filter(|&&b| b == b'\n').count() + 1;
                Err(PatchError::format(line, "patch is not valid UTF-8"))
            }
        }
    }
}

/// Split off the `end` line: (checked body, trailer, trailer line number).
fn split_trailer(text: &str) -> PatchResult<(&str, &str, usize)> {
    let trimmed = text.strip_suffix('\n').unwrap_or(text);
    let Some(idx) = trimmed.rfind('\n') else {
        return Err(PatchError::format(1, "missing trailer"));
    };
    let body = &trimmed[..=idx];
    let trailer_line = body.lines().count() + 1;
    Ok((body, &trimmed[idx + 1..], trailer_line))
}

fn parse_trailer(trailer: &str, line: usize) -> PatchResult<ObjectId> {
    let hex = trailer
        .strip_prefix("end ")
        .ok_or_else(|| PatchError::format(line, "missing trailer"))?;
    ObjectId::from_hex(hex).map_err(|e| PatchError::format(line, format!("bad checksum: {e}")))
}

fn parse_section_header(rest: &str, line: usize) -> PatchResult<Section> {
    let mut fields = rest.split(' ');
    let (Some(id), Some(raw_len), None) = (fields.next(), fields.next(), fields.next()) else {
        return Err(PatchError::format(line, "expected `@ <blob> <length>`"));
    };
    Ok(Section {
        line,
        id: ObjectId::from_hex(id).map_err(|e| PatchError::format(line, format!("bad blob id: {e}")))?,
        raw_len: raw_len
            .parse()
            .map_err(|_| PatchError::format(line, format!("bad blob length {raw_len:?}")))?,
        hex: String::new(),
    })
}

fn parse_record(line: &str, n: usize) -> PatchResult<Record> {
    let mut chars = line.chars();
    let tag = chars.next();
    let rest = chars
        .as_str()
        .strip_prefix(' ')
        .ok_or_else(|| PatchError::format(n, "expected a change record"))?;
    let kind = match tag {
        Some('-') => None,
        Some('+') => Some(ChangeKind::Added),
        Some('~') => Some(ChangeKind::Modified),
        _ => return Err(PatchError::format(n, format!("unknown record tag in {line:?}"))),
    };

    let mut stream = serde_json::Deserializer::from_str(rest).into_iter::<String>();
    let path = match stream.next() {
        Some(Ok(path)) => path,
        _ => return Err(PatchError::format(n, "expected a quoted path")),
    };
    let tail = &rest[stream.byte_offset()..];
    validate_path(&path).map_err(|e| PatchError::format(n, e.to_string()))?;
    let Some(name) = split_path(&path).last().map(|s| s.to_string()) else {
        return Err(PatchError::format(n, "path names the root"));
    };

    let Some(kind) = kind else {
        if !tail.is_empty() {
            return Err(PatchError::format(n, "unexpected fields after removal"));
        }
        return Ok(Record::Remove { path });
    };

    let fields: Vec<&str> = match tail.strip_prefix(' ') {
        Some(fields) => fields.split(' ').collect(),
        None => return Err(PatchError::format(n, "missing mode")),
    };
    let mode = u32::from_str_radix(fields[0], 8)
        .ok()
        .and_then(EntryMode::from_mode_bits)
        .ok_or_else(|| PatchError::format(n, format!("bad mode {:?}", fields[0])))?;

    if mode.is_dir() != is_dir_path(&path) {
        return Err(PatchError::format(
            n,
            "directory paths end in '/' and only directories do",
        ));
    }
    if mode.is_dir() {
        if kind == ChangeKind::Modified {
            return Err(PatchError::format(n, "directories are only ever added"));
        }
        if fields.len() != 1 {
            return Err(PatchError::format(n, "unexpected fields after directory mode"));
        }
        return Ok(Record::Write {
            path,
            kind,
            entry: TreeEntry::directory(name, empty_tree_id()?),
        });
    }

    let &[_, size, mtime, blob] = fields.as_slice() else {
        return Err(PatchError::format(n, "expected `<mode> <size> <mtime> <blob>`"));
    };
    let mut entry = TreeEntry::new(
        mode,
        name,
        ObjectId::from_hex(blob).map_err(|e| PatchError::format(n, format!("bad blob id: {e}")))?,
    );
    entry.size = size
        .parse()
        .map_err(|_| PatchError::format(n, format!("bad size {size:?}")))?;
    entry.mtime_ns = mtime
        .parse()
        .map_err(|_| PatchError::format(n, format!("bad mtime {mtime:?}")))?;
    Ok(Record::Write { path, kind, entry })
}

fn decode_sections(sections: Vec<Section>) -> PatchResult<BTreeMap<ObjectId, Vec<u8>>> {
    let mut blobs = BTreeMap::new();
    for section in sections {
        let line = section.line;
        if blobs.contains_key(&section.id) {
            return Err(PatchError::format(line, format!("duplicate blob {}", section.id)));
        }
        let compressed = hex::decode(&section.hex)
            .map_err(|e| PatchError::format(line, format!("bad blob data: {e}")))?;
        let data = zstd::decode_all(compressed.as_slice())
            .map_err(|e| PatchError::format(line, format!("bad blob data: {e}")))?;
        if data.len() != section.raw_len {
            return Err(PatchError::format(
                line,
                format!("blob is {} bytes, header says {}", data.len(), section.raw_len),
            ));
        }
        if !ContentHasher::BLOB.verify(&data, &section.id) {
            return Err(PatchError::format(line, format!("blob {} does not match its content", section.id)));
        }
        blobs.insert(section.id, data);
    }
    Ok(blobs)
}

/// Check records against blobs and fill in symlink targets.
fn link_records(
    mut records: Vec<Record>,
    lines: &[usize],
    blobs: &BTreeMap<ObjectId, Vec<u8>>,
) -> PatchResult<Vec<Record>> {
    let mut removed = HashSet::new();
    let mut written = HashSet::new();
    let mut referenced = HashSet::new();
    for (record, &n) in records.iter_mut().zip(lines) {
        match record {
            Record::Remove { path } => {
                if !written.is_empty() {
                    return Err(PatchError::format(n, "removal after writes"));
                }
                if !removed.insert(path.clone()) {
                    return Err(PatchError::format(n, format!("duplicate removal of {path:?}")));
                }
            }
            Record::Write { path, entry, .. } => {
                if !written.insert(path.clone()) {
                    return Err(PatchError::format(n, format!("duplicate write of {path:?}")));
                }
                if entry.is_dir() {
                    continue;
                }
                let data = blobs
                    .get(&entry.object_id)
                    .ok_or_else(|| PatchError::format(n, format!("missing blob {}", entry.object_id)))?;
                if data.len() as u64 != entry.size {
                    return Err(PatchError::format(
                        n,
                        format!("size {} does not match blob length {}", entry.size, data.len()),
                    ));
                }
                if entry.mode == EntryMode::Symlink {
                    let target = std::str::from_utf8(data)
                        .map_err(|_| PatchError::format(n, "symlink target is not UTF-8"))?;
                    entry.link_target = Some(target.to_string());
                }
                referenced.insert(entry.object_id);
            }
        }
    }
    if let Some(unused) = blobs.keys().find(|id| !referenced.contains(*id)) {
        return Err(PatchError::format(
            lines.last().map_or(1, |n| n + 1),
            format!("blob {unused} is not referenced"),
        ));
    }
    Ok(records)
}
