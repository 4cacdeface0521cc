//! Typed metadata for directory entries.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::Path;
use std::time::SystemTime;

use protocol::{NodeKind, NodeRecord, FOLDER_TYPE};
use tracing::{debug, warn};

/// Entry names that are never listed, indexed or archived.
#[derive(Debug, Clone, Default)]
pub struct IgnoreList {
    names: HashSet<String>,
}

impl IgnoreList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Exact, case-sensitive match on the entry name.
    pub fn is_ignored(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

/// Stat result for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMetadata {
    /// Folder or file, after following symlinks.
    pub kind: NodeKind,
    /// Size in bytes (0 for folders).
    pub size: u64,
    /// Last modification time.
    pub modified: SystemTime,
    /// Whether the entry itself is a symbolic link.
    pub is_symlink: bool,
    /// Whether the (followed) entry is a regular file. False for folders,
    /// FIFOs, sockets, devices and dangling links.
    pub is_regular_file: bool,
}

impl EntryMetadata {
    /// Whether a recursive walk should descend into this entry.
    ///
    /// Symlinked folders are listed but not descended into.
    pub fn is_walkable_folder(&self) -> bool {
        self.kind.is_folder() && !self.is_symlink
    }

    /// A non-folder entry whose contents cannot be read as a plain file.
    ///
    /// Listings and snapshots show these as files; archives skip them since
    /// opening a FIFO blocks until a writer appears.
    pub fn is_special_file(&self) -> bool {
        !self.kind.is_folder() && !self.is_regular_file
    }

    /// Builds the record for an entry named `name` inside `parent_rel`.
    pub fn to_record(&self, parent_rel: &str, name: &str) -> NodeRecord {
        let rel_path = join_relative(parent_rel, name);
        NodeRecord {
            name: name.to_string(),
            kind: self.kind,
            type_tag: guess_type(name, self.kind),
            size: self.size,
            modified_at: modified_millis(self.modified),
            url: NodeRecord::url_for(&rel_path, self.kind),
            rel_path,
        }
    }
}

/// Stat a single entry.
///
/// Symlinks are followed; a dangling link is reported with the link's own
/// metadata as a file.
pub fn read_metadata(path: &Path) -> io::Result<EntryMetadata> {
    let link_meta = fs::symlink_metadata(path)?;
    let is_symlink = link_meta.file_type().is_symlink();

    let meta = if is_symlink {
        match fs::metadata(path) {
            Ok(target) => target,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = ?path, "Dangling symlink");
                link_meta
            }
            Err(e) => return Err(e),
        }
    } else {
        link_meta
    };

    let kind = if meta.is_dir() {
        NodeKind::Folder
    } else {
        NodeKind::File
    };

    Ok(EntryMetadata {
        kind,
        size: if kind.is_folder() { 0 } else { meta.len() },
        modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        is_symlink,
        is_regular_file: meta.is_file(),
    })
}

/// Read one directory level, skipping ignored names.
///
/// Entries with non UTF-8 names are skipped with a warning, and entries that
/// vanish between listing and stat are skipped silently. The result is
/// sorted with [`compare_entries`].
pub fn read_entries(dir: &Path, ignore: &IgnoreList) -> io::Result<Vec<(String, EntryMetadata)>> {
    let mut entries = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                warn!(dir = ?dir, name = ?raw, "Skipping entry with non UTF-8 name");
                continue;
            }
        };

        if ignore.is_ignored(&name) {
            continue;
        }

        match read_metadata(&entry.path()) {
            Ok(meta) => entries.push((name, meta)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        }
    }

    entries.sort_by(|(a_name, a), (b_name, b)| compare_entries(a.kind, a_name, b.kind, b_name));
    Ok(entries)
}

/// Sibling ordering: folders first, then names case-insensitively, with the
/// raw name as a tie-break so the order is total.
///
/// The tie-break is byte order, so `A.txt` sorts before `a.txt`. Locale
/// collation would put the lower-case name first.
pub fn compare_entries(a_kind: NodeKind, a_name: &str, b_kind: NodeKind, b_name: &str) -> Ordering {
    match (a_kind.is_folder(), b_kind.is_folder()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a_name
            .to_lowercase()
            .cmp(&b_name.to_lowercase())
            .then_with(|| a_name.cmp(b_name)),
    }
}

/// [`compare_entries`] applied to records.
pub fn compare_records(a: &NodeRecord, b: &NodeRecord) -> Ordering {
    compare_entries(a.kind, &a.name, b.kind, &b.name)
}

/// Content category for an entry name.
///
/// Folders are always `"folder"`. Files map their lower-cased extension to a
/// category; unknown extensions are returned as-is and names without an
/// extension become `"file"`.
pub fn guess_type(name: &str, kind: NodeKind) -> String {
    if kind.is_folder() {
        return FOLDER_TYPE.to_string();
    }

    let ext = match name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext.to_lowercase(),
        _ => return "file".to_string(),
    };

    let category = match ext.as_str() {
        "jpg" | "jpeg" | "png" | "gif" | "bmp" | "webp" | "svg" | "heic" | "tif" | "tiff"
        | "ico" => "image",
        "mp3" | "wav" | "flac" | "ogg" | "m4a" | "aac" | "opus" | "wma" => "audio",
        "mp4" | "mkv" | "mov" | "avi" | "webm" | "wmv" | "m4v" => "video",
        "pdf" => "pdf",
        "doc" | "docx" | "odt" | "rtf" | "pages" => "document",
        "xls" | "xlsx" | "ods" | "csv" => "spreadsheet",
        "ppt" | "pptx" | "odp" | "key" => "presentation",
        "txt" | "md" | "log" => "text",
        "zip" | "rar" | "7z" | "tar" | "gz" | "bz2" | "xz" => "archive",
        _ => return ext,
    };

    category.to_string()
}

/// `Content-Type` for serving a file by name.
pub fn content_type(name: &str) -> &'static str {
    let ext = match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_lowercase(),
        None => return "application/octet-stream",
    };

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "ogg" | "opus" => "audio/ogg",
        "m4a" => "audio/mp4",
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "pdf" => "application/pdf",
        "txt" | "log" => "text/plain; charset=utf-8",
        "md" => "text/markdown; charset=utf-8",
        "csv" => "text/csv; charset=utf-8",
        "json" => "application/json",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

/// Milliseconds since the Unix epoch, 0 for earlier times.
pub fn modified_millis(time: SystemTime) -> u64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Joins a child name onto a relative path.
pub fn join_relative(parent_rel: &str, name: &str) -> String {
    if parent_rel.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent_rel, name)
    }
}
