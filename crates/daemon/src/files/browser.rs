//! Directory browsing with path validation.
//!
//! This module provides the shallow, one-level listing used for interactive
//! browsing. The empty path lists the allowed roots without touching disk.

use std::fs;
use std::sync::Arc;

use protocol::{ListResponse, NodeKind, NodeRecord, FOLDER_TYPE};
use tracing::debug;

use super::error::{not_found_or_io, FileError};
use super::metadata::{content_type, read_entries, IgnoreList};
use super::sandbox::{PathRequirement, PathSandbox, ResolvedPath};

/// A regular file opened for download.
#[derive(Debug)]
pub struct OpenedFile {
    pub resolved: ResolvedPath,
    pub file: tokio::fs::File,
    pub size: u64,
    pub content_type: &'static str,
}

/// Shallow directory browser.
///
/// Cheap to clone; clones share the sandbox and ignore list.
#[derive(Debug, Clone)]
pub struct DirectoryBrowser {
    sandbox: Arc<PathSandbox>,
    ignore: Arc<IgnoreList>,
}

impl DirectoryBrowser {
    pub fn new(sandbox: Arc<PathSandbox>, ignore: Arc<IgnoreList>) -> Self {
        Self { sandbox, ignore }
    }

    /// List one directory level for a raw client path.
    pub fn list(&self, raw: &str) -> Result<ListResponse, FileError> {
        let resolved = self
            .sandbox
            .resolve(raw, PathRequirement::AllowVirtualRoot)?;

        if resolved.is_virtual_root() {
            return Ok(ListResponse {
                path: String::new(),
                items: self.virtual_root(),
            });
        }

        let items = self.list_resolved(&resolved)?;
        Ok(ListResponse {
            path: resolved.relative().to_string(),
            items,
        })
    }

    /// Same as [`list`](Self::list), on the blocking thread pool.
    pub async fn list_async(&self, raw: String) -> Result<ListResponse, FileError> {
        let browser = self.clone();
        tokio::task::spawn_blocking(move || browser.list(&raw))
            .await
            .map_err(|e| FileError::Io(std::io::Error::other(e)))?
    }

    pub fn allowed_roots(&self) -> &[String] {
        self.sandbox.allowed_roots()
    }

    /// Open a file for a raw client path.
    ///
    /// Only regular files are served. Folders, FIFOs, devices and names on
    /// the ignore list are all `NotFound`.
    pub async fn open_file(&self, raw: &str) -> Result<OpenedFile, FileError> {
        let resolved = self.sandbox.resolve(raw, PathRequirement::Concrete)?;

        if resolved
            .relative()
            .split('/')
            .any(|segment| self.ignore.is_ignored(segment))
        {
            return Err(FileError::NotFound);
        }

        let metadata = tokio::fs::metadata(resolved.absolute())
            .await
            .map_err(not_found_or_io)?;
        if !metadata.is_file() {
            return Err(FileError::NotFound);
        }

        let file = tokio::fs::File::open(resolved.absolute())
            .await
            .map_err(not_found_or_io)?;

        Ok(OpenedFile {
            content_type: content_type(resolved.last_segment().unwrap_or_default()),
            size: metadata.len(),
            file,
            resolved,
        })
    }

    /// The allowed roots as folder records, in configured order.
    ///
    /// Names are capitalized for display; `relPath` and `url` keep the root
    /// as configured.
    pub fn virtual_root(&self) -> Vec<NodeRecord> {
        self.sandbox
            .allowed_roots()
            .iter()
            .map(|root| NodeRecord {
                name: display_name(root),
                kind: NodeKind::Folder,
                type_tag: FOLDER_TYPE.to_string(),
                size: 0,
                modified_at: 0,
                rel_path: root.clone(),
                url: NodeRecord::url_for(root, NodeKind::Folder),
            })
            .collect()
    }

    fn list_resolved(&self, resolved: &ResolvedPath) -> Result<Vec<NodeRecord>, FileError> {
        let dir = resolved.absolute();

        let metadata = fs::metadata(dir).map_err(not_found_or_io)?;
        if !metadata.is_dir() {
            return Err(FileError::NotFound);
        }

        let entries = read_entries(dir, &self.ignore).map_err(not_found_or_io)?;
        debug!(path = resolved.relative(), count = entries.len(), "Listed directory");

        Ok(entries
            .iter()
            .map(|(name, meta)| meta.to_record(resolved.relative(), name))
            .collect())
    }
}

/// Upper-cases the first character of a root name.
fn display_name(root: &str) -> String {
    let mut chars = root.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
