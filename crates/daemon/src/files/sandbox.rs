//! Confinement of untrusted client paths to the allowed roots.
//!
//! Resolution is purely lexical: nothing here touches the filesystem. A path
//! is accepted only if, after normalization, it contains no parent segment,
//! starts with an allowed root and joins to a location strictly beneath the
//! storage root.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::FileError;
use crate::config::StorageConfig;

/// Whether the empty "virtual root" path is acceptable to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRequirement {
    /// Listing accepts the empty path and shows the allowed roots.
    AllowVirtualRoot,
    /// Downloads need a concrete `<root>/...` path.
    Concrete,
}

/// Internal rejection reasons. Logged at debug level only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    ParentSegment,
    MalformedSegment,
    EmptyPath,
    UnknownRoot,
    OutsideStorageRoot,
}

/// A validated path beneath the storage root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    relative: String,
    absolute: PathBuf,
}

impl ResolvedPath {
    /// Normalized `/`-separated path relative to the storage root.
    pub fn relative(&self) -> &str {
        &self.relative
    }

    /// Absolute filesystem location.
    pub fn absolute(&self) -> &Path {
        &self.absolute
    }

    /// True for the empty path that stands for the list of allowed roots.
    pub fn is_virtual_root(&self) -> bool {
        self.relative.is_empty()
    }

    /// Final segment of the relative path, if any.
    pub fn last_segment(&self) -> Option<&str> {
        self.relative.rsplit('/').next().filter(|s| !s.is_empty())
    }
}

/// Resolver for client-supplied paths.
#[derive(Debug, Clone)]
pub struct PathSandbox {
    storage_root: PathBuf,
    allowed_roots: Vec<String>,
}

impl PathSandbox {
    /// Create a sandbox over `storage_root` exposing only `allowed_roots`.
    pub fn new(storage_root: impl Into<PathBuf>, allowed_roots: Vec<String>) -> Self {
        Self {
            storage_root: storage_root.into(),
            allowed_roots,
        }
    }

    pub fn from_config(storage: &StorageConfig) -> Self {
        Self::new(storage.root.clone(), storage.allowed_roots.clone())
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    pub fn allowed_roots(&self) -> &[String] {
        &self.allowed_roots
    }

    /// Validate `raw` and join it onto the storage root.
    ///
    /// Every rejection is reported as [`FileError::InvalidPath`].
    pub fn resolve(&self, raw: &str, requirement: PathRequirement) -> Result<ResolvedPath, FileError> {
        self.try_resolve(raw, requirement).map_err(|reason| {
            debug!(?reason, raw_len = raw.len(), "Rejected client path");
            FileError::InvalidPath
        })
    }

    fn try_resolve(&self, raw: &str, requirement: PathRequirement) -> Result<ResolvedPath, Rejection> {
        let segments = normalize(raw)?;

        if segments.is_empty() {
            return match requirement {
                PathRequirement::AllowVirtualRoot => Ok(ResolvedPath {
                    relative: String::new(),
                    absolute: self.storage_root.clone(),
                }),
                PathRequirement::Concrete => Err(Rejection::EmptyPath),
            };
        }

        if !self.allowed_roots.iter().any(|root| root == segments[0]) {
            return Err(Rejection::UnknownRoot);
        }

        let mut absolute = self.storage_root.clone();
        for segment in &segments {
            absolute.push(segment);
        }

        if absolute == self.storage_root || !absolute.starts_with(&self.storage_root) {
            return Err(Rejection::OutsideStorageRoot);
        }

        Ok(ResolvedPath {
            relative: segments.join("/"),
            absolute,
        })
    }
}

/// Lexically normalize a raw client path into its segments.
///
/// Leading separators (either slash), empty segments and `.` segments are
/// dropped. Any `..` segment is a traversal attempt and rejects the whole
/// path, even when it could be collapsed against a preceding segment.
fn normalize(raw: &str) -> Result<Vec<&str>, Rejection> {
    let trimmed = raw.trim_start_matches(['/', '\\']);
    let mut segments = Vec::new();

    for segment in trimmed.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(Rejection::ParentSegment),
            s if s.contains(['\0', '\\']) => return Err(Rejection::MalformedSegment),
            s => segments.push(s),
        }
    }

    Ok(segments)
}
