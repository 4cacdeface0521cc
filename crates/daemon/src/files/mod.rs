//! Sandboxed, read-only access to the allowed roots.
//!
//! This module provides:
//! - Path sandboxing of untrusted client paths ([`sandbox`])
//! - Typed metadata for directory entries ([`metadata`])
//! - Shallow directory listings and single-file reads ([`browser`])
//! - The recursive index snapshot job ([`index`])
//! - Streaming ZIP downloads of whole folders ([`archive`])
//!
//! # Security
//!
//! Every client path goes through [`PathSandbox::resolve`] before any
//! filesystem call. Parent segments are rejected outright, the first segment
//! must be an allowed root, and the joined path must stay beneath the storage
//! root. Rejections carry no detail beyond [`FileError::InvalidPath`].

pub mod archive;
pub mod browser;
pub mod error;
pub mod index;
pub mod metadata;
pub mod sandbox;

pub use archive::{ArchiveStream, ArchiveStreamer, ArchiveSummary, ArchiveTarget};
pub use browser::{DirectoryBrowser, OpenedFile};
pub use error::FileError;
pub use index::IndexBuilder;
pub use metadata::{EntryMetadata, IgnoreList};
pub use sandbox::{PathRequirement, PathSandbox, ResolvedPath};
