//! # NoxDrive Daemon Library
//!
//! This crate serves a small, fixed set of folders over HTTP for browsing
//! and bulk download.
//!
//! ## Overview
//!
//! - **Path Sandbox**: Confines untrusted client paths to the allowed roots
//! - **Listing**: One-level, sorted, junk-filtered directory listings
//! - **Index Snapshot**: Offline recursive walk written atomically to disk
//! - **Archives**: Folder downloads as ZIP, streamed with backpressure
//! - **Files**: Single regular files served at their listing URL
//! - **Access Gate**: Optional HTTP Basic auth in front of every route
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                        DriveServer                        │
//! ├───────────────────────────────────────────────────────────┤
//! │  AccessGate ──► Router                                    │
//! │                   │                                       │
//! │        ┌──────────┼──────────────┐                        │
//! │        ▼          ▼              ▼                        │
//! │  DirectoryBrowser ArchiveStreamer  index snapshot file    │
//! │        └──────────┬──────────────┘       ▲                │
//! │                   ▼                      │                │
//! │              PathSandbox            IndexBuilder (CLI)    │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use daemon::{Config, DriveServer};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!     config.validate()?;
//!
//!     let server = DriveServer::bind(&config).await?;
//!     server.run(CancellationToken::new()).await
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`files`]: Sandbox, listing, index snapshot and archives
//! - [`auth`]: Basic-auth access gate
//! - [`router`]: HTTP routes
//! - [`server`]: Listener and graceful shutdown
//! - [`logging`]: Tracing subscriber setup

pub mod auth;
pub mod config;
pub mod files;
pub mod logging;
pub mod router;
pub mod server;

// Re-export protocol for convenience
pub use protocol;

// Re-export config types for convenience
pub use config::Config;

// Re-export files types for convenience
pub use files::{
    ArchiveStreamer, ArchiveSummary, ArchiveTarget, DirectoryBrowser, FileError, IgnoreList,
    IndexBuilder, OpenedFile, PathRequirement, PathSandbox, ResolvedPath,
};

// Re-export HTTP types for convenience
pub use auth::{hash_password, AccessGate, GateDecision};
pub use router::{build_router, AppState};
pub use server::DriveServer;
