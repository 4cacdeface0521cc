//! # NoxDrive Protocol Library
//!
//! Data types shared by the NoxDrive daemon and anything that consumes its
//! output: listing responses, tree nodes and the persisted index snapshot.
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::{NodeKind, NodeRecord, ListResponse};
//!
//! let item = NodeRecord {
//!     name: "albums".to_string(),
//!     kind: NodeKind::Folder,
//!     type_tag: protocol::FOLDER_TYPE.to_string(),
//!     size: 0,
//!     modified_at: 0,
//!     rel_path: "music/albums".to_string(),
//!     url: NodeRecord::url_for("music/albums", NodeKind::Folder),
//! };
//!
//! let response = ListResponse { path: "music".to_string(), items: vec![item] };
//! let json = serde_json::to_string(&response).unwrap();
//! assert!(json.contains("\"relPath\":\"music/albums\""));
//! ```
//!
//! ## Modules
//!
//! - [`messages`]: Listing, tree and snapshot types
//! - [`error`]: Error types

pub mod error;
pub mod messages;

pub use error::{ProtocolError, Result};
pub use messages::{
    ErrorBody, IndexSnapshot, ListResponse, NodeKind, NodeRecord, TreeNode, FOLDER_TYPE,
};
