//! Wire types exchanged between the NoxDrive daemon and its clients.
//!
//! JSON field names are camelCase (`relPath`, `modifiedAt`) and the content
//! category is carried in a field literally named `type`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Tag used in the `type` field of every folder record.
pub const FOLDER_TYPE: &str = "folder";

/// Kind of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A directory.
    Folder,
    /// Anything that is not a directory.
    File,
}

impl NodeKind {
    /// Returns true for [`NodeKind::Folder`].
    pub fn is_folder(&self) -> bool {
        matches!(self, Self::Folder)
    }
}

/// Metadata for one filesystem entry, as shown in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    /// Entry name (single segment, no separators).
    pub name: String,
    /// Folder or file.
    pub kind: NodeKind,
    /// Content category for files, `"folder"` for folders.
    #[serde(rename = "type")]
    pub type_tag: String,
    /// Size in bytes (0 for folders).
    pub size: u64,
    /// Last modification time in milliseconds since the Unix epoch.
    pub modified_at: u64,
    /// Normalized path relative to the storage root.
    pub rel_path: String,
    /// Client-facing address; folders end with `/`.
    pub url: String,
}

impl NodeRecord {
    /// Builds the client-facing url for a relative path.
    pub fn url_for(rel_path: &str, kind: NodeKind) -> String {
        if kind.is_folder() {
            format!("/{}/", rel_path)
        } else {
            format!("/{}", rel_path)
        }
    }

    /// Returns true if this record describes a folder.
    pub fn is_folder(&self) -> bool {
        self.kind.is_folder()
    }
}

/// A node of the recursive snapshot tree.
///
/// Files and folders are distinct variants so that a file can never carry
/// children. On the wire both serialize as a flat record, folders with an
/// extra `children` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    /// A folder and its ordered children.
    Folder {
        #[serde(flatten)]
        record: NodeRecord,
        children: Vec<TreeNode>,
    },
    /// A leaf file.
    File(NodeRecord),
}

impl TreeNode {
    /// The metadata record for this node.
    pub fn record(&self) -> &NodeRecord {
        match self {
            Self::Folder { record, .. } => record,
            Self::File(record) => record,
        }
    }

    /// Children of a folder; empty for files.
    pub fn children(&self) -> &[TreeNode] {
        match self {
            Self::Folder { children, .. } => children,
            Self::File(_) => &[],
        }
    }

    /// Number of nodes in this subtree, including this one.
    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(TreeNode::node_count).sum::<usize>()
    }
}

/// Response body of the listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResponse {
    /// Normalized path that was listed (empty for the virtual root).
    pub path: String,
    /// Ordered entries: folders first, then by name.
    pub items: Vec<NodeRecord>,
}

/// Body of every JSON error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Short, generic message.
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// The persisted, pre-walked tree of every allowed root.
///
/// This is a cache: nothing ties it to the current filesystem state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSnapshot {
    /// Generation time in milliseconds since the Unix epoch.
    pub generated_at: u64,
    /// Allowed root names, in configured order.
    pub roots: Vec<String>,
    /// Top-level entries of each root.
    pub tree: BTreeMap<String, Vec<TreeNode>>,
}

impl IndexSnapshot {
    /// Total number of nodes across all roots.
    pub fn node_count(&self) -> usize {
        self.tree
            .values()
            .flat_map(|nodes| nodes.iter())
            .map(TreeNode::node_count)
            .sum()
    }

    /// Serialize to indented, human-readable JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
