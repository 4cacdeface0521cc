//! Recursive index snapshot of every allowed root.
//!
//! The snapshot is built by an offline job and written atomically: the JSON
//! goes to a temp file next to the artifact which is then renamed over it.
//! A failed run leaves the previous artifact untouched.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::{Context, Result};
use protocol::{IndexSnapshot, TreeNode};
use tracing::{debug, info, warn};

use super::error::FileError;
use super::metadata::{modified_millis, read_entries, IgnoreList};
use super::sandbox::{PathRequirement, PathSandbox};

/// Builds and persists [`IndexSnapshot`]s.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    sandbox: Arc<PathSandbox>,
    ignore: Arc<IgnoreList>,
}

impl IndexBuilder {
    pub fn new(sandbox: Arc<PathSandbox>, ignore: Arc<IgnoreList>) -> Self {
        Self { sandbox, ignore }
    }

    /// Walk every allowed root.
    ///
    /// Missing roots are created empty. Any other I/O failure aborts the walk.
    pub fn build(&self) -> Result<IndexSnapshot, FileError> {
        let mut tree = BTreeMap::new();

        for root in self.sandbox.allowed_roots() {
            let resolved = self.sandbox.resolve(root, PathRequirement::Concrete)?;
            let abs = resolved.absolute();

            if !abs.exists() {
                info!(root = %root, "Creating missing root");
                fs::create_dir_all(abs)?;
            }

            let nodes = self.walk(abs, resolved.relative())?;
            debug!(root = %root, top_level = nodes.len(), "Indexed root");
            tree.insert(root.clone(), nodes);
        }

        Ok(IndexSnapshot {
            generated_at: modified_millis(SystemTime::now()),
            roots: self.sandbox.allowed_roots().to_vec(),
            tree,
        })
    }

    fn walk(&self, dir: &Path, rel: &str) -> Result<Vec<TreeNode>, FileError> {
        let entries = read_entries(dir, &self.ignore)?;
        let mut nodes = Vec::with_capacity(entries.len());

        for (name, meta) in entries {
            let record = meta.to_record(rel, &name);
            let node = if meta.is_walkable_folder() {
                let children = self.walk(&dir.join(&name), &record.rel_path)?;
                TreeNode::Folder { record, children }
            } else if meta.kind.is_folder() {
                TreeNode::Folder {
                    record,
                    children: Vec::new(),
                }
            } else {
                TreeNode::File(record)
            };
            nodes.push(node);
        }

        Ok(nodes)
    }

    /// Build a snapshot and atomically write it to `path`.
    pub fn build_and_write(&self, path: &Path) -> Result<IndexSnapshot> {
        let snapshot = self.build().context("Failed to walk allowed roots")?;
        write_snapshot(&snapshot, path)?;
        info!(
            path = ?path,
            nodes = snapshot.node_count(),
            generated_at = snapshot.generated_at,
            "Wrote index snapshot"
        );
        Ok(snapshot)
    }

    /// [`build_and_write`](Self::build_and_write) on the blocking pool.
    pub async fn build_and_write_async(&self, path: PathBuf) -> Result<IndexSnapshot> {
        let builder = self.clone();
        tokio::task::spawn_blocking(move || builder.build_and_write(&path))
            .await
            .context("Index job panicked")?
    }
}

/// Atomically write a snapshot as pretty JSON.
pub fn write_snapshot(snapshot: &IndexSnapshot, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create index directory: {}", parent.display())
        })?;
    }

    let contents = snapshot
        .to_json_pretty()
        .context("Failed to serialize index snapshot")?;

    let temp_path = temp_path_for(path);
    if let Err(e) = fs::write(&temp_path, &contents) {
        remove_temp(&temp_path);
        return Err(e).with_context(|| {
            format!("Failed to write temp index file: {}", temp_path.display())
        });
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        remove_temp(&temp_path);
        return Err(e).with_context(|| {
            format!(
                "Failed to rename temp index file {} to {}",
                temp_path.display(),
                path.display()
            )
        });
    }

    Ok(())
}

/// Read a previously written snapshot.
pub fn load_snapshot(path: &Path) -> Result<IndexSnapshot> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read index file: {}", path.display()))?;
    IndexSnapshot::from_json(&contents)
        .with_context(|| format!("Failed to parse index file: {}", path.display()))
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "index.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

fn remove_temp(temp_path: &Path) {
    if let Err(e) = fs::remove_file(temp_path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = ?temp_path, error = %e, "Failed to cleanup temp index file");
        }
    }
}
