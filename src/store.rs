//! Persistence for the traceability index.
//!
//! The on-disk form is canonical YAML: nodes sorted by id, links sorted by
//! `(from, to)`, so saving an unchanged index is byte-for-byte idempotent
//! and diffs stay readable. Writes go through a temp file in the same
//! directory followed by a rename; a crash never leaves a half-written
//! index behind.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::TraceError;
use crate::graph::types::{Index, Link, Node};
use crate::Result;

pub const TRACEGIT_DIR: &str = ".tracegit";
pub const INDEX_FILE: &str = "index.yaml";

/// Resolve `<repo_root>/.tracegit`, failing when it does not exist.
pub fn tracegit_dir(repo_root: &Path) -> Result<PathBuf> {
    let dir = repo_root.join(TRACEGIT_DIR);
    if !dir.is_dir() {
        return Err(TraceError::RepoNotFound(repo_root.to_path_buf()));
    }
    Ok(dir)
}

/// The serialized shape of the index: plain sorted lists.
#[derive(serde::Serialize, serde::Deserialize)]
struct IndexFile {
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    links: Vec<Link>,
}

/// Render the canonical YAML for an index.
pub fn to_canonical_yaml(index: &Index) -> Result<String> {
    let mut nodes: Vec<Node> = index.nodes.values().cloned().collect();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));
    let mut links: Vec<Link> = index.links.clone();
    links.sort_by(|a, b| a.key().cmp(&b.key()));
    Ok(serde_yaml::to_string(&IndexFile { nodes, links })?)
}

/// Load the index from `<tracegit_dir>/index.yaml`. A missing file is an
/// empty index; malformed content fails with `IndexCorrupted`.
pub fn load_index(tracegit_dir: &Path) -> Result<Index> {
    let path = tracegit_dir.join(INDEX_FILE);
    if !path.exists() {
        debug!(path = %path.display(), "no index file, starting empty");
        return Ok(Index::new());
    }
    let text = fs::read_to_string(&path)?;
    parse_index(&text)
}

fn parse_index(text: &str) -> Result<Index> {
    let file: IndexFile =
        serde_yaml::from_str(text).map_err(|e| TraceError::IndexCorrupted(e.to_string()))?;
    let mut index = Index::new();
    for node in file.nodes {
        if index.nodes.contains_key(&node.id) {
            return Err(TraceError::IndexCorrupted(format!(
                "duplicate node id '{}'",
                node.id
            )));
        }
        index.nodes.insert(node.id.clone(), node);
    }
    index.links = file.links;
    Ok(index)
}

/// Save the index canonically and atomically.
pub fn save_index(tracegit_dir: &Path, index: &Index) -> Result<()> {
    let path = tracegit_dir.join(INDEX_FILE);
    let yaml = to_canonical_yaml(index)?;

    let mut tmp = tempfile::NamedTempFile::new_in(tracegit_dir)?;
    tmp.write_all(yaml.as_bytes())?;
    tmp.flush()?;
    tmp.persist(&path).map_err(|e| e.error)?;

    info!(
        nodes = index.node_count(),
        links = index.link_count(),
        path = %path.display(),
        "index saved"
    );
    Ok(())
}

/// Whether the persisted index differs from its canonical form. Used by
/// `fmt --check`; never rewrites anything.
pub fn needs_formatting(tracegit_dir: &Path) -> Result<bool> {
    let path = tracegit_dir.join(INDEX_FILE);
    if !path.exists() {
        return Ok(false);
    }
    let current = fs::read_to_string(&path)?;
    let canonical = to_canonical_yaml(&parse_index(&current)?)?;
    Ok(current != canonical)
}
