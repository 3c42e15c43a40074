//! Error types for tracegit.
//!
//! Structural violations (self-reference, cross-file cycle) are fail-fast:
//! the offending operation is rejected and nothing is persisted. Staleness
//! is not an error; it is steady-state data reported by the status
//! commands and resolved via `confirm`.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TraceError>;

/// All error conditions the engine can surface.
#[derive(Debug, Error)]
pub enum TraceError {
    /// A link's endpoints are the same node. Always rejected.
    #[error("node '{node_id}' references itself{}", match file { Some(f) => format!(" (in {f})"), None => String::new() })]
    SelfReferential {
        node_id: String,
        file: Option<String>,
    },

    /// A link would close a cycle spanning more than one file.
    #[error("circular dependency across files: {}", cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    /// A node id was looked up but does not exist in the index.
    #[error("node '{0}' not found in index")]
    NodeNotFound(String),

    /// A `(from, to)` pair names no existing link.
    #[error("no link between '{from}' and '{to}'")]
    LinkNotFound { from: String, to: String },

    /// The persisted index is unreadable or structurally malformed.
    #[error("index corrupted: {0}")]
    IndexCorrupted(String),

    /// No `.tracegit/` directory at the expected location.
    #[error("not in a tracegit repository (no .tracegit/ in {})", .0.display())]
    RepoNotFound(PathBuf),

    /// Git hooks were requested but there is no `.git` directory.
    #[error("no .git directory in {}", .0.display())]
    GitNotFound(PathBuf),

    /// A repository is already initialized and `--force` was not given.
    #[error("repository already initialized at {}. Use --force to overwrite", .0.display())]
    AlreadyInitialized(PathBuf),

    /// A metadata block could not be parsed. Owned by scanners, surfaced
    /// through ingestion.
    #[error("invalid metadata in {file}:{line}: {message}")]
    InvalidMetadata {
        file: String,
        line: usize,
        message: String,
    },

    /// An unknown relation type name was supplied.
    #[error("invalid relation type: {given}. Valid types: {valid}")]
    InvalidRelationType { given: String, valid: String },

    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
