//! CLI surface for tracegit.
//!
//! Commands:
//! - Setup: init, hooks
//! - Ingestion: scan, watch
//! - Query: status, show, impact, relevant
//! - Maintenance: link, confirm, validate, fmt

pub mod handlers;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "tracegit")]
#[command(about = "Traceability graph for requirements, architecture, code, and tests")]
pub struct Cli {
    /// Repository root (default: current directory)
    #[arg(short, long, default_value = ".")]
    pub root: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    /// Impact only: indented tree (same as text)
    Tree,
    /// Impact only: review checklist
    Checklist,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the .tracegit directory with a default config and empty index
    Init {
        /// Overwrite an existing repository
        #[arg(long)]
        force: bool,
    },

    /// Scan files for metadata blocks and update the index
    Scan {
        /// Files or directories (default: configured directories)
        paths: Vec<PathBuf>,
    },

    /// Show node and link counts plus stale links
    Status {
        /// Only the stale-link listing
        #[arg(long)]
        stale: bool,

        /// Include nodes missing expected connections
        #[arg(long)]
        orphans: bool,
    },

    /// Show one node with its upstream and downstream links
    Show {
        /// Node id
        id: String,
    },

    /// Create or update a link between two existing nodes
    Link {
        /// Source node id
        from: String,

        /// Target node id
        to: String,

        /// Relation: refines, implements, tests, derived_from, depends_on
        #[arg(short = 't', long = "type")]
        relation: String,
    },

    /// Mark reviewed links as in sync again
    Confirm {
        /// Node id whose links to confirm
        id: String,

        /// Confirm only the link to this node
        #[arg(long)]
        to: Option<String>,
    },

    /// What lies downstream of a node and would need review
    Impact {
        /// Node id
        id: String,

        /// Traversal depth
        #[arg(short, long, default_value_t = 2)]
        depth: usize,
    },

    /// Upstream context for a file
    Relevant {
        /// File path (absolute or repo-relative)
        file: PathBuf,

        /// Traversal depth
        #[arg(short, long, default_value_t = 3)]
        depth: usize,
    },

    /// Check the whole tree and report all findings
    Validate {
        /// Restrict to one file or directory
        path: Option<PathBuf>,
    },

    /// Rewrite the index into canonical form
    Fmt {
        /// Report instead of rewriting
        #[arg(long)]
        check: bool,
    },

    /// Manage git hooks
    Hooks {
        #[command(subcommand)]
        action: HooksAction,
    },

    /// Watch for file changes and rescan automatically
    Watch {
        /// Directories to watch (default: repository root)
        paths: Vec<PathBuf>,

        /// Debounce window in milliseconds
        #[arg(long, default_value_t = crate::watch::DEFAULT_DEBOUNCE_MS)]
        debounce_ms: u64,
    },
}

#[derive(Subcommand)]
pub enum HooksAction {
    /// Write pre-commit and post-merge hooks (pre-push with --all)
    Install {
        /// Also install the pre-push hook
        #[arg(long)]
        all: bool,
    },
}
