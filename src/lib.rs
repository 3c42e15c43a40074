//! # tracegit
//!
//! A traceability graph for software repositories.
//!
//! tracegit keeps requirements, architecture notes, code, and tests
//! connected through metadata blocks embedded in ordinary files. A scan
//! extracts the blocks into a YAML index; typed links between nodes track
//! whether either side changed since the link was last reviewed, and
//! bounded traversals answer "what does this change affect" (impact) and
//! "why does this file exist" (relevance).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tracegit::{analyze_impact, scan, store};
//! use std::path::Path;
//!
//! let root = Path::new(".");
//! let report = scan(root, &[]).unwrap();
//! println!("{} blocks indexed", report.blocks_found);
//!
//! let index = store::load_index(&root.join(".tracegit")).unwrap();
//! let impact = analyze_impact(&index, "SR-010", 2).unwrap();
//! println!("{} nodes affected", impact.total_affected());
//! ```
//!
//! The engine is synchronous and file-backed. The CLI in `src/bin` and
//! the `watch` front end are thin layers over the library.

pub mod checksum;
pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod hooks;
pub mod ingest;
pub mod report;
pub mod scanner;
pub mod store;
pub mod validate;
pub mod watch;

// Re-exports for convenience
pub use error::{Result, TraceError};

pub use checksum::{calculate_checksum, compare_checksums, normalize_text};
pub use config::Config;
pub use graph::{
    analyze_impact, build_links_from_metadata, confirm_link, confirm_node,
    detect_circular_dependencies, find_orphans, find_relevant, status_summary, validate_link,
    ImpactResult, Index, Link, Location, Node, NodeStatus, NodeType, RelationType, RelevantResult,
    StatusSummary, SyncStatus,
};
pub use ingest::{scan, ScanReport};
pub use scanner::{MetadataBlock, Scanner, ScannerRegistry};
pub use validate::{validate, ValidationReport};
