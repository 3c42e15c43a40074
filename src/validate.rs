//! Whole-tree validation.
//!
//! Unlike the fail-fast engine operations, validation walks everything
//! and aggregates findings with a severity each, so one bad file never
//! hides the rest. Nothing here mutates the index.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::checksum::calculate_checksum;
use crate::error::TraceError;
use crate::graph::linking::{build_links_from_metadata, detect_circular_dependencies};
use crate::graph::staleness::find_orphans;
use crate::graph::types::{now_iso, Index, Node};
use crate::ingest::{collect_files, relative_path};
use crate::scanner::{MetadataBlock, ScannerRegistry};
use crate::store;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Info => write!(f, "info"),
        }
    }
}

/// Stable machine-readable codes for findings.
pub mod codes {
    pub const SELF_REFERENCE: &str = "SELF_REFERENCE";
    pub const MISSING_TARGET: &str = "MISSING_TARGET";
    pub const DUPLICATE_ID: &str = "DUPLICATE_ID";
    pub const CIRCULAR_DEPENDENCY: &str = "CIRCULAR_DEPENDENCY";
    pub const ORPHAN_NODE: &str = "ORPHAN_NODE";
    pub const PARSE_ERROR: &str = "PARSE_ERROR";
}

#[derive(Debug, Clone, Serialize)]
pub struct Issue {
    pub code: &'static str,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

#[derive(Debug, Default, Serialize)]
pub struct IssueSummary {
    pub errors: usize,
    pub warnings: usize,
    pub info: usize,
}

#[derive(Debug, Serialize)]
pub struct ValidationReport {
    pub files_scanned: usize,
    pub blocks_found: usize,
    pub issues: Vec<Issue>,
    pub summary: IssueSummary,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.summary.errors == 0
    }
}

/// Validate the tree under `repo_root` (or just `path` within it).
/// Existing index nodes participate in duplicate, target, cycle, and
/// orphan checks so a partial validation stays meaningful.
pub fn validate(repo_root: &Path, path: Option<&Path>) -> Result<ValidationReport> {
    let tracegit_dir = store::tracegit_dir(repo_root)?;
    let base_index = store::load_index(&tracegit_dir)?;
    let registry = ScannerRegistry::with_defaults();

    let root = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| repo_root.to_path_buf());
    let mut files: Vec<PathBuf> = Vec::new();
    collect_files(&root, &registry, &mut files);
    files.sort();

    let mut issues: Vec<Issue> = Vec::new();
    let mut blocks: Vec<(String, MetadataBlock)> = Vec::new();
    let mut files_scanned = 0;

    for file in &files {
        let rel = relative_path(repo_root, file);
        let content = match fs::read_to_string(file) {
            Ok(c) => c,
            Err(e) => {
                issues.push(parse_issue(&rel, None, e.to_string()));
                continue;
            }
        };
        let ext = file.extension().and_then(|e| e.to_str()).unwrap_or_default();
        let Some(scanner) = registry.for_extension(ext) else {
            continue;
        };
        files_scanned += 1;
        match scanner.extract(&content, &rel) {
            Ok(found) => blocks.extend(found.into_iter().map(|b| (rel.clone(), b))),
            Err(TraceError::InvalidMetadata {
                file,
                line,
                message,
            }) => issues.push(parse_issue(&file, Some(line), message)),
            Err(e) => issues.push(parse_issue(&rel, None, e.to_string())),
        }
    }
    let blocks_found = blocks.len();
    debug!(files_scanned, blocks_found, "validation scan finished");

    check_duplicates(&base_index, &blocks, &mut issues);
    let merged = merge(&base_index, &blocks, &mut issues);
    check_missing_targets(&merged, &mut issues);
    check_cycles(&merged, &mut issues);
    check_orphans(&merged, &mut issues);

    let mut summary = IssueSummary::default();
    for issue in &issues {
        match issue.severity {
            Severity::Error => summary.errors += 1,
            Severity::Warning => summary.warnings += 1,
            Severity::Info => summary.info += 1,
        }
    }

    Ok(ValidationReport {
        files_scanned,
        blocks_found,
        issues,
        summary,
    })
}

fn parse_issue(file: &str, line: Option<usize>, message: String) -> Issue {
    Issue {
        code: codes::PARSE_ERROR,
        severity: Severity::Error,
        message,
        file: Some(file.to_string()),
        line,
    }
}

fn check_duplicates(base: &Index, blocks: &[(String, MetadataBlock)], issues: &mut Vec<Issue>) {
    let mut seen: HashMap<&str, &str> = HashMap::new();
    for (file, block) in blocks {
        if block.wants_auto_id() {
            continue;
        }
        if let Some(first_file) = seen.get(block.id.as_str()) {
            issues.push(Issue {
                code: codes::DUPLICATE_ID,
                severity: Severity::Error,
                message: format!(
                    "id '{}' defined in both {} and {}",
                    block.id, first_file, file
                ),
                file: Some(file.clone()),
                line: Some(block.line_number),
            });
            continue;
        }
        seen.insert(&block.id, file);
        // A known id in a different file is a move only if the old file
        // was rescanned; from validation's view it is a duplicate.
        if let Some(node) = base.nodes.get(&block.id) {
            if node.file != *file {
                issues.push(Issue {
                    code: codes::DUPLICATE_ID,
                    severity: Severity::Error,
                    message: format!(
                        "id '{}' defined in {} but already indexed from {}",
                        block.id, file, node.file
                    ),
                    file: Some(file.clone()),
                    line: Some(block.line_number),
                });
            }
        }
    }
}

/// Fold scanned blocks over a copy of the index; self-referential
/// declarations surface as issues instead of aborting.
fn merge(base: &Index, blocks: &[(String, MetadataBlock)], issues: &mut Vec<Issue>) -> Index {
    let mut merged = base.clone();
    for (file, block) in blocks {
        if block.wants_auto_id() {
            continue;
        }
        let node = Node {
            id: block.id.clone(),
            node_type: block.node_type,
            title: block.title.clone(),
            file: file.clone(),
            location: block.location.clone(),
            status: block.status,
            last_updated: now_iso(),
            checksum: calculate_checksum(&block.raw_content),
            tags: block.tags.clone(),
            llm_generated: block.llm_generated,
            upstream: block.upstream.clone(),
            downstream: block.downstream.clone(),
        };
        merged.nodes.insert(node.id.clone(), node);
    }
    for (file, block) in blocks {
        let Some(node) = merged.nodes.get(&block.id).cloned() else {
            continue;
        };
        match build_links_from_metadata(&merged, &node) {
            Ok(links) => {
                for link in links {
                    if merged.find_link(&link.from_id, &link.to_id).is_none() {
                        merged.links.push(link);
                    }
                }
            }
            Err(TraceError::SelfReferential { node_id, .. }) => issues.push(Issue {
                code: codes::SELF_REFERENCE,
                severity: Severity::Error,
                message: format!("node '{node_id}' links to itself"),
                file: Some(file.clone()),
                line: Some(block.line_number),
            }),
            Err(e) => issues.push(parse_issue(file, Some(block.line_number), e.to_string())),
        }
    }
    merged
}

fn check_missing_targets(index: &Index, issues: &mut Vec<Issue>) {
    let mut reported: HashSet<(String, String)> = HashSet::new();
    for link in &index.links {
        for endpoint in [&link.from_id, &link.to_id] {
            if !index.nodes.contains_key(endpoint)
                && reported.insert((link.from_id.clone(), endpoint.clone()))
            {
                let origin = if endpoint == &link.from_id {
                    &link.to_id
                } else {
                    &link.from_id
                };
                let file = index.nodes.get(origin).map(|n| n.file.clone());
                issues.push(Issue {
                    code: codes::MISSING_TARGET,
                    severity: Severity::Warning,
                    message: format!("link {} -> {} references unknown id '{}'",
                        link.from_id, link.to_id, endpoint),
                    file,
                    line: None,
                });
            }
        }
    }
}

fn check_cycles(index: &Index, issues: &mut Vec<Issue>) {
    for cycle in detect_circular_dependencies(index) {
        issues.push(Issue {
            code: codes::CIRCULAR_DEPENDENCY,
            severity: Severity::Error,
            message: format!("circular dependency across files: {}", cycle.join(" -> ")),
            file: None,
            line: None,
        });
    }
}

fn check_orphans(index: &Index, issues: &mut Vec<Issue>) {
    let report = find_orphans(index);
    for orphan in &report.missing_upstream {
        issues.push(Issue {
            code: codes::ORPHAN_NODE,
            severity: Severity::Warning,
            message: format!("{} ({}) has no upstream link", orphan.id, orphan.node_type),
            file: Some(orphan.file.clone()),
            line: None,
        });
    }
    for orphan in &report.missing_downstream {
        issues.push(Issue {
            code: codes::ORPHAN_NODE,
            severity: Severity::Warning,
            message: format!("{} ({}) has no downstream link", orphan.id, orphan.node_type),
            file: Some(orphan.file.clone()),
            line: None,
        });
    }
}
