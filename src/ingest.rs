//! Scan pipeline: walk files, extract metadata blocks, fold them into
//! the index.
//!
//! The fold is where staleness propagation happens: a node whose checksum
//! moved marks the links around it before any new links are added, so
//! links declared alongside the change start out `ok` while pre-existing
//! ones show as stale until confirmed. Ids are immutable; a block that
//! disappears from its file takes its node with it and leaves the links
//! `broken`.

use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::checksum::calculate_checksum;
use crate::config::Config;
use crate::graph::linking::{build_links_from_metadata, validate_link};
use crate::graph::staleness::{mark_broken_links, propagate_checksum_change};
use crate::graph::types::{now_iso, Index, Node};
use crate::scanner::{MetadataBlock, ScannerRegistry};
use crate::store;
use crate::Result;

/// Directories never scanned, even when not gitignored.
const SKIP_DIRS: [&str; 2] = ["target", "node_modules"];

/// Outcome of one scan.
#[derive(Debug, Default, Serialize)]
pub struct ScanReport {
    pub files_scanned: usize,
    pub blocks_found: usize,
    pub nodes_added: Vec<String>,
    pub nodes_updated: Vec<String>,
    pub nodes_removed: Vec<String>,
    pub links_added: usize,
    pub links_updated: usize,
    /// `(file, assigned_id)` for every `id: auto` block.
    pub auto_assigned: Vec<(String, String)>,
    /// Files skipped because their metadata would not parse, with the
    /// parse error.
    pub errors: Vec<String>,
}

impl ScanReport {
    pub fn has_changes(&self) -> bool {
        !self.nodes_added.is_empty()
            || !self.nodes_updated.is_empty()
            || !self.nodes_removed.is_empty()
            || self.links_added > 0
            || self.links_updated > 0
    }
}

/// Scan `paths` (or the configured directories when empty) under
/// `repo_root`, update the index, and persist it.
pub fn scan(repo_root: &Path, paths: &[PathBuf]) -> Result<ScanReport> {
    let tracegit_dir = store::tracegit_dir(repo_root)?;
    let config = Config::load(&tracegit_dir)?;
    let mut index = store::load_index(&tracegit_dir)?;

    let report = scan_into(repo_root, paths, &config, &mut index)?;

    store::save_index(&tracegit_dir, &index)?;
    info!(
        files = report.files_scanned,
        blocks = report.blocks_found,
        "scan complete"
    );
    Ok(report)
}

/// Scan without touching disk persistence; the caller owns the index.
pub fn scan_into(
    repo_root: &Path,
    paths: &[PathBuf],
    config: &Config,
    index: &mut Index,
) -> Result<ScanReport> {
    let registry = ScannerRegistry::with_defaults();
    let mut report = ScanReport::default();

    let roots: Vec<PathBuf> = if paths.is_empty() {
        config
            .directories
            .iter()
            .map(|d| repo_root.join(d))
            .collect()
    } else {
        paths.to_vec()
    };

    let mut files: Vec<PathBuf> = Vec::new();
    for root in &roots {
        collect_files(root, &registry, &mut files);
    }
    files.sort();
    files.dedup();

    for path in files {
        let rel = relative_path(repo_root, &path);
        match scan_file(&path, &rel, &registry, config, index, &mut report) {
            Ok(()) => report.files_scanned += 1,
            Err(e) => {
                warn!(file = %rel, error = %e, "skipping file");
                report.errors.push(e.to_string());
            }
        }
    }

    let broken = mark_broken_links(index);
    if broken > 0 {
        debug!(broken, "links left dangling after scan");
    }
    Ok(report)
}

pub(crate) fn collect_files(root: &Path, registry: &ScannerRegistry, out: &mut Vec<PathBuf>) {
    let walker = ignore::WalkBuilder::new(root)
        .filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy();
            !(entry.file_type().is_some_and(|t| t.is_dir()) && SKIP_DIRS.contains(&name.as_ref()))
        })
        .build();
    for entry in walker.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| registry.supports_extension(ext));
        if supported {
            out.push(path.to_path_buf());
        }
    }
}

/// Repo-relative path with forward slashes.
pub fn relative_path(repo_root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(repo_root).unwrap_or(path);
    rel.to_string_lossy().replace('\\', "/")
}

fn scan_file(
    path: &Path,
    rel: &str,
    registry: &ScannerRegistry,
    config: &Config,
    index: &mut Index,
    report: &mut ScanReport,
) -> Result<()> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let Some(scanner) = registry.for_extension(ext) else {
        return Ok(());
    };
    let content = fs::read_to_string(path)?;
    let blocks = scanner.extract(&content, rel)?;
    report.blocks_found += blocks.len();

    let prior_ids: Vec<String> = index
        .nodes
        .values()
        .filter(|n| n.file == rel)
        .map(|n| n.id.clone())
        .collect();
    let mut seen: HashSet<String> = HashSet::new();

    for mut block in blocks {
        if block.wants_auto_id() {
            let assigned = index.next_id(config.prefix_for(block.node_type));
            debug!(file = rel, id = %assigned, "assigned id");
            report
                .auto_assigned
                .push((rel.to_string(), assigned.clone()));
            block.id = assigned;
        }
        seen.insert(block.id.clone());
        apply_block(index, rel, &block, report)?;
        materialize_links(index, &block.id, report);
    }

    for id in prior_ids {
        if !seen.contains(&id) {
            index.nodes.remove(&id);
            report.nodes_removed.push(id);
        }
    }
    Ok(())
}

/// Create or update the node for one block, propagating staleness when
/// the content checksum moved.
fn apply_block(
    index: &mut Index,
    rel: &str,
    block: &MetadataBlock,
    report: &mut ScanReport,
) -> Result<()> {
    let checksum = calculate_checksum(&block.raw_content);

    if let Some(existing) = index.nodes.get_mut(&block.id) {
        let changed = existing.checksum != checksum;
        existing.node_type = block.node_type;
        existing.title = block.title.clone();
        existing.file = rel.to_string();
        existing.location = block.location.clone();
        existing.status = block.status;
        existing.set_tags(block.tags.clone());
        existing.llm_generated = block.llm_generated;
        existing.upstream = block.upstream.clone();
        existing.downstream = block.downstream.clone();
        if changed {
            existing.checksum = checksum;
            existing.last_updated = now_iso();
        }
        report.nodes_updated.push(block.id.clone());
        if changed {
            propagate_checksum_change(index, &block.id);
        }
    } else {
        let mut node = Node {
            id: block.id.clone(),
            node_type: block.node_type,
            title: block.title.clone(),
            file: rel.to_string(),
            location: block.location.clone(),
            status: block.status,
            last_updated: now_iso(),
            checksum,
            tags: vec![],
            llm_generated: block.llm_generated,
            upstream: block.upstream.clone(),
            downstream: block.downstream.clone(),
        };
        node.set_tags(block.tags.clone());
        index.nodes.insert(node.id.clone(), node);
        report.nodes_added.push(block.id.clone());
    }
    Ok(())
}

/// Turn the node's declared neighbors into links. Existing pairs keep
/// their sync state unless the relation itself changed; new pairs go
/// through full validation and start `ok`.
fn materialize_links(index: &mut Index, node_id: &str, report: &mut ScanReport) {
    let Some(node) = index.nodes.get(node_id).cloned() else {
        return;
    };
    let declared = match build_links_from_metadata(index, &node) {
        Ok(links) => links,
        Err(e) => {
            report.errors.push(e.to_string());
            return;
        }
    };

    for link in declared {
        if let Some(existing) = index.find_link_mut(&link.from_id, &link.to_id) {
            if existing.relation_type != link.relation_type {
                existing.relation_type = link.relation_type;
                existing.sync_status = crate::graph::types::SyncStatus::Ok;
                existing.last_checked = now_iso();
                report.links_updated += 1;
            }
            continue;
        }
        match validate_link(index, &link.from_id, &link.to_id) {
            Ok(()) => {
                index.links.push(link);
                report.links_added += 1;
            }
            Err(e) => report.errors.push(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::SyncStatus;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn init_repo(root: &Path) {
        fs::create_dir(root.join(store::TRACEGIT_DIR)).unwrap();
    }

    const SRS: &str = "## Auth\n<!-- tracegit\nid: SR-010\ntype: system\ntitle: Login flow\nupstream: BR-001\n-->\nUsers must log in.\n";
    const BRD: &str = "## Goals\n<!-- tracegit\nid: BR-001\ntype: business\ntitle: Secure access\n-->\nOnly members get in.\n";

    #[test]
    fn test_scan_builds_nodes_and_links() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        write(dir.path(), "docs/brd.md", BRD);
        write(dir.path(), "docs/srs.md", SRS);

        let report = scan(dir.path(), &[]).unwrap();
        assert_eq!(report.files_scanned, 2);
        assert_eq!(report.blocks_found, 2);
        assert_eq!(report.nodes_added.len(), 2);
        assert_eq!(report.links_added, 1);

        let index = store::load_index(&dir.path().join(store::TRACEGIT_DIR)).unwrap();
        let link = index.find_link("BR-001", "SR-010").unwrap();
        assert_eq!(link.sync_status, SyncStatus::Ok);
    }

    #[test]
    fn test_rescan_is_stable() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        write(dir.path(), "docs/srs.md", SRS);
        write(dir.path(), "docs/brd.md", BRD);

        scan(dir.path(), &[]).unwrap();
        let report = scan(dir.path(), &[]).unwrap();
        assert!(report.nodes_added.is_empty());
        assert_eq!(report.nodes_updated.len(), 2);
        assert_eq!(report.links_added, 0);

        let index = store::load_index(&dir.path().join(store::TRACEGIT_DIR)).unwrap();
        assert_eq!(
            index.find_link("BR-001", "SR-010").unwrap().sync_status,
            SyncStatus::Ok
        );
    }

    #[test]
    fn test_content_change_marks_links_stale() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        write(dir.path(), "docs/brd.md", BRD);
        write(dir.path(), "docs/srs.md", SRS);
        scan(dir.path(), &[]).unwrap();

        write(
            dir.path(),
            "docs/srs.md",
            &SRS.replace("Users must log in.", "Users must log in with MFA."),
        );
        scan(dir.path(), &[]).unwrap();

        let index = store::load_index(&dir.path().join(store::TRACEGIT_DIR)).unwrap();
        assert_eq!(
            index.find_link("BR-001", "SR-010").unwrap().sync_status,
            SyncStatus::DownstreamChanged
        );
    }

    #[test]
    fn test_removed_block_breaks_links() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        write(dir.path(), "docs/brd.md", BRD);
        write(dir.path(), "docs/srs.md", SRS);
        scan(dir.path(), &[]).unwrap();

        write(dir.path(), "docs/srs.md", "## Auth\nNo metadata anymore.\n");
        let report = scan(dir.path(), &[]).unwrap();
        assert_eq!(report.nodes_removed, vec!["SR-010".to_string()]);

        let index = store::load_index(&dir.path().join(store::TRACEGIT_DIR)).unwrap();
        assert_eq!(
            index.find_link("BR-001", "SR-010").unwrap().sync_status,
            SyncStatus::Broken
        );
    }

    #[test]
    fn test_auto_id_assignment() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        write(
            dir.path(),
            "src/auth.py",
            "# tracegit:\n#   id: auto\n#   type: code\n#   title: First\n",
        );
        write(
            dir.path(),
            "src/session.py",
            "# tracegit:\n#   id: auto\n#   type: code\n#   title: Second\n",
        );

        let report = scan(dir.path(), &[]).unwrap();
        let mut ids: Vec<&str> = report
            .auto_assigned
            .iter()
            .map(|(_, id)| id.as_str())
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["C-001", "C-002"]);
    }

    #[test]
    fn test_parse_error_skips_file_but_continues() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        write(dir.path(), "docs/brd.md", BRD);
        write(
            dir.path(),
            "docs/bad.md",
            "<!-- tracegit\nid: SR-001\ntype: system\n-->\n",
        );

        let report = scan(dir.path(), &[]).unwrap();
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.nodes_added, vec!["BR-001".to_string()]);
    }

    #[test]
    fn test_unsupported_extensions_skipped() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        write(dir.path(), "notes.txt", "@tracegit id=X type=code title=t\n");

        let report = scan(dir.path(), &[]).unwrap();
        assert_eq!(report.files_scanned, 0);
        assert_eq!(report.blocks_found, 0);
    }

    #[test]
    fn test_scan_requires_repo() {
        let dir = TempDir::new().unwrap();
        let err = scan(dir.path(), &[]).unwrap_err();
        assert!(matches!(err, crate::error::TraceError::RepoNotFound(_)));
    }

    #[test]
    fn test_scan_specific_path() {
        let dir = TempDir::new().unwrap();
        init_repo(dir.path());
        write(dir.path(), "docs/brd.md", BRD);
        write(dir.path(), "docs/srs.md", SRS);

        let report = scan(dir.path(), &[dir.path().join("docs/brd.md")]).unwrap();
        assert_eq!(report.files_scanned, 1);
        assert_eq!(report.nodes_added, vec!["BR-001".to_string()]);
    }
}
