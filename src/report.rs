//! Text rendering for command output.
//!
//! Every command has a plain-text form here and a JSON form built from
//! the same structures via serde; `impact` additionally renders as a tree
//! or a review checklist. Renderers are pure string builders so they can
//! be asserted on directly.

use std::fmt::Write;

use crate::graph::staleness::{OrphanReport, StatusSummary};
use crate::graph::traversal::{ImpactResult, RelevantResult};
use crate::graph::types::{Index, Node, SyncStatus};
use crate::ingest::ScanReport;
use crate::validate::ValidationReport;

/// How many indirect nodes the impact tree shows before truncating.
const IMPACT_TREE_LIMIT: usize = 10;

pub fn render_scan(report: &ScanReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Scanned {} files, found {} blocks",
        report.files_scanned, report.blocks_found
    );
    let _ = writeln!(
        out,
        "Nodes: {} added, {} updated, {} removed",
        report.nodes_added.len(),
        report.nodes_updated.len(),
        report.nodes_removed.len()
    );
    let _ = writeln!(
        out,
        "Links: {} added, {} updated",
        report.links_added, report.links_updated
    );
    for (file, id) in &report.auto_assigned {
        let _ = writeln!(out, "Assigned {id} in {file}");
    }
    for error in &report.errors {
        let _ = writeln!(out, "Warning: {error}");
    }
    out
}

pub fn render_status(summary: &StatusSummary, orphans: Option<&OrphanReport>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Nodes: {} | Links: {}",
        summary.total_nodes, summary.total_links
    );
    for (node_type, count) in &summary.node_counts {
        let _ = writeln!(out, "  {node_type}: {count}");
    }

    if summary.stale_links == 0 {
        out.push_str("No stale links\n");
    } else {
        let _ = writeln!(out, "Stale links: {}", summary.stale_links);
        for (label, group) in [
            ("upstream_changed", &summary.upstream_changed),
            ("downstream_changed", &summary.downstream_changed),
            ("broken", &summary.broken),
        ] {
            if group.is_empty() {
                continue;
            }
            let _ = writeln!(out, "  {label}:");
            for link in group {
                let _ = writeln!(
                    out,
                    "    {} -> {} ({})",
                    link.from, link.to, link.relation_type
                );
            }
        }
    }

    if let Some(orphans) = orphans {
        if orphans.is_empty() {
            out.push_str("No orphan nodes\n");
        } else {
            if !orphans.missing_upstream.is_empty() {
                out.push_str("Missing upstream:\n");
                for o in &orphans.missing_upstream {
                    let _ = writeln!(out, "  {} ({}) {}", o.id, o.node_type, o.file);
                }
            }
            if !orphans.missing_downstream.is_empty() {
                out.push_str("Missing downstream:\n");
                for o in &orphans.missing_downstream {
                    let _ = writeln!(out, "  {} ({}) {}", o.id, o.node_type, o.file);
                }
            }
        }
    }
    out
}

pub fn render_show(node: &Node, index: &Index) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}: {}", node.id, node.title);
    let _ = writeln!(out, "  type: {}", node.node_type);
    let _ = writeln!(out, "  status: {}", node.status);
    let _ = writeln!(out, "  file: {} ({})", node.file, node.location);
    let _ = writeln!(out, "  last updated: {}", node.last_updated);
    if !node.tags.is_empty() {
        let _ = writeln!(out, "  tags: {}", node.tags.join(", "));
    }
    if node.llm_generated {
        out.push_str("  llm generated: yes\n");
    }

    let upstream: Vec<String> = index
        .links_to(&node.id)
        .map(|l| format!("    {} ({}, {})", l.from_id, l.relation_type, l.sync_status))
        .collect();
    let downstream: Vec<String> = index
        .links_from(&node.id)
        .map(|l| format!("    {} ({}, {})", l.to_id, l.relation_type, l.sync_status))
        .collect();

    if upstream.is_empty() {
        out.push_str("  upstream: none\n");
    } else {
        out.push_str("  upstream:\n");
        for line in upstream {
            let _ = writeln!(out, "{line}");
        }
    }
    if downstream.is_empty() {
        out.push_str("  downstream: none\n");
    } else {
        out.push_str("  downstream:\n");
        for line in downstream {
            let _ = writeln!(out, "{line}");
        }
    }
    out
}

pub fn render_impact_tree(result: &ImpactResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "IMPACT: {} ({})",
        result.origin.id, result.origin.title
    );

    let _ = writeln!(out, "\nDIRECT DOWNSTREAM (depth 1):");
    if result.direct.is_empty() {
        out.push_str("  none\n");
    }
    for d in &result.direct {
        let _ = writeln!(
            out,
            "  {} [{}] {} ({})",
            d.id, d.relation_type, d.title, d.file
        );
    }

    let _ = writeln!(out, "\nINDIRECT (depth 2+):");
    if result.indirect.is_empty() {
        out.push_str("  none\n");
    }
    for i in result.indirect.iter().take(IMPACT_TREE_LIMIT) {
        let _ = writeln!(out, "  {} (d{}) {} ({})", i.id, i.distance, i.title, i.file);
    }
    if result.indirect.len() > IMPACT_TREE_LIMIT {
        let _ = writeln!(
            out,
            "  ... and {} more",
            result.indirect.len() - IMPACT_TREE_LIMIT
        );
    }

    let _ = writeln!(out, "\nAFFECTED FILES:");
    for file in &result.affected_files {
        let _ = writeln!(out, "  {file}");
    }

    let _ = writeln!(out, "\nSUGGESTED ACTIONS:");
    for action in suggested_actions(result) {
        let _ = writeln!(out, "  {action}");
    }
    out
}

pub fn render_impact_checklist(result: &ImpactResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Review checklist for {} ({}):",
        result.origin.id, result.origin.title
    );
    for d in &result.direct {
        let _ = writeln!(out, "- [ ] Review {}: {} ({})", d.id, d.title, d.file);
        let _ = writeln!(
            out,
            "- [ ] Run `tracegit confirm {} --to {}` after review",
            result.origin.id, d.id
        );
    }
    for i in &result.indirect {
        let _ = writeln!(out, "- [ ] Review {}: {} ({})", i.id, i.title, i.file);
    }
    out
}

fn suggested_actions(result: &ImpactResult) -> Vec<String> {
    let mut actions = Vec::new();
    for d in &result.direct {
        actions.push(format!("Review {} in {}", d.id, d.file));
        if d.sync_status != SyncStatus::Ok {
            actions.push(format!(
                "Run `tracegit confirm {} --to {}` once reviewed",
                result.origin.id, d.id
            ));
        }
    }
    if !result.indirect.is_empty() {
        actions.push(format!(
            "Check {} indirect node(s) listed above",
            result.indirect.len()
        ));
    }
    if actions.is_empty() {
        actions.push("No downstream nodes; nothing to review".to_string());
    }
    actions
}

pub fn render_relevant(result: &RelevantResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Context for {}:", result.file);
    if result.nodes.is_empty() {
        out.push_str("  no traceability nodes for this file\n");
        return out;
    }

    let direct: Vec<_> = result.nodes.iter().filter(|n| n.distance == 0).collect();
    if !direct.is_empty() {
        out.push_str("Direct:\n");
        for n in direct {
            let _ = writeln!(out, "  {} [{}] {}", n.id, n.node_type, n.title);
        }
    }
    for level in 1..=result.depth {
        let at_level: Vec<_> = result
            .nodes
            .iter()
            .filter(|n| n.distance == level)
            .collect();
        if at_level.is_empty() {
            continue;
        }
        let _ = writeln!(
            out,
            "Upstream ({} level{}):",
            level,
            if level == 1 { "" } else { "s" }
        );
        for n in at_level {
            let _ = writeln!(out, "  {} [{}] {} ({})", n.id, n.node_type, n.title, n.file);
        }
    }
    out
}

pub fn render_validation(report: &ValidationReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Validated {} files, {} blocks",
        report.files_scanned, report.blocks_found
    );
    for issue in &report.issues {
        let place = match (&issue.file, issue.line) {
            (Some(f), Some(l)) => format!(" [{f}:{l}]"),
            (Some(f), None) => format!(" [{f}]"),
            _ => String::new(),
        };
        let _ = writeln!(
            out,
            "{}: {} {}{}",
            issue.severity, issue.code, issue.message, place
        );
    }
    let _ = writeln!(
        out,
        "{} error(s), {} warning(s), {} info",
        report.summary.errors, report.summary.warnings, report.summary.info
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::staleness::status_summary;
    use crate::graph::traversal::analyze_impact;
    use crate::graph::types::fixtures::{link, node};
    use crate::graph::types::{NodeType, RelationType};

    fn sample_index() -> Index {
        let mut index = Index::new();
        for (id, ty, file) in [
            ("BR-001", NodeType::Business, "docs/brd.md"),
            ("SR-010", NodeType::System, "docs/srs.md"),
            ("C-100", NodeType::Code, "src/auth.py"),
        ] {
            index.nodes.insert(id.into(), node(id, ty, file));
        }
        index.links.push(link(
            "BR-001",
            "SR-010",
            RelationType::Refines,
            SyncStatus::Ok,
        ));
        index.links.push(link(
            "SR-010",
            "C-100",
            RelationType::Implements,
            SyncStatus::Ok,
        ));
        index
    }

    #[test]
    fn test_status_text_no_stale() {
        let index = sample_index();
        let text = render_status(&status_summary(&index), None);
        assert!(text.contains("Nodes: 3 | Links: 2"));
        assert!(text.contains("No stale links"));
    }

    #[test]
    fn test_status_text_groups_stale() {
        let mut index = sample_index();
        index.find_link_mut("BR-001", "SR-010").unwrap().sync_status =
            SyncStatus::UpstreamChanged;
        let text = render_status(&status_summary(&index), None);
        assert!(text.contains("Stale links: 1"));
        assert!(text.contains("upstream_changed:"));
        assert!(text.contains("BR-001 -> SR-010"));
    }

    #[test]
    fn test_impact_tree_sections() {
        let index = sample_index();
        let result = analyze_impact(&index, "BR-001", 2).unwrap();
        let text = render_impact_tree(&result);
        assert!(text.contains("DIRECT DOWNSTREAM (depth 1):"));
        assert!(text.contains("INDIRECT (depth 2+):"));
        assert!(text.contains("AFFECTED FILES:"));
        assert!(text.contains("SUGGESTED ACTIONS:"));
        assert!(text.contains("SR-010"));
        assert!(text.contains("C-100"));
    }

    #[test]
    fn test_impact_checklist_items() {
        let index = sample_index();
        let result = analyze_impact(&index, "BR-001", 2).unwrap();
        let text = render_impact_checklist(&result);
        assert!(text.contains("- [ ] Review SR-010:"));
        assert!(text.contains("tracegit confirm BR-001 --to SR-010"));
    }

    #[test]
    fn test_relevant_grouping() {
        let index = sample_index();
        let result = crate::graph::traversal::find_relevant(&index, "src/auth.py", 3);
        let text = render_relevant(&result);
        assert!(text.contains("Direct:"));
        assert!(text.contains("C-100"));
        assert!(text.contains("Upstream (1 level):"));
        assert!(text.contains("Upstream (2 levels):"));
        assert!(text.contains("BR-001"));
    }

    #[test]
    fn test_show_lists_both_directions() {
        let index = sample_index();
        let text = render_show(&index.nodes["SR-010"], &index);
        assert!(text.contains("SR-010: SR-010 title"));
        assert!(text.contains("upstream:"));
        assert!(text.contains("BR-001 (refines, ok)"));
        assert!(text.contains("C-100 (implements, ok)"));
    }
}
