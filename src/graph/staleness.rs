//! Link freshness tracking.
//!
//! Staleness is steady-state data, not an error: edits mark the links
//! around a node as changed, `confirm` acknowledges a reviewed link, and
//! links with a missing endpoint are `broken` until the endpoint returns.
//! All marking happens at ingestion or on explicit command; nothing here
//! runs on a timer.

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::types::{now_iso, Index, NodeType, RelationType, SyncStatus};
use crate::error::TraceError;
use crate::Result;

/// A link in a report, flattened for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct LinkRef {
    pub from: String,
    pub to: String,
    pub relation_type: RelationType,
    pub last_checked: String,
}

/// A node flagged by orphan detection.
#[derive(Debug, Clone, Serialize)]
pub struct OrphanNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub title: String,
    pub file: String,
}

/// Nodes missing the connections their type conventionally requires.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrphanReport {
    /// Non-business nodes with no incoming link.
    pub missing_upstream: Vec<OrphanNode>,
    /// Requirement-level nodes with no outgoing link.
    pub missing_downstream: Vec<OrphanNode>,
}

impl OrphanReport {
    pub fn is_empty(&self) -> bool {
        self.missing_upstream.is_empty() && self.missing_downstream.is_empty()
    }
}

/// Aggregate view for the `status` command.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSummary {
    pub total_nodes: usize,
    pub total_links: usize,
    /// Node counts per type, in type order.
    pub node_counts: BTreeMap<NodeType, usize>,
    pub stale_links: usize,
    pub upstream_changed: Vec<LinkRef>,
    pub downstream_changed: Vec<LinkRef>,
    pub broken: Vec<LinkRef>,
}

/// Mark the links around `node_id` after its checksum changed: outgoing
/// links see their upstream changed, incoming links their downstream.
/// Already-stale links keep their state; `ok` is never restored here.
pub fn propagate_checksum_change(index: &mut Index, node_id: &str) -> usize {
    let mut marked = 0;
    for link in index.links.iter_mut() {
        let new_status = if link.from_id == node_id {
            SyncStatus::UpstreamChanged
        } else if link.to_id == node_id {
            SyncStatus::DownstreamChanged
        } else {
            continue;
        };
        if link.sync_status == SyncStatus::Ok {
            link.sync_status = new_status;
            marked += 1;
        }
    }
    if marked > 0 {
        debug!(node = node_id, marked, "propagated checksum change to links");
    }
    marked
}

/// Mark every link with a missing endpoint as `broken`, and demote no
/// other state. Returns the number of links newly broken.
pub fn mark_broken_links(index: &mut Index) -> usize {
    let mut newly_broken = 0;
    let known: std::collections::HashSet<&str> =
        index.nodes.keys().map(String::as_str).collect();
    for link in index.links.iter_mut() {
        let dangling = !known.contains(link.from_id.as_str())
            || !known.contains(link.to_id.as_str());
        if dangling && link.sync_status != SyncStatus::Broken {
            link.sync_status = SyncStatus::Broken;
            newly_broken += 1;
        }
    }
    if newly_broken > 0 {
        info!(newly_broken, "marked links with missing endpoints as broken");
    }
    newly_broken
}

/// Acknowledge one reviewed link: reset it to `ok` with a fresh
/// timestamp. Fails when the pair names no link.
pub fn confirm_link(index: &mut Index, from_id: &str, to_id: &str) -> Result<()> {
    let link = index
        .find_link_mut(from_id, to_id)
        .ok_or_else(|| TraceError::LinkNotFound {
            from: from_id.to_string(),
            to: to_id.to_string(),
        })?;
    link.sync_status = SyncStatus::Ok;
    link.last_checked = now_iso();
    info!(from = from_id, to = to_id, "link confirmed");
    Ok(())
}

/// Acknowledge every non-`ok` link touching `node_id`. Returns the number
/// of links reset; fails when the node does not exist.
pub fn confirm_node(index: &mut Index, node_id: &str) -> Result<usize> {
    index.require_node(node_id)?;
    let now = now_iso();
    let mut reset = 0;
    for link in index.links.iter_mut() {
        if (link.from_id == node_id || link.to_id == node_id)
            && link.sync_status != SyncStatus::Ok
        {
            link.sync_status = SyncStatus::Ok;
            link.last_checked = now.clone();
            reset += 1;
        }
    }
    info!(node = node_id, reset, "links confirmed");
    Ok(reset)
}

/// Build the `status` summary: per-type node counts plus stale links
/// grouped by state.
pub fn status_summary(index: &Index) -> StatusSummary {
    let mut node_counts: BTreeMap<NodeType, usize> = BTreeMap::new();
    for node in index.nodes.values() {
        *node_counts.entry(node.node_type).or_insert(0) += 1;
    }

    let mut upstream_changed = Vec::new();
    let mut downstream_changed = Vec::new();
    let mut broken = Vec::new();
    for link in &index.links {
        let entry = LinkRef {
            from: link.from_id.clone(),
            to: link.to_id.clone(),
            relation_type: link.relation_type,
            last_checked: link.last_checked.clone(),
        };
        match link.sync_status {
            SyncStatus::Ok => {}
            SyncStatus::UpstreamChanged => upstream_changed.push(entry),
            SyncStatus::DownstreamChanged => downstream_changed.push(entry),
            SyncStatus::Broken => broken.push(entry),
        }
    }
    for group in [&mut upstream_changed, &mut downstream_changed, &mut broken] {
        group.sort_by(|a, b| a.from.cmp(&b.from).then_with(|| a.to.cmp(&b.to)));
    }

    StatusSummary {
        total_nodes: index.node_count(),
        total_links: index.link_count(),
        node_counts,
        stale_links: upstream_changed.len() + downstream_changed.len() + broken.len(),
        upstream_changed,
        downstream_changed,
        broken,
    }
}

/// Find nodes missing the connections their type requires: everything but
/// business requirements wants an incoming link, requirement-level types
/// want an outgoing one.
pub fn find_orphans(index: &Index) -> OrphanReport {
    let mut report = OrphanReport::default();
    for node in index.nodes.values() {
        let has_upstream = index.links_to(&node.id).next().is_some();
        let has_downstream = index.links_from(&node.id).next().is_some();

        let orphan = OrphanNode {
            id: node.id.clone(),
            node_type: node.node_type,
            title: node.title.clone(),
            file: node.file.clone(),
        };
        if node.node_type.requires_upstream() && !has_upstream {
            report.missing_upstream.push(orphan.clone());
        }
        if node.node_type.requires_downstream() && !has_downstream {
            report.missing_downstream.push(orphan);
        }
    }
    report.missing_upstream.sort_by(|a, b| a.id.cmp(&b.id));
    report.missing_downstream.sort_by(|a, b| a.id.cmp(&b.id));
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::fixtures::{link, node, TS};

    fn linked_index() -> Index {
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
    fn test_propagate_marks_both_directions() {
        let mut index = linked_index();
        let marked = propagate_checksum_change(&mut index, "SR-010");
        assert_eq!(marked, 2);
        assert_eq!(
            index.find_link("SR-010", "C-100").unwrap().sync_status,
            SyncStatus::UpstreamChanged
        );
        assert_eq!(
            index.find_link("BR-001", "SR-010").unwrap().sync_status,
            SyncStatus::DownstreamChanged
        );
    }

    #[test]
    fn test_propagate_never_downgrades_broken() {
        let mut index = linked_index();
        index.find_link_mut("SR-010", "C-100").unwrap().sync_status = SyncStatus::Broken;
        propagate_checksum_change(&mut index, "SR-010");
        assert_eq!(
            index.find_link("SR-010", "C-100").unwrap().sync_status,
            SyncStatus::Broken
        );
    }

    #[test]
    fn test_mark_broken_links() {
        let mut index = linked_index();
        index.links.push(link(
            "SR-010",
            "C-999",
            RelationType::Implements,
            SyncStatus::Ok,
        ));
        assert_eq!(mark_broken_links(&mut index), 1);
        assert_eq!(
            index.find_link("SR-010", "C-999").unwrap().sync_status,
            SyncStatus::Broken
        );
        // Intact links untouched.
        assert_eq!(
            index.find_link("BR-001", "SR-010").unwrap().sync_status,
            SyncStatus::Ok
        );
        // Idempotent.
        assert_eq!(mark_broken_links(&mut index), 0);
    }

    #[test]
    fn test_confirm_link_resets_status_and_timestamp() {
        let mut index = linked_index();
        index.find_link_mut("BR-001", "SR-010").unwrap().sync_status =
            SyncStatus::UpstreamChanged;
        confirm_link(&mut index, "BR-001", "SR-010").unwrap();
        let l = index.find_link("BR-001", "SR-010").unwrap();
        assert_eq!(l.sync_status, SyncStatus::Ok);
        assert_ne!(l.last_checked, TS);
    }

    #[test]
    fn test_confirm_link_unknown_pair() {
        let mut index = linked_index();
        let err = confirm_link(&mut index, "BR-001", "C-100").unwrap_err();
        assert!(matches!(err, TraceError::LinkNotFound { .. }));
    }

    #[test]
    fn test_confirm_node_resets_all_stale_links() {
        let mut index = linked_index();
        propagate_checksum_change(&mut index, "SR-010");
        let reset = confirm_node(&mut index, "SR-010").unwrap();
        assert_eq!(reset, 2);
        assert!(index.links.iter().all(|l| l.sync_status == SyncStatus::Ok));
    }

    #[test]
    fn test_confirm_node_unknown_id() {
        let mut index = linked_index();
        let err = confirm_node(&mut index, "ZZ-001").unwrap_err();
        assert!(matches!(err, TraceError::NodeNotFound(_)));
    }

    #[test]
    fn test_status_summary_groups_stale_links() {
        let mut index = linked_index();
        propagate_checksum_change(&mut index, "SR-010");
        let summary = status_summary(&index);
        assert_eq!(summary.total_nodes, 3);
        assert_eq!(summary.total_links, 2);
        assert_eq!(summary.stale_links, 2);
        assert_eq!(summary.upstream_changed.len(), 1);
        assert_eq!(summary.downstream_changed.len(), 1);
        assert!(summary.broken.is_empty());
        assert_eq!(summary.node_counts.get(&NodeType::Business), Some(&1));
    }

    #[test]
    fn test_find_orphans_by_type_convention() {
        let mut index = Index::new();
        index
            .nodes
            .insert("BR-001".into(), node("BR-001", NodeType::Business, "docs/brd.md"));
        index
            .nodes
            .insert("C-100".into(), node("C-100", NodeType::Code, "src/auth.py"));
        let report = find_orphans(&index);
        // BR-001 has no downstream, C-100 no upstream.
        assert_eq!(report.missing_downstream.len(), 1);
        assert_eq!(report.missing_downstream[0].id, "BR-001");
        assert_eq!(report.missing_upstream.len(), 1);
        assert_eq!(report.missing_upstream[0].id, "C-100");
    }

    #[test]
    fn test_find_orphans_none_when_linked() {
        let index = linked_index();
        assert!(find_orphans(&index).is_empty());
    }
}
