//! Bounded graph traversals.
//!
//! Two read-only questions the graph answers:
//! - **impact**: starting from a node, what lies downstream and would need
//!   review if this node changed?
//! - **relevance**: starting from a file, what upstream context explains
//!   why its nodes exist?
//!
//! Both are breadth-first walks with a depth bound, so distances are
//! minimal by construction. Link endpoints with no backing node are
//! skipped; they carry no title or file to report.

use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

use super::types::{Index, Node, NodeType, RelationType, SyncStatus};
use crate::Result;

/// Default depth for impact analysis.
pub const DEFAULT_IMPACT_DEPTH: usize = 2;
/// Default depth for relevance lookup.
pub const DEFAULT_RELEVANT_DEPTH: usize = 3;

/// A node reached at distance 1 in an impact walk, with the relation of
/// the link that reached it.
#[derive(Debug, Clone, Serialize)]
pub struct DirectImpact {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub title: String,
    pub file: String,
    pub relation_type: RelationType,
    pub sync_status: SyncStatus,
}

/// A node reached at distance 2 or more.
#[derive(Debug, Clone, Serialize)]
pub struct IndirectImpact {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub title: String,
    pub file: String,
    pub distance: usize,
}

/// Everything downstream of one node, bounded by depth.
#[derive(Debug, Clone, Serialize)]
pub struct ImpactResult {
    pub origin: Node,
    pub depth: usize,
    pub direct: Vec<DirectImpact>,
    pub indirect: Vec<IndirectImpact>,
    /// Sorted, deduplicated; always contains the origin's own file.
    pub affected_files: Vec<String>,
}

impl ImpactResult {
    pub fn total_affected(&self) -> usize {
        self.direct.len() + self.indirect.len()
    }
}

/// Walk downstream from `node_id`, collecting everything within `depth`
/// hops. Unknown origin ids fail with `NodeNotFound`.
pub fn analyze_impact(index: &Index, node_id: &str, depth: usize) -> Result<ImpactResult> {
    let origin = index.require_node(node_id)?.clone();
    debug!(node = node_id, depth, "analyzing downstream impact");

    let mut direct = Vec::new();
    let mut indirect = Vec::new();
    let mut affected_files: HashSet<String> = HashSet::new();
    affected_files.insert(origin.file.clone());

    let mut visited: HashSet<&str> = HashSet::new();
    visited.insert(node_id);
    let mut queue: VecDeque<(&str, usize)> = VecDeque::new();
    queue.push_back((node_id, 0));

    while let Some((current, dist)) = queue.pop_front() {
        if dist >= depth {
            continue;
        }
        for link in index.links_from(current) {
            let next_id = link.to_id.as_str();
            if !visited.insert(next_id) {
                continue;
            }
            let next_dist = dist + 1;
            if let Some(node) = index.nodes.get(next_id) {
                affected_files.insert(node.file.clone());
                if next_dist == 1 {
                    direct.push(DirectImpact {
                        id: node.id.clone(),
                        node_type: node.node_type,
                        title: node.title.clone(),
                        file: node.file.clone(),
                        relation_type: link.relation_type,
                        sync_status: link.sync_status,
                    });
                } else {
                    indirect.push(IndirectImpact {
                        id: node.id.clone(),
                        node_type: node.node_type,
                        title: node.title.clone(),
                        file: node.file.clone(),
                        distance: next_dist,
                    });
                }
                queue.push_back((next_id, next_dist));
            }
        }
    }

    direct.sort_by(|a, b| a.id.cmp(&b.id));
    indirect.sort_by(|a, b| a.distance.cmp(&b.distance).then_with(|| a.id.cmp(&b.id)));
    let mut affected_files: Vec<String> = affected_files.into_iter().collect();
    affected_files.sort();

    Ok(ImpactResult {
        origin,
        depth,
        direct,
        indirect,
        affected_files,
    })
}

/// One node in a relevance result: the node plus its minimal upstream
/// distance from the queried file (0 = defined in that file).
#[derive(Debug, Clone, Serialize)]
pub struct RelevantNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub title: String,
    pub file: String,
    pub distance: usize,
}

/// Upstream context for one file.
#[derive(Debug, Clone, Serialize)]
pub struct RelevantResult {
    pub file: String,
    pub depth: usize,
    /// Sorted by (distance, id). Empty when no node maps to the file.
    pub nodes: Vec<RelevantNode>,
}

/// Walk upstream from every node defined in `file`, collecting context
/// within `depth` hops. A file with no nodes yields an empty result, not
/// an error.
pub fn find_relevant(index: &Index, file: &str, depth: usize) -> RelevantResult {
    debug!(file, depth, "collecting upstream context");

    // Minimal distance per id; seeds at 0.
    let mut distances: HashMap<&str, usize> = HashMap::new();
    let mut queue: VecDeque<(&str, usize)> = VecDeque::new();

    for node in index.nodes.values() {
        if node.file == file {
            distances.insert(node.id.as_str(), 0);
            queue.push_back((node.id.as_str(), 0));
        }
    }

    while let Some((current, dist)) = queue.pop_front() {
        if dist >= depth {
            continue;
        }
        for link in index.links_to(current) {
            let up_id = link.from_id.as_str();
            let next_dist = dist + 1;
            if !distances.contains_key(up_id) {
                distances.insert(up_id, next_dist);
                queue.push_back((up_id, next_dist));
            }
        }
    }

    let mut nodes: Vec<RelevantNode> = distances
        .iter()
        .filter_map(|(&id, &distance)| {
            index.nodes.get(id).map(|node| RelevantNode {
                id: node.id.clone(),
                node_type: node.node_type,
                title: node.title.clone(),
                file: node.file.clone(),
                distance,
            })
        })
        .collect();
    nodes.sort_by(|a, b| a.distance.cmp(&b.distance).then_with(|| a.id.cmp(&b.id)));

    RelevantResult {
        file: file.to_string(),
        depth,
        nodes,
    }
}
