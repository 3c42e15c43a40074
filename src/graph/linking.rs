//! Link validation and creation rules.
//!
//! Two structural rules hold at all times:
//! - a node never links to itself, in any context;
//! - a cycle is tolerated only while every node in it lives in the same
//!   file (mutually recursive definitions), and rejected the moment it
//!   spans files.
//!
//! Links to ids that do not (yet) exist in the index pass validation,
//! since metadata blocks may declare endpoints scanned later. The
//! staleness tracker marks such links `broken` until the endpoint
//! appears.

use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::types::{Index, Link, Node, NodeType, RelationType};
use super::GraphView;
use crate::error::TraceError;
use crate::Result;

/// Check whether a `from -> to` link may be added to (or kept in) the index.
///
/// Self-references fail unconditionally. If the candidate edge closes a
/// cycle over existing links, the cycle is allowed only when every member
/// node resolves to the same file.
pub fn validate_link(index: &Index, from_id: &str, to_id: &str) -> Result<()> {
    if from_id == to_id {
        let file = index.nodes.get(from_id).map(|n| n.file.clone());
        return Err(TraceError::SelfReferential {
            node_id: from_id.to_string(),
            file,
        });
    }

    // The candidate edge closes a cycle iff `from` is reachable from `to`.
    if let Some(path) = find_path(index, to_id, from_id) {
        // path = to .. from; the full cycle is from -> to -> .. -> from.
        let mut cycle = vec![from_id.to_string()];
        cycle.extend(path);
        cycle.push(from_id.to_string());

        if !single_file_cycle(index, &cycle) {
            debug!(from = from_id, to = to_id, "rejecting cross-file cycle");
            return Err(TraceError::CircularDependency { cycle });
        }
        debug!(from = from_id, to = to_id, "allowing same-file cycle");
    }

    Ok(())
}

/// Find every cross-file cycle in the graph. Returns one representative
/// cycle per strongly connected component; cycles confined to a single
/// file are not reported.
pub fn detect_circular_dependencies(index: &Index) -> Vec<Vec<String>> {
    let view = GraphView::from_index(index);
    let mut cycles = Vec::new();

    for scc in petgraph::algo::tarjan_scc(view.inner()) {
        let non_trivial = scc.len() > 1
            || view
                .successors(scc[0])
                .any(|succ| succ == scc[0]);
        if !non_trivial {
            continue;
        }

        let mut members: Vec<String> = scc.iter().map(|&idx| view.id_of(idx).to_string()).collect();
        members.sort();
        let mut cycle = members.clone();
        cycle.push(cycle[0].clone());

        if !single_file_cycle(index, &cycle) {
            cycles.push(cycle);
        }
    }

    cycles.sort();
    cycles
}

/// Materialize the links a node's metadata declares. Edges always point
/// downstream: a declared upstream id becomes `upstream -> node`, a
/// declared downstream id becomes `node -> downstream`.
///
/// Fails fast on self-reference; everything else (including unknown ids)
/// produces a link.
pub fn build_links_from_metadata(index: &Index, node: &Node) -> Result<Vec<Link>> {
    let mut links = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for upstream_id in &node.upstream {
        if upstream_id == &node.id {
            return Err(self_reference(node));
        }
        if seen.insert((upstream_id.clone(), node.id.clone())) {
            let relation = default_relation(node.node_type);
            links.push(Link::new(upstream_id, &node.id, relation)?);
        }
    }

    for downstream_id in &node.downstream {
        if downstream_id == &node.id {
            return Err(self_reference(node));
        }
        if seen.insert((node.id.clone(), downstream_id.clone())) {
            let relation = index
                .nodes
                .get(downstream_id)
                .map(|target| default_relation(target.node_type))
                .unwrap_or(RelationType::Refines);
            links.push(Link::new(&node.id, downstream_id, relation)?);
        }
    }

    Ok(links)
}

/// Default relation for a link arriving at a node of the given type.
fn default_relation(downstream: NodeType) -> RelationType {
    match downstream {
        NodeType::Code => RelationType::Implements,
        NodeType::Test => RelationType::Tests,
        NodeType::Decision => RelationType::DerivedFrom,
        NodeType::Business | NodeType::System | NodeType::Architecture => RelationType::Refines,
    }
}

fn self_reference(node: &Node) -> TraceError {
    TraceError::SelfReferential {
        node_id: node.id.clone(),
        file: Some(node.file.clone()),
    }
}

/// True when every cycle member resolves to a node and all of them share
/// one file. A member with no node cannot be placed, so the cycle counts
/// as cross-file.
fn single_file_cycle(index: &Index, cycle: &[String]) -> bool {
    let mut files = HashSet::new();
    for id in cycle {
        match index.nodes.get(id) {
            Some(node) => {
                files.insert(node.file.as_str());
            }
            None => return false,
        }
    }
    files.len() == 1
}

/// Iterative DFS over existing links; returns the node sequence from
/// `start` to `goal` inclusive, if one exists.
fn find_path(index: &Index, start: &str, goal: &str) -> Option<Vec<String>> {
    let mut parents: HashMap<&str, &str> = HashMap::new();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack = vec![start];
    visited.insert(start);

    while let Some(current) = stack.pop() {
        if current == goal {
            let mut path = vec![goal.to_string()];
            let mut cursor = goal;
            while let Some(&parent) = parents.get(cursor) {
                path.push(parent.to_string());
                cursor = parent;
            }
            path.reverse();
            return Some(path);
        }
        for link in index.links_from(current) {
            let next = link.to_id.as_str();
            if visited.insert(next) {
                parents.insert(next, current);
                stack.push(next);
            }
        }
    }
    None
}
