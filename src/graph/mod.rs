//! Traceability graph module, the structural backbone of tracegit.
//!
//! Provides the graph data model, link validation, staleness tracking,
//! and bounded traversals (impact and relevance).

pub mod linking;
pub mod staleness;
pub mod traversal;
pub mod types;

pub use linking::{build_links_from_metadata, detect_circular_dependencies, validate_link};
pub use staleness::{
    confirm_link, confirm_node, find_orphans, mark_broken_links, propagate_checksum_change,
    status_summary, OrphanReport, StatusSummary,
};
pub use traversal::{analyze_impact, find_relevant, ImpactResult, RelevantNode, RelevantResult};
pub use types::{
    now_iso, Index, Link, Location, Node, NodeStatus, NodeType, RelationType, SyncStatus,
};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashMap;

/// A petgraph view over an [`Index`], built on demand by validation and
/// traversal. Node weights are ids; ids that appear only in links (dangling
/// endpoints) get a vertex too, so cycle checks see every edge.
pub(crate) struct GraphView {
    graph: DiGraph<String, RelationType>,
    by_id: HashMap<String, NodeIndex>,
}

impl GraphView {
    /// Build the view from every node and link in the index.
    pub fn from_index(index: &Index) -> Self {
        let mut view = Self {
            graph: DiGraph::new(),
            by_id: HashMap::new(),
        };
        for id in index.nodes.keys() {
            view.intern(id);
        }
        for link in &index.links {
            let from = view.intern(&link.from_id);
            let to = view.intern(&link.to_id);
            view.graph.add_edge(from, to, link.relation_type);
        }
        view
    }

    fn intern(&mut self, id: &str) -> NodeIndex {
        if let Some(&idx) = self.by_id.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(id.to_string());
        self.by_id.insert(id.to_string(), idx);
        idx
    }

    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.by_id.get(id).copied()
    }

    pub fn id_of(&self, idx: NodeIndex) -> &str {
        &self.graph[idx]
    }

    /// Ids reachable over one outgoing edge.
    pub fn successors<'a>(&'a self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + 'a {
        self.graph.neighbors_directed(idx, Direction::Outgoing)
    }

    /// Ids reachable over one incoming edge, walked backwards.
    pub fn predecessors<'a>(&'a self, idx: NodeIndex) -> impl Iterator<Item = NodeIndex> + 'a {
        self.graph.neighbors_directed(idx, Direction::Incoming)
    }

    pub fn inner(&self) -> &DiGraph<String, RelationType> {
        &self.graph
    }
}
