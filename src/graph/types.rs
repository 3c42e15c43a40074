//! Core types for the traceability graph.
//!
//! Defines node and link types, sync states, and the in-memory index that
//! the engine operates on. Storage and canonicalization live in `store`;
//! these types only carry the data and its structural invariants.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::TraceError;

/// The kind of a traceability artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// A business requirement.
    Business,
    /// A system requirement.
    System,
    /// An architecture decision or design element.
    Architecture,
    /// A code unit.
    Code,
    /// A test case or suite.
    Test,
    /// A recorded decision.
    Decision,
}

impl NodeType {
    /// All known types, in display order.
    pub const ALL: [NodeType; 6] = [
        NodeType::Business,
        NodeType::System,
        NodeType::Architecture,
        NodeType::Code,
        NodeType::Test,
        NodeType::Decision,
    ];

    /// Whether convention expects this type to have at least one incoming
    /// (upstream) link. Business requirements are roots and do not.
    pub fn requires_upstream(&self) -> bool {
        !matches!(self, NodeType::Business)
    }

    /// Whether convention expects this type to have at least one outgoing
    /// (downstream) link. Leaf types (code, test, decision) do not.
    pub fn requires_downstream(&self) -> bool {
        matches!(
            self,
            NodeType::Business | NodeType::System | NodeType::Architecture
        )
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Business => write!(f, "business"),
            NodeType::System => write!(f, "system"),
            NodeType::Architecture => write!(f, "architecture"),
            NodeType::Code => write!(f, "code"),
            NodeType::Test => write!(f, "test"),
            NodeType::Decision => write!(f, "decision"),
        }
    }
}

impl FromStr for NodeType {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "business" => Ok(NodeType::Business),
            "system" => Ok(NodeType::System),
            "architecture" => Ok(NodeType::Architecture),
            "code" => Ok(NodeType::Code),
            "test" => Ok(NodeType::Test),
            "decision" => Ok(NodeType::Decision),
            other => Err(TraceError::InvalidMetadata {
                file: String::new(),
                line: 0,
                message: format!("unknown node type '{other}'"),
            }),
        }
    }
}

/// Lifecycle tag of a node. Unrecognized values survive a reload as
/// `Unknown` rather than failing the whole index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    #[default]
    Draft,
    Active,
    Deprecated,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeStatus::Draft => write!(f, "draft"),
            NodeStatus::Active => write!(f, "active"),
            NodeStatus::Deprecated => write!(f, "deprecated"),
            NodeStatus::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for NodeStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "active" => NodeStatus::Active,
            "deprecated" => NodeStatus::Deprecated,
            "draft" => NodeStatus::Draft,
            _ => NodeStatus::Unknown,
        })
    }
}

/// The kind of relationship a link expresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Refines,
    Implements,
    Tests,
    DerivedFrom,
    DependsOn,
}

impl RelationType {
    /// Comma-separated list of valid names, for error messages.
    pub const VALID_NAMES: &'static str = "refines, implements, tests, derived_from, depends_on";
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationType::Refines => write!(f, "refines"),
            RelationType::Implements => write!(f, "implements"),
            RelationType::Tests => write!(f, "tests"),
            RelationType::DerivedFrom => write!(f, "derived_from"),
            RelationType::DependsOn => write!(f, "depends_on"),
        }
    }
}

impl FromStr for RelationType {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "refines" => Ok(RelationType::Refines),
            "implements" => Ok(RelationType::Implements),
            "tests" => Ok(RelationType::Tests),
            "derived_from" => Ok(RelationType::DerivedFrom),
            "depends_on" => Ok(RelationType::DependsOn),
            other => Err(TraceError::InvalidRelationType {
                given: other.to_string(),
                valid: RelationType::VALID_NAMES.to_string(),
            }),
        }
    }
}

/// Per-link freshness state, derived from endpoint checksums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Ok,
    UpstreamChanged,
    DownstreamChanged,
    Broken,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Ok => write!(f, "ok"),
            SyncStatus::UpstreamChanged => write!(f, "upstream_changed"),
            SyncStatus::DownstreamChanged => write!(f, "downstream_changed"),
            SyncStatus::Broken => write!(f, "broken"),
        }
    }
}

/// Where a metadata block sits inside its source file: a heading path for
/// structured documents, a line number for code-like formats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Location {
    Heading { heading_path: Vec<String> },
    Line { line: usize },
}

impl Location {
    pub fn heading(path: Vec<String>) -> Self {
        Location::Heading { heading_path: path }
    }

    pub fn line(line: usize) -> Self {
        Location::Line { line }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Heading { heading_path } => write!(f, "heading {:?}", heading_path),
            Location::Line { line } => write!(f, "line {line}"),
        }
    }
}

/// A single traceability artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Globally unique id, `<prefix><zero-padded-number>` (e.g. `BR-001`).
    /// Immutable once assigned.
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub title: String,
    /// Repository-relative path of the file the block was extracted from.
    pub file: String,
    pub location: Location,
    #[serde(default)]
    pub status: NodeStatus,
    /// ISO-8601 timestamp of the last metadata change.
    pub last_updated: String,
    /// 64-hex-char digest of the normalized source snippet.
    pub checksum: String,
    /// Free-form tags, kept sorted for determinism.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub llm_generated: bool,
    /// Declared upstream ids, as written in the metadata block.
    #[serde(default)]
    pub upstream: Vec<String>,
    /// Declared downstream ids.
    #[serde(default)]
    pub downstream: Vec<String>,
}

impl Node {
    /// Replace the tag set, keeping it sorted and deduplicated.
    pub fn set_tags(&mut self, mut tags: Vec<String>) {
        tags.sort();
        tags.dedup();
        self.tags = tags;
    }
}

/// A directed, typed edge between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    #[serde(rename = "from")]
    pub from_id: String,
    #[serde(rename = "to")]
    pub to_id: String,
    pub relation_type: RelationType,
    pub sync_status: SyncStatus,
    /// ISO-8601 timestamp of the last validation or confirmation.
    pub last_checked: String,
}

impl Link {
    /// Create a link, enforcing the structural invariant `from != to`.
    /// Sync status starts as `ok`: the act of linking acknowledges the
    /// current state of both endpoints.
    pub fn new(from_id: &str, to_id: &str, relation_type: RelationType) -> crate::Result<Self> {
        if from_id == to_id {
            return Err(TraceError::SelfReferential {
                node_id: from_id.to_string(),
                file: None,
            });
        }
        Ok(Self::prevalidated(
            from_id,
            to_id,
            relation_type,
            SyncStatus::Ok,
            now_iso(),
        ))
    }

    /// Construct without the self-reference check. Only for reloading
    /// already-persisted data and for test fixtures; this bypass is not
    /// part of the public command surface and is never persisted.
    pub(crate) fn prevalidated(
        from_id: &str,
        to_id: &str,
        relation_type: RelationType,
        sync_status: SyncStatus,
        last_checked: String,
    ) -> Self {
        Self {
            from_id: from_id.to_string(),
            to_id: to_id.to_string(),
            relation_type,
            sync_status,
            last_checked,
        }
    }

    /// Identity key for in-place updates.
    pub fn key(&self) -> (&str, &str) {
        (&self.from_id, &self.to_id)
    }
}

/// The whole traceability graph: nodes by id plus an ordered link list.
///
/// Referential integrity is reported, not enforced: a link may reference an
/// id with no node. That is a validation finding, and the staleness tracker
/// marks such links `broken`.
#[derive(Debug, Clone, Default)]
pub struct Index {
    pub nodes: HashMap<String, Node>,
    pub links: Vec<Link>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Look up a node, failing with `NodeNotFound` if absent.
    pub fn require_node(&self, id: &str) -> crate::Result<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| TraceError::NodeNotFound(id.to_string()))
    }

    pub fn find_link(&self, from_id: &str, to_id: &str) -> Option<&Link> {
        self.links
            .iter()
            .find(|l| l.from_id == from_id && l.to_id == to_id)
    }

    pub fn find_link_mut(&mut self, from_id: &str, to_id: &str) -> Option<&mut Link> {
        self.links
            .iter_mut()
            .find(|l| l.from_id == from_id && l.to_id == to_id)
    }

    /// Links whose source is the given node.
    pub fn links_from<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Link> {
        self.links.iter().filter(move |l| l.from_id == id)
    }

    /// Links whose target is the given node.
    pub fn links_to<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Link> {
        self.links.iter().filter(move |l| l.to_id == id)
    }

    /// Next sequential id for a prefix: highest existing numeric suffix
    /// plus one, zero-padded to three digits.
    pub fn next_id(&self, prefix: &str) -> String {
        let max = self
            .nodes
            .keys()
            .filter_map(|id| id.strip_prefix(prefix))
            .filter_map(|n| n.parse::<u32>().ok())
            .max()
            .unwrap_or(0);
        format!("{}{:03}", prefix, max + 1)
    }
}

/// Current UTC time as an ISO-8601 string with a `Z` suffix.
pub fn now_iso() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub const TS: &str = "2025-12-02T18:00:00Z";

    /// Minimal node for tests.
    pub fn node(id: &str, node_type: NodeType, file: &str) -> Node {
        Node {
            id: id.to_string(),
            node_type,
            title: format!("{id} title"),
            file: file.to_string(),
            location: Location::heading(vec!["Section".to_string()]),
            status: NodeStatus::Active,
            last_updated: TS.to_string(),
            checksum: "a".repeat(64),
            tags: vec![],
            llm_generated: false,
            upstream: vec![],
            downstream: vec![],
        }
    }

    /// Pre-validated link for tests (skips the self-reference check).
    pub fn link(from: &str, to: &str, relation: RelationType, status: SyncStatus) -> Link {
        Link::prevalidated(from, to, relation, status, TS.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_link_new_rejects_self_reference() {
        let err = Link::new("SR-001", "SR-001", RelationType::Refines).unwrap_err();
        assert!(matches!(err, TraceError::SelfReferential { .. }));
        assert!(err.to_string().contains("SR-001"));
    }

    #[test]
    fn test_link_prevalidated_skips_check() {
        // Reload path for already-persisted data.
        let l = link("SR-001", "SR-001", RelationType::Refines, SyncStatus::Ok);
        assert_eq!(l.from_id, l.to_id);
    }

    #[test]
    fn test_link_serializes_from_to_keys() {
        let l = link("SR-001", "SR-002", RelationType::Refines, SyncStatus::Ok);
        let yaml = serde_yaml::to_string(&l).unwrap();
        assert!(yaml.contains("from: SR-001"));
        assert!(yaml.contains("to: SR-002"));
        assert!(yaml.contains("relation_type: refines"));
        assert!(yaml.contains("sync_status: ok"));
    }

    #[test]
    fn test_location_serde_forms() {
        let heading: Location = serde_yaml::from_str("heading_path: [\"A\", \"B\"]").unwrap();
        assert_eq!(heading, Location::heading(vec!["A".into(), "B".into()]));

        let line: Location = serde_yaml::from_str("line: 42").unwrap();
        assert_eq!(line, Location::line(42));
    }

    #[test]
    fn test_node_status_unknown_survives_reload() {
        let status: NodeStatus = serde_yaml::from_str("superseded").unwrap();
        assert_eq!(status, NodeStatus::Unknown);
    }

    #[test]
    fn test_next_id_sequences_per_prefix() {
        let mut index = Index::new();
        assert_eq!(index.next_id("SR-"), "SR-001");

        index
            .nodes
            .insert("SR-009".into(), node("SR-009", NodeType::System, "a.md"));
        index
            .nodes
            .insert("SR-010".into(), node("SR-010", NodeType::System, "a.md"));
        index
            .nodes
            .insert("BR-777".into(), node("BR-777", NodeType::Business, "b.md"));
        assert_eq!(index.next_id("SR-"), "SR-011");
        assert_eq!(index.next_id("C-"), "C-001");
    }

    #[test]
    fn test_set_tags_sorts_and_dedups() {
        let mut n = node("SR-001", NodeType::System, "a.md");
        n.set_tags(vec!["beta".into(), "alpha".into(), "beta".into()]);
        assert_eq!(n.tags, vec!["alpha".to_string(), "beta".to_string()]);
    }

    #[test]
    fn test_orphan_conventions_per_type() {
        assert!(!NodeType::Business.requires_upstream());
        assert!(NodeType::Business.requires_downstream());
        assert!(NodeType::System.requires_upstream());
        assert!(NodeType::System.requires_downstream());
        assert!(NodeType::Code.requires_upstream());
        assert!(!NodeType::Code.requires_downstream());
        assert!(!NodeType::Test.requires_downstream());
    }

    #[test]
    fn test_relation_type_parse_error_lists_valid() {
        let err = "invalid_type".parse::<RelationType>().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("invalid relation type: invalid_type"));
        assert!(msg.contains("refines"));
        assert!(msg.contains("implements"));
    }
}
