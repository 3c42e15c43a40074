//! Repository configuration.
//!
//! `.tracegit/config.yaml` carries id prefixes per node type and the
//! default scan roots. It influences id assignment and path selection
//! only; graph invariants never read it. A missing file means defaults,
//! unknown keys are ignored.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::graph::types::NodeType;
use crate::Result;

pub const CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Node type -> id prefix for `id: auto` assignment.
    #[serde(default = "default_prefixes")]
    pub tag_prefixes: BTreeMap<NodeType, String>,
    /// Repo-relative directories scanned when no paths are given.
    #[serde(default = "default_directories")]
    pub directories: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tag_prefixes: default_prefixes(),
            directories: default_directories(),
        }
    }
}

fn default_prefixes() -> BTreeMap<NodeType, String> {
    BTreeMap::from([
        (NodeType::Business, "BR-".to_string()),
        (NodeType::System, "SR-".to_string()),
        (NodeType::Architecture, "AR-".to_string()),
        (NodeType::Code, "C-".to_string()),
        (NodeType::Test, "T-".to_string()),
        (NodeType::Decision, "DR-".to_string()),
    ])
}

fn default_directories() -> Vec<String> {
    vec![".".to_string()]
}

impl Config {
    /// Load from `<tracegit_dir>/config.yaml`, falling back to defaults
    /// when the file is absent.
    pub fn load(tracegit_dir: &Path) -> Result<Self> {
        let path = tracegit_dir.join(CONFIG_FILE);
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path)?;
        let config: Config = serde_yaml::from_str(&text)?;
        Ok(config)
    }

    /// Write to `<tracegit_dir>/config.yaml`.
    pub fn save(&self, tracegit_dir: &Path) -> Result<()> {
        let path = tracegit_dir.join(CONFIG_FILE);
        fs::write(&path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Id prefix for a node type.
    pub fn prefix_for(&self, node_type: NodeType) -> &str {
        self.tag_prefixes
            .get(&node_type)
            .map(String::as_str)
            .unwrap_or("N-")
    }
}
