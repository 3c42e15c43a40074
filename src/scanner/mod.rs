//! Metadata extraction from source files.
//!
//! Each supported format gets one [`Scanner`]; the registry dispatches by
//! file extension (case-insensitive). Scanners only find blocks and parse
//! their payloads; id assignment and graph updates happen in `ingest`.
//!
//! All formats share one payload shape: a YAML mapping with required
//! `id`, `type`, and `title`, plus the optional fields below. `upstream`,
//! `downstream`, and `tags` accept either a scalar string or a list. The
//! one-line `@tracegit key=value` form is a flat rendering of the same
//! mapping, recognized inside `#` and `//` comments.

pub mod gherkin;
pub mod javascript;
pub mod markdown;
pub mod python;

pub use gherkin::GherkinScanner;
pub use javascript::JavaScriptScanner;
pub use markdown::MarkdownScanner;
pub use python::PythonScanner;

use serde::Deserialize;
use std::collections::HashMap;
use tracing::debug;

use crate::error::TraceError;
use crate::graph::types::{Location, NodeStatus, NodeType};
use crate::Result;

/// The sentinel that opens every metadata block, in all formats.
pub const TAG: &str = "tracegit";

/// One extracted metadata block, format-independent.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataBlock {
    /// Declared id, or the literal `auto` awaiting assignment.
    pub id: String,
    pub node_type: NodeType,
    pub title: String,
    pub status: NodeStatus,
    pub tags: Vec<String>,
    pub upstream: Vec<String>,
    pub downstream: Vec<String>,
    pub llm_generated: bool,
    /// Source text the checksum is computed over.
    pub raw_content: String,
    /// 1-based line the block starts on.
    pub line_number: usize,
    pub location: Location,
}

impl MetadataBlock {
    /// Whether the block asks for sequential id assignment.
    pub fn wants_auto_id(&self) -> bool {
        self.id == "auto"
    }
}

/// A format-specific extractor.
pub trait Scanner: Send + Sync {
    /// Lowercase extensions (without dot) this scanner handles.
    fn supported_extensions(&self) -> &'static [&'static str];

    /// Extract every metadata block from `content`. `file` is the
    /// repo-relative path, used in error messages and locations.
    fn extract(&self, content: &str, file: &str) -> Result<Vec<MetadataBlock>>;
}

/// Extension -> scanner dispatch. Unknown extensions simply have no
/// scanner; callers skip those files.
pub struct ScannerRegistry {
    scanners: Vec<Box<dyn Scanner>>,
    by_extension: HashMap<String, usize>,
}

impl ScannerRegistry {
    /// Registry with all built-in scanners.
    pub fn with_defaults() -> Self {
        let mut registry = Self {
            scanners: Vec::new(),
            by_extension: HashMap::new(),
        };
        registry.register(Box::new(MarkdownScanner));
        registry.register(Box::new(PythonScanner));
        registry.register(Box::new(JavaScriptScanner));
        registry.register(Box::new(GherkinScanner));
        registry
    }

    pub fn register(&mut self, scanner: Box<dyn Scanner>) {
        let idx = self.scanners.len();
        for ext in scanner.supported_extensions() {
            self.by_extension.insert(ext.to_string(), idx);
        }
        self.scanners.push(scanner);
    }

    /// Scanner for a file extension, matched case-insensitively.
    pub fn for_extension(&self, ext: &str) -> Option<&dyn Scanner> {
        self.by_extension
            .get(&ext.to_lowercase())
            .map(|&idx| self.scanners[idx].as_ref())
    }

    /// Whether any scanner handles this extension.
    pub fn supports_extension(&self, ext: &str) -> bool {
        self.by_extension.contains_key(&ext.to_lowercase())
    }
}

/// A field that may be written as a scalar or a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(s) => vec![s],
            OneOrMany::Many(v) => v,
        }
    }
}

/// The YAML payload as written in a block, before validation.
#[derive(Debug, Default, Deserialize)]
struct RawPayload {
    id: Option<String>,
    #[serde(rename = "type")]
    node_type: Option<String>,
    title: Option<String>,
    status: Option<String>,
    tags: Option<OneOrMany>,
    upstream: Option<OneOrMany>,
    downstream: Option<OneOrMany>,
    llm_generated: Option<bool>,
}

fn invalid(file: &str, line: usize, message: impl Into<String>) -> TraceError {
    TraceError::InvalidMetadata {
        file: file.to_string(),
        line,
        message: message.into(),
    }
}

/// Parse a YAML payload into a block, enforcing the required fields.
/// `raw_content` and `location` come from the caller; only the payload
/// semantics live here.
pub(crate) fn block_from_yaml(
    yaml: &str,
    file: &str,
    line_number: usize,
    raw_content: String,
    location: Location,
) -> Result<MetadataBlock> {
    let payload: RawPayload = serde_yaml::from_str(yaml)
        .map_err(|e| invalid(file, line_number, format!("malformed metadata: {e}")))?;
    block_from_payload(payload, file, line_number, raw_content, location)
}

fn block_from_payload(
    payload: RawPayload,
    file: &str,
    line_number: usize,
    raw_content: String,
    location: Location,
) -> Result<MetadataBlock> {
    let id = payload
        .id
        .ok_or_else(|| invalid(file, line_number, "missing required field 'id'"))?;
    let type_name = payload
        .node_type
        .ok_or_else(|| invalid(file, line_number, "missing required field 'type'"))?;
    let title = payload
        .title
        .ok_or_else(|| invalid(file, line_number, "missing required field 'title'"))?;

    let node_type: NodeType = type_name.parse().map_err(|_| {
        invalid(
            file,
            line_number,
            format!("unknown node type '{type_name}'"),
        )
    })?;
    let status = payload
        .status
        .map(|s| s.parse::<NodeStatus>().unwrap_or(NodeStatus::Unknown))
        .unwrap_or_default();

    debug!(file, line = line_number, id = %id, "extracted metadata block");

    Ok(MetadataBlock {
        id,
        node_type,
        title,
        status,
        tags: payload.tags.map(OneOrMany::into_vec).unwrap_or_default(),
        upstream: payload.upstream.map(OneOrMany::into_vec).unwrap_or_default(),
        downstream: payload
            .downstream
            .map(OneOrMany::into_vec)
            .unwrap_or_default(),
        llm_generated: payload.llm_generated.unwrap_or(false),
        raw_content,
        line_number,
        location,
    })
}

/// Parse the one-line form: `@tracegit id=C-001 type=code title="..."`.
/// Values may be double-quoted; list fields split on commas.
pub(crate) fn block_from_keyvalues(
    text: &str,
    file: &str,
    line_number: usize,
    raw_content: String,
    location: Location,
) -> Result<MetadataBlock> {
    let mut payload = RawPayload::default();
    for (key, value) in split_keyvalues(text, file, line_number)? {
        match key.as_str() {
            "id" => payload.id = Some(value),
            "type" => payload.node_type = Some(value),
            "title" => payload.title = Some(value),
            "status" => payload.status = Some(value),
            "tags" => payload.tags = Some(OneOrMany::Many(split_list(&value))),
            "upstream" => payload.upstream = Some(OneOrMany::Many(split_list(&value))),
            "downstream" => payload.downstream = Some(OneOrMany::Many(split_list(&value))),
            "llm_generated" => payload.llm_generated = Some(value == "true"),
            other => {
                return Err(invalid(
                    file,
                    line_number,
                    format!("unknown field '{other}'"),
                ))
            }
        }
    }
    block_from_payload(payload, file, line_number, raw_content, location)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Tokenize `key=value` pairs, honoring double quotes around values.
fn split_keyvalues(text: &str, file: &str, line: usize) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let mut key = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' {
                break;
            }
            if c.is_whitespace() {
                return Err(invalid(file, line, format!("expected '=' after '{key}'")));
            }
            key.push(c);
            chars.next();
        }
        if chars.next() != Some('=') {
            return Err(invalid(file, line, format!("expected '=' after '{key}'")));
        }
        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '"' {
                    closed = true;
                    break;
                }
                value.push(c);
            }
            if !closed {
                return Err(invalid(file, line, "unterminated quoted value"));
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                value.push(c);
                chars.next();
            }
        }
        pairs.push((key, value));
    }
    Ok(pairs)
}
