//! JavaScript / TypeScript scanner.
//!
//! Carriers: JSDoc blocks whose body contains a `tracegit:` mapping
//! (other JSDoc tags in the same block are tolerated), and the one-line
//! `// @tracegit key=value` form.

use super::python::mapping_after_tag;
use super::{block_from_keyvalues, MetadataBlock, Scanner, TAG};
use crate::graph::types::Location;
use crate::Result;

pub struct JavaScriptScanner;

impl Scanner for JavaScriptScanner {
    fn supported_extensions(&self) -> &'static [&'static str] {
        &["js", "jsx", "ts", "tsx", "mjs", "cjs"]
    }

    fn extract(&self, content: &str, file: &str) -> Result<Vec<MetadataBlock>> {
        let mut blocks = Vec::new();
        let lines: Vec<&str> = content.lines().collect();

        let mut i = 0;
        while i < lines.len() {
            let trimmed = lines[i].trim();

            if let Some(rest) = trimmed.strip_prefix("// @") {
                if let Some(kv) = rest.strip_prefix(TAG) {
                    blocks.push(block_from_keyvalues(
                        kv.trim(),
                        file,
                        i + 1,
                        lines[i].to_string(),
                        Location::line(i + 1),
                    )?);
                    i += 1;
                    continue;
                }
            }

            if trimmed.starts_with("/**") {
                if let Some((body, end)) = collect_jsdoc(&lines, i) {
                    if let Some((yaml, tag_line)) = mapping_after_tag(&body) {
                        // body[n] sits on source line open + 2 + n.
                        blocks.push(super::block_from_yaml(
                            &yaml,
                            file,
                            i + 2 + tag_line,
                            body.join("\n"),
                            Location::line(i + 1),
                        )?);
                    }
                    i = end + 1;
                    continue;
                }
            }

            i += 1;
        }

        Ok(blocks)
    }
}

/// Gather a JSDoc body starting at `open`, stripping comment decoration.
/// Returns the body lines and the index of the closing line.
fn collect_jsdoc(lines: &[&str], open: usize) -> Option<(Vec<String>, usize)> {
    let mut body = Vec::new();

    // Anything after /** on the opening line.
    let first = lines[open].trim().trim_start_matches("/**").trim();
    if let Some(inline) = first.strip_suffix("*/") {
        return Some((vec![inline.trim().to_string()], open));
    }
    if !first.is_empty() {
        body.push(first.to_string());
    }

    for (offset, raw) in lines[open + 1..].iter().enumerate() {
        let trimmed = raw.trim_start();
        if trimmed.starts_with("*/") {
            return Some((body, open + 1 + offset));
        }
        let stripped = trimmed
            .strip_prefix('*')
            .map(|r| r.strip_prefix(' ').unwrap_or(r))
            .unwrap_or(trimmed);
        body.push(stripped.to_string());
    }
    None
}
