//! Markdown scanner.
//!
//! Two carriers: a `tracegit:` mapping inside YAML front matter, and
//! `<!-- tracegit ... -->` HTML comment blocks anywhere in the document.
//! A comment block belongs to the section it sits in; the section text
//! (from the nearest preceding heading to the next heading) is what the
//! checksum covers, so editing the requirement prose marks it changed.

use super::{block_from_yaml, MetadataBlock, Scanner, TAG};
use crate::graph::types::Location;
use crate::Result;

pub struct MarkdownScanner;

impl Scanner for MarkdownScanner {
    fn supported_extensions(&self) -> &'static [&'static str] {
        &["md", "markdown"]
    }

    fn extract(&self, content: &str, file: &str) -> Result<Vec<MetadataBlock>> {
        let mut blocks = Vec::new();
        let lines: Vec<&str> = content.lines().collect();

        let body_start = self.extract_front_matter(&lines, content, file, &mut blocks)?;
        self.extract_comment_blocks(&lines, body_start, file, &mut blocks)?;

        Ok(blocks)
    }
}

impl MarkdownScanner {
    /// Parse a leading `--- ... ---` block. Only documents whose front
    /// matter carries a `tracegit` key yield a block; anything else is
    /// someone else's front matter and is skipped. Returns the index of
    /// the first body line.
    fn extract_front_matter(
        &self,
        lines: &[&str],
        content: &str,
        file: &str,
        blocks: &mut Vec<MetadataBlock>,
    ) -> Result<usize> {
        if lines.first().map(|l| l.trim()) != Some("---") {
            return Ok(0);
        }
        let Some(close) = lines[1..].iter().position(|l| l.trim() == "---") else {
            return Ok(0);
        };
        let close = close + 1;
        let yaml = lines[1..close].join("\n");

        let Ok(value) = serde_yaml::from_str::<serde_yaml::Value>(&yaml) else {
            // Unparseable front matter is not ours to report.
            return Ok(close + 1);
        };
        if let Some(payload) = value.get(TAG) {
            let payload_yaml = serde_yaml::to_string(payload)?;
            blocks.push(block_from_yaml(
                &payload_yaml,
                file,
                2,
                content.to_string(),
                Location::heading(vec![]),
            )?);
        }
        Ok(close + 1)
    }

    fn extract_comment_blocks(
        &self,
        lines: &[&str],
        start: usize,
        file: &str,
        blocks: &mut Vec<MetadataBlock>,
    ) -> Result<()> {
        let mut heading_stack: Vec<(usize, String)> = Vec::new();
        // Line index of the heading currently in scope.
        let mut section_start = start;

        let mut i = start;
        while i < lines.len() {
            let line = lines[i].trim();

            if let Some((level, title)) = parse_heading(line) {
                while heading_stack.last().is_some_and(|(l, _)| *l >= level) {
                    heading_stack.pop();
                }
                heading_stack.push((level, title));
                section_start = i;
                i += 1;
                continue;
            }

            if let Some(rest) = line.strip_prefix("<!--") {
                let rest = rest.trim_start();
                let tagged = rest
                    .strip_prefix(TAG)
                    .is_some_and(|r| r.is_empty() || r.starts_with(char::is_whitespace));
                if tagged {
                    if let Some((yaml, end)) = collect_comment(lines, i, rest) {
                        let section_end = lines[end + 1..]
                            .iter()
                            .position(|l| parse_heading(l.trim()).is_some())
                            .map(|off| end + 1 + off)
                            .unwrap_or(lines.len());
                        let raw_content = lines[section_start..section_end].join("\n");
                        let path: Vec<String> =
                            heading_stack.iter().map(|(_, t)| t.clone()).collect();
                        blocks.push(block_from_yaml(
                            &yaml,
                            file,
                            i + 1,
                            raw_content,
                            Location::heading(path),
                        )?);
                        i = end + 1;
                        continue;
                    }
                }
            }
            i += 1;
        }
        Ok(())
    }
}

fn parse_heading(line: &str) -> Option<(usize, String)> {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &line[hashes..];
    if !rest.starts_with(' ') {
        return None;
    }
    Some((hashes, rest.trim().to_string()))
}

/// Gather the YAML inside a `<!-- tracegit ... -->` comment starting at
/// line `open`. Returns the payload and the index of the closing line.
fn collect_comment(lines: &[&str], open: usize, after_marker: &str) -> Option<(String, usize)> {
    // Text on the opening line after the tag itself.
    let first = after_marker.strip_prefix(TAG)?.trim_start();

    if let Some(inline) = first.strip_suffix("-->") {
        // Single-line form: <!-- tracegit id: X ... -->
        return Some((inline.trim().to_string(), open));
    }

    let mut payload = Vec::new();
    if !first.is_empty() {
        payload.push(first.to_string());
    }
    for (offset, raw) in lines[open + 1..].iter().enumerate() {
        let line = raw.trim_end();
        if let Some(before) = line.trim().strip_suffix("-->") {
            if !before.trim().is_empty() {
                payload.push(before.trim_end().to_string());
            }
            return Some((payload.join("\n"), open + 1 + offset));
        }
        payload.push(line.to_string());
    }
    None
}
