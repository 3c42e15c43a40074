//! Python scanner.
//!
//! Three carriers: a `tracegit:` mapping inside the module docstring,
//! `# tracegit:` comment blocks, and the one-line `# @tracegit key=value`
//! form. The block's own text is what the checksum covers.

use super::{block_from_keyvalues, block_from_yaml, MetadataBlock, Scanner, TAG};
use crate::graph::types::Location;
use crate::Result;

pub struct PythonScanner;

impl Scanner for PythonScanner {
    fn supported_extensions(&self) -> &'static [&'static str] {
        &["py", "pyw"]
    }

    fn extract(&self, content: &str, file: &str) -> Result<Vec<MetadataBlock>> {
        let mut blocks = Vec::new();
        let lines: Vec<&str> = content.lines().collect();

        self.extract_docstring(&lines, file, &mut blocks)?;

        let mut i = 0;
        while i < lines.len() {
            let trimmed = lines[i].trim();

            if let Some(rest) = trimmed.strip_prefix("# @") {
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

            if trimmed == format!("# {TAG}:") {
                let (block, end) = self.collect_comment_block(&lines, i, file)?;
                blocks.push(block);
                i = end;
                continue;
            }

            i += 1;
        }

        Ok(blocks)
    }
}

impl PythonScanner {
    /// A `tracegit:` mapping inside the module docstring. Only the first
    /// string literal in the file counts as the module docstring.
    fn extract_docstring(
        &self,
        lines: &[&str],
        file: &str,
        blocks: &mut Vec<MetadataBlock>,
    ) -> Result<()> {
        let Some((start, quote)) = find_docstring_open(lines) else {
            return Ok(());
        };

        // Body spans from after the opening quote to the closing quote.
        let mut body: Vec<String> = Vec::new();
        let first = lines[start].trim_start();
        let after_open = &first[quote.len()..];
        let mut end = None;

        if let Some(inline) = after_open.find(quote) {
            body.push(after_open[..inline].to_string());
            end = Some(start);
        } else {
            body.push(after_open.to_string());
            for (offset, raw) in lines[start + 1..].iter().enumerate() {
                if let Some(pos) = raw.find(quote) {
                    body.push(raw[..pos].to_string());
                    end = Some(start + 1 + offset);
                    break;
                }
                body.push(raw.to_string());
            }
        }
        if end.is_none() {
            // Unterminated docstring; not ours to diagnose.
            return Ok(());
        }

        if let Some((yaml, tag_line)) = mapping_after_tag(&body) {
            blocks.push(block_from_yaml(
                &yaml,
                file,
                start + 1 + tag_line,
                body.join("\n"),
                Location::line(start + 1),
            )?);
        }
        Ok(())
    }

    /// Consecutive `#` lines following a `# tracegit:` opener. Returns the
    /// block and the index of the first line past it.
    fn collect_comment_block(
        &self,
        lines: &[&str],
        open: usize,
        file: &str,
    ) -> Result<(MetadataBlock, usize)> {
        let mut payload: Vec<String> = Vec::new();
        let mut raw: Vec<&str> = vec![lines[open]];
        let mut end = open + 1;

        while end < lines.len() {
            let trimmed = lines[end].trim_start();
            let Some(comment) = trimmed.strip_prefix('#') else {
                break;
            };
            raw.push(lines[end]);
            payload.push(comment.strip_prefix(' ').unwrap_or(comment).to_string());
            end += 1;
        }

        let yaml = dedent(&payload);
        let block = block_from_yaml(
            &yaml,
            file,
            open + 1,
            raw.join("\n"),
            Location::line(open + 1),
        )?;
        Ok((block, end))
    }
}

/// Find the line index and quote style of the module docstring, skipping
/// shebangs, encoding lines, comments, and blanks.
fn find_docstring_open(lines: &[&str]) -> Option<(usize, &'static str)> {
    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if trimmed.starts_with("\"\"\"") {
            return Some((i, "\"\"\""));
        }
        if trimmed.starts_with("'''") {
            return Some((i, "'''"));
        }
        return None;
    }
    None
}

/// Extract the YAML mapping nested under a `tracegit:` line. Returns the
/// dedented mapping and the 1-based offset of the tag line within `body`.
pub(crate) fn mapping_after_tag(body: &[String]) -> Option<(String, usize)> {
    let tag_line = body.iter().position(|l| l.trim() == format!("{TAG}:"))?;
    let mut mapping: Vec<String> = Vec::new();
    for line in &body[tag_line + 1..] {
        if line.trim().is_empty() {
            break;
        }
        // Mapping entries stay indented relative to the tag.
        if !line.starts_with(char::is_whitespace) {
            break;
        }
        mapping.push(line.clone());
    }
    if mapping.is_empty() {
        return None;
    }
    Some((dedent(&mapping), tag_line))
}

/// Strip the common leading indentation from non-empty lines.
pub(crate) fn dedent(lines: &[String]) -> String {
    let indent = lines
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    lines
        .iter()
        .map(|l| if l.len() >= indent { &l[indent..] } else { l.as_str() })
        .collect::<Vec<_>>()
        .join("\n")
}
