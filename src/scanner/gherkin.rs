//! Gherkin feature-file scanner.
//!
//! Carrier: `# @tracegit` comment blocks, either file-level above
//! `Feature:` or indented above a `Scenario:`. The opener takes inline
//! `key=value` pairs or is followed by `# key: value` comment lines.
//! The checksum covers the block and the scenario text below it, up to
//! the next tagged block.

use super::python::dedent;
use super::{block_from_keyvalues, block_from_yaml, MetadataBlock, Scanner, TAG};
use crate::graph::types::Location;
use crate::Result;

pub struct GherkinScanner;

impl Scanner for GherkinScanner {
    fn supported_extensions(&self) -> &'static [&'static str] {
        &["feature"]
    }

    fn extract(&self, content: &str, file: &str) -> Result<Vec<MetadataBlock>> {
        let mut blocks = Vec::new();
        let lines: Vec<&str> = content.lines().collect();

        let openers: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, l)| opener_rest(l).is_some())
            .map(|(i, _)| i)
            .collect();

        for (n, &open) in openers.iter().enumerate() {
            let span_end = openers.get(n + 1).copied().unwrap_or(lines.len());
            let raw_content = lines[open..span_end].join("\n");
            let rest = opener_rest(lines[open]).unwrap();

            if !rest.is_empty() {
                blocks.push(block_from_keyvalues(
                    rest,
                    file,
                    open + 1,
                    raw_content,
                    Location::line(open + 1),
                )?);
                continue;
            }

            // Following `# key: value` comment lines form the payload.
            let mut payload: Vec<String> = Vec::new();
            for raw in &lines[open + 1..span_end] {
                let trimmed = raw.trim_start();
                let Some(comment) = trimmed.strip_prefix('#') else {
                    break;
                };
                payload.push(comment.strip_prefix(' ').unwrap_or(comment).to_string());
            }
            blocks.push(block_from_yaml(
                &dedent(&payload),
                file,
                open + 1,
                raw_content,
                Location::line(open + 1),
            )?);
        }

        Ok(blocks)
    }
}

/// Match a `# @tracegit` opener; returns the trimmed text after the tag.
fn opener_rest(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix("# @")?.strip_prefix(TAG)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::calculate_checksum;
    use crate::graph::types::NodeType;

    fn extract(content: &str) -> Vec<MetadataBlock> {
        GherkinScanner
            .extract(content, "features/login.feature")
            .unwrap()
    }

    #[test]
    fn test_file_level_block() {
        let src = "# @tracegit\n# id: T-050\n# type: test\n# title: Login feature\n# upstream: SR-010\nFeature: Login\n  Scenario: Happy path\n    Given a user\n";
        let blocks = extract(src);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].id, "T-050");
        assert_eq!(blocks[0].node_type, NodeType::Test);
        assert_eq!(blocks[0].upstream, vec!["SR-010".to_string()]);
        assert_eq!(blocks[0].location, Location::line(1));
    }

    #[test]
    fn test_scenario_level_blocks() {
        let src = "Feature: Login\n\n  # @tracegit\n  # id: T-051\n  # type: test\n  # title: Happy path\n  Scenario: Happy path\n    Given a user\n\n  # @tracegit id=T-052 type=test title=\"Lockout\"\n  Scenario: Lockout\n    Given five failures\n";
        let blocks = extract(src);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].id, "T-051");
        assert_eq!(blocks[1].id, "T-052");
        assert_eq!(blocks[1].line_number, 10);
    }

    #[test]
    fn test_checksum_covers_scenario_text() {
        let src = "# @tracegit\n# id: T-050\n# type: test\n# title: Login\nFeature: Login\n  Scenario: Happy path\n    Given a user\n";
        let changed = src.replace("Given a user", "Given an admin");
        let a = calculate_checksum(&extract(src)[0].raw_content);
        let b = calculate_checksum(&extract(&changed)[0].raw_content);
        assert_ne!(a, b);
    }

    #[test]
    fn test_span_ends_at_next_block() {
        let src = "# @tracegit id=T-001 type=test title=A\nScenario: A\n# @tracegit id=T-002 type=test title=B\nScenario: B\n";
        let blocks = extract(src);
        assert!(blocks[0].raw_content.contains("Scenario: A"));
        assert!(!blocks[0].raw_content.contains("Scenario: B"));
    }

    #[test]
    fn test_plain_comments_ignored() {
        let src = "# just a note\nFeature: Login\n";
        assert!(extract(src).is_empty());
    }

    #[test]
    fn test_missing_field_reports_line() {
        let src = "Feature: X\n\n# @tracegit\n# id: T-001\n# type: test\nScenario: Y\n";
        let err = GherkinScanner
            .extract(src, "features/login.feature")
            .unwrap_err();
        assert!(err.to_string().contains("features/login.feature:3"));
    }
}
