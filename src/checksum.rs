//! Content digests for staleness detection.
//!
//! A node's checksum is the SHA-256 of its normalized source snippet, so
//! incidental formatting (line endings, surrounding whitespace, blank lines
//! at the edges) never counts as a change. Interior blank lines do count;
//! they are paragraph breaks.

use sha2::{Digest, Sha256};

/// Normalize text before hashing:
/// - `\r\n` and `\r` become `\n`
/// - every line is stripped of leading/trailing whitespace
/// - leading and trailing empty lines are dropped
/// - interior empty lines are preserved
pub fn normalize_text(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = unified.split('\n').map(str::trim).collect();

    let start = match lines.iter().position(|l| !l.is_empty()) {
        Some(i) => i,
        None => return String::new(),
    };
    // Safe: at least one non-empty line exists past `start`.
    let end = lines.iter().rposition(|l| !l.is_empty()).unwrap();

    lines[start..=end].join("\n")
}

/// Compute the 64-character lowercase hex SHA-256 digest of the normalized
/// text. Empty or whitespace-only input normalizes to the empty string and
/// still yields a valid digest.
pub fn calculate_checksum(text: &str) -> String {
    let normalized = normalize_text(text);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

/// Equality check between two digests. The digest is a staleness marker,
/// not a secret, so plain comparison is fine.
pub fn compare_checksums(a: &str, b: &str) -> bool {
    a == b
}
