//! Filesystem watch front end.
//!
//! Events flow through a debouncer into a single-consumer channel; each
//! flushed batch becomes at most one scan. The consumer loop is the only
//! caller, so scans never overlap and the engine itself stays free of
//! timers and threads.

use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::ingest::{scan, ScanReport};
use crate::scanner::ScannerRegistry;
use crate::store::TRACEGIT_DIR;
use crate::Result;

pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Watch `roots` (the repo root when empty) and rescan on changes. Every
/// batch report is handed to `on_scan`; the loop runs until the channel
/// closes.
pub fn watch(
    repo_root: &Path,
    roots: &[PathBuf],
    debounce: Duration,
    mut on_scan: impl FnMut(&ScanReport),
) -> Result<()> {
    let registry = ScannerRegistry::with_defaults();
    let (tx, rx) = mpsc::channel();
    let mut debouncer = new_debouncer(debounce, tx)?;

    let watch_roots: Vec<PathBuf> = if roots.is_empty() {
        vec![repo_root.to_path_buf()]
    } else {
        roots.to_vec()
    };
    for root in &watch_roots {
        debouncer.watcher().watch(root, RecursiveMode::Recursive)?;
        info!(root = %root.display(), "watching");
    }

    for result in rx {
        let events = match result {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "watch error, continuing");
                continue;
            }
        };
        let paths: Vec<PathBuf> = events.into_iter().map(|e| e.path).collect();
        let batch = filter_batch(repo_root, &registry, paths);
        if batch.is_empty() {
            continue;
        }
        debug!(files = batch.len(), "debounced batch triggers scan");

        // A deleted file cannot be walked; fall back to a full scan so
        // its nodes get removed.
        let targets: Vec<PathBuf> = if batch.iter().all(|p| p.exists()) {
            batch
        } else {
            Vec::new()
        };
        match scan(repo_root, &targets) {
            Ok(report) => on_scan(&report),
            Err(e) => warn!(error = %e, "scan failed, continuing to watch"),
        }
    }
    Ok(())
}

/// Keep paths that are inside the repo, have a supported extension, and
/// are not under `.tracegit/` or `.git/`. Deduplicated and sorted.
pub fn filter_batch(
    repo_root: &Path,
    registry: &ScannerRegistry,
    paths: Vec<PathBuf>,
) -> Vec<PathBuf> {
    let filtered: BTreeSet<PathBuf> = paths
        .into_iter()
        .filter(|p| p.starts_with(repo_root))
        .filter(|p| {
            !p.strip_prefix(repo_root)
                .map(|rel| {
                    rel.components().any(|c| {
                        let name = c.as_os_str().to_string_lossy();
                        name == TRACEGIT_DIR || name == ".git"
                    })
                })
                .unwrap_or(false)
        })
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| registry.supports_extension(ext))
        })
        .collect();
    filtered.into_iter().collect()
}
