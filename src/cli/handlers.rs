//! Command implementations.
//!
//! Each handler resolves the repository explicitly, runs the engine, and
//! returns rendered output; printing and exit codes belong to the binary.

use serde::Serialize;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

use crate::cli::OutputFormat;
use crate::config::Config;
use crate::error::TraceError;
use crate::graph::linking::validate_link;
use crate::graph::staleness::{confirm_link, confirm_node, find_orphans, status_summary};
use crate::graph::traversal::{analyze_impact, find_relevant};
use crate::graph::types::{now_iso, Index, Link, RelationType, SyncStatus};
use crate::hooks::install_hooks;
use crate::ingest::{relative_path, scan};
use crate::report;
use crate::store;
use crate::validate::validate;
use crate::Result;

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Load the index of an initialized repository.
fn load(repo_root: &Path) -> Result<Index> {
    let dir = store::tracegit_dir(repo_root)?;
    store::load_index(&dir)
}

fn save(repo_root: &Path, index: &Index) -> Result<()> {
    let dir = store::tracegit_dir(repo_root)?;
    store::save_index(&dir, index)
}

pub fn init(repo_root: &Path, force: bool) -> Result<String> {
    let dir = repo_root.join(store::TRACEGIT_DIR);
    if dir.exists() && !force {
        return Err(TraceError::AlreadyInitialized(repo_root.to_path_buf()));
    }
    fs::create_dir_all(&dir)?;
    Config::default().save(&dir)?;
    store::save_index(&dir, &Index::new())?;
    info!(path = %dir.display(), "repository initialized");
    Ok(format!(
        "Initialized tracegit repository in {}",
        dir.display()
    ))
}

pub fn scan_cmd(repo_root: &Path, paths: &[PathBuf], format: OutputFormat) -> Result<String> {
    let report = scan(repo_root, paths)?;
    match format {
        OutputFormat::Json => to_json(&report),
        _ => Ok(report::render_scan(&report)),
    }
}

pub fn status(
    repo_root: &Path,
    stale_only: bool,
    orphans: bool,
    format: OutputFormat,
) -> Result<String> {
    let index = load(repo_root)?;
    let summary = status_summary(&index);
    let orphan_report = orphans.then(|| find_orphans(&index));

    if format == OutputFormat::Json {
        return match orphan_report {
            Some(o) => to_json(&json!({ "summary": summary, "orphans": o })),
            None => to_json(&summary),
        };
    }

    let mut text = report::render_status(&summary, orphan_report.as_ref());
    if stale_only {
        // Drop the count header; keep the stale listing.
        text = text
            .lines()
            .skip_while(|l| !l.starts_with("No stale") && !l.starts_with("Stale links"))
            .collect::<Vec<_>>()
            .join("\n")
            + "\n";
    }
    Ok(text)
}

pub fn show(repo_root: &Path, id: &str, format: OutputFormat) -> Result<String> {
    let index = load(repo_root)?;
    let node = index.require_node(id)?;
    if format == OutputFormat::Json {
        let upstream: Vec<&Link> = index.links_to(id).collect();
        let downstream: Vec<&Link> = index.links_from(id).collect();
        return to_json(&json!({
            "node": node,
            "upstream": upstream,
            "downstream": downstream,
        }));
    }
    Ok(report::render_show(node, &index))
}

pub fn link(repo_root: &Path, from: &str, to: &str, relation: &str) -> Result<String> {
    let mut index = load(repo_root)?;
    let relation = RelationType::from_str(relation)?;

    // Unlike metadata links, explicit links require both endpoints.
    index.require_node(from)?;
    index.require_node(to)?;
    validate_link(&index, from, to)?;

    let message = if let Some(existing) = index.find_link_mut(from, to) {
        let changed = existing.relation_type != relation;
        existing.relation_type = relation;
        existing.sync_status = SyncStatus::Ok;
        existing.last_checked = now_iso();
        if changed {
            format!("Updated link: {from} -> {to} (relation changed to: {relation})")
        } else {
            format!("Updated link: {from} -> {to} ({relation})")
        }
    } else {
        index.links.push(Link::new(from, to, relation)?);
        format!("Created link: {from} -> {to} ({relation})")
    };

    save(repo_root, &index)?;
    Ok(message)
}

pub fn confirm(repo_root: &Path, id: &str, to: Option<&str>) -> Result<String> {
    let mut index = load(repo_root)?;
    let message = match to {
        Some(to) => {
            confirm_link(&mut index, id, to)?;
            format!("Confirmed link: {id} -> {to}")
        }
        None => {
            let reset = confirm_node(&mut index, id)?;
            format!("Confirmed {reset} link(s) for {id}")
        }
    };
    save(repo_root, &index)?;
    Ok(message)
}

pub fn impact(repo_root: &Path, id: &str, depth: usize, format: OutputFormat) -> Result<String> {
    let index = load(repo_root)?;
    let result = analyze_impact(&index, id, depth)?;
    match format {
        OutputFormat::Json => to_json(&result),
        OutputFormat::Checklist => Ok(report::render_impact_checklist(&result)),
        OutputFormat::Text | OutputFormat::Tree => Ok(report::render_impact_tree(&result)),
    }
}

pub fn relevant(
    repo_root: &Path,
    file: &Path,
    depth: usize,
    format: OutputFormat,
) -> Result<String> {
    let index = load(repo_root)?;
    let rel = if file.is_absolute() {
        relative_path(repo_root, file)
    } else {
        file.to_string_lossy().replace('\\', "/")
    };
    let result = find_relevant(&index, &rel, depth);
    match format {
        OutputFormat::Json => to_json(&result),
        _ => Ok(report::render_relevant(&result)),
    }
}

/// Returns the rendered report and whether it was error-free.
pub fn validate_cmd(
    repo_root: &Path,
    path: Option<&Path>,
    format: OutputFormat,
) -> Result<(String, bool)> {
    let report = validate(repo_root, path)?;
    let clean = report.is_clean();
    let text = match format {
        OutputFormat::Json => to_json(&report)?,
        _ => report::render_validation(&report),
    };
    Ok((text, clean))
}

#[derive(Debug, Serialize)]
struct FmtReport {
    status: String,
    message: String,
    node_count: usize,
    link_count: usize,
    needs_formatting: bool,
}

/// Returns the rendered report and whether the index still needs
/// formatting (always false after a rewrite).
pub fn fmt_cmd(repo_root: &Path, check: bool, format: OutputFormat) -> Result<(String, bool)> {
    let dir = store::tracegit_dir(repo_root)?;
    let index = store::load_index(&dir)?;
    let needs = store::needs_formatting(&dir)?;

    let report = if check {
        FmtReport {
            status: if needs { "needs_formatting" } else { "ok" }.to_string(),
            message: if needs {
                "Index is not in canonical form".to_string()
            } else {
                "Index is canonical".to_string()
            },
            node_count: index.node_count(),
            link_count: index.link_count(),
            needs_formatting: needs,
        }
    } else {
        store::save_index(&dir, &index)?;
        FmtReport {
            status: "formatted".to_string(),
            message: "Index rewritten in canonical form".to_string(),
            node_count: index.node_count(),
            link_count: index.link_count(),
            needs_formatting: false,
        }
    };

    let needs_after = report.needs_formatting;
    let text = match format {
        OutputFormat::Json => to_json(&report)?,
        _ => format!("{}\n", report.message),
    };
    Ok((text, needs_after))
}

pub fn hooks_install_cmd(repo_root: &Path, all: bool, format: OutputFormat) -> Result<String> {
    let report = install_hooks(repo_root, all)?;
    if format == OutputFormat::Json {
        return to_json(&report);
    }
    let mut out = String::new();
    for hook in &report.installed {
        out.push_str(&format!("Installed {hook} hook\n"));
    }
    for hook in &report.skipped {
        out.push_str(&format!(
            "Skipped {hook}: existing hook was not installed by tracegit\n"
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn seeded_repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        init(dir.path(), false).unwrap();
        write(
            dir.path(),
            "docs/brd.md",
            "<!-- tracegit\nid: BR-001\ntype: business\ntitle: Secure access\n-->\nGoal text.\n",
        );
        write(
            dir.path(),
            "docs/srs.md",
            "<!-- tracegit\nid: SR-010\ntype: system\ntitle: Login flow\nupstream: BR-001\n-->\nReq text.\n",
        );
        scan(dir.path(), &[]).unwrap();
        dir
    }

    #[test]
    fn test_init_refuses_reinit_without_force() {
        let dir = TempDir::new().unwrap();
        init(dir.path(), false).unwrap();
        let err = init(dir.path(), false).unwrap_err();
        assert!(matches!(err, TraceError::AlreadyInitialized(_)));
        assert!(init(dir.path(), true).is_ok());
    }

    #[test]
    fn test_link_create_and_update_messages() {
        let dir = seeded_repo();
        write(
            dir.path(),
            "src/auth.py",
            "# tracegit:\n#   id: C-100\n#   type: code\n#   title: Auth\n",
        );
        scan(dir.path(), &[]).unwrap();

        let msg = link(dir.path(), "SR-010", "C-100", "implements").unwrap();
        assert_eq!(msg, "Created link: SR-010 -> C-100 (implements)");

        let msg = link(dir.path(), "SR-010", "C-100", "depends_on").unwrap();
        assert_eq!(
            msg,
            "Updated link: SR-010 -> C-100 (relation changed to: depends_on)"
        );
    }

    #[test]
    fn test_link_requires_known_endpoints() {
        let dir = seeded_repo();
        let err = link(dir.path(), "SR-010", "C-404", "implements").unwrap_err();
        assert!(matches!(err, TraceError::NodeNotFound(_)));
    }

    #[test]
    fn test_link_rejects_bad_relation() {
        let dir = seeded_repo();
        let err = link(dir.path(), "BR-001", "SR-010", "blesses").unwrap_err();
        assert!(matches!(err, TraceError::InvalidRelationType { .. }));
    }

    #[test]
    fn test_confirm_resets_stale_link() {
        let dir = seeded_repo();
        write(
            dir.path(),
            "docs/srs.md",
            "<!-- tracegit\nid: SR-010\ntype: system\ntitle: Login flow\nupstream: BR-001\n-->\nChanged req text.\n",
        );
        scan(dir.path(), &[]).unwrap();

        let status_text = status(dir.path(), false, false, OutputFormat::Text).unwrap();
        assert!(status_text.contains("Stale links: 1"));

        let msg = confirm(dir.path(), "SR-010", None).unwrap();
        assert_eq!(msg, "Confirmed 1 link(s) for SR-010");

        let status_text = status(dir.path(), false, false, OutputFormat::Text).unwrap();
        assert!(status_text.contains("No stale links"));
    }

    #[test]
    fn test_show_and_impact() {
        let dir = seeded_repo();
        let text = show(dir.path(), "SR-010", OutputFormat::Text).unwrap();
        assert!(text.contains("SR-010: Login flow"));
        assert!(text.contains("BR-001 (refines, ok)"));

        let text = impact(dir.path(), "BR-001", 2, OutputFormat::Text).unwrap();
        assert!(text.contains("DIRECT DOWNSTREAM (depth 1):"));
        assert!(text.contains("SR-010"));
    }

    #[test]
    fn test_impact_json_parses() {
        let dir = seeded_repo();
        let out = impact(dir.path(), "BR-001", 2, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["origin"]["id"], "BR-001");
        assert_eq!(value["direct"][0]["id"], "SR-010");
    }

    #[test]
    fn test_relevant_normalizes_absolute_path() {
        let dir = seeded_repo();
        let abs = dir.path().join("docs/srs.md");
        let text = relevant(dir.path(), &abs, 3, OutputFormat::Text).unwrap();
        assert!(text.contains("Context for docs/srs.md:"));
        assert!(text.contains("SR-010"));
        assert!(text.contains("BR-001"));
    }

    #[test]
    fn test_fmt_check_and_rewrite() {
        let dir = seeded_repo();
        let (out, needs) = fmt_cmd(dir.path(), true, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["status"], "ok");
        assert!(!needs);

        // Perturb the file, then fmt rewrites it.
        let path = dir.path().join(".tracegit/index.yaml");
        let mut text = fs::read_to_string(&path).unwrap();
        text.push('\n');
        fs::write(&path, text).unwrap();
        let (out, needs) = fmt_cmd(dir.path(), true, OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["status"], "needs_formatting");
        assert!(needs);

        fmt_cmd(dir.path(), false, OutputFormat::Text).unwrap();
        let (_, needs) = fmt_cmd(dir.path(), true, OutputFormat::Json).unwrap();
        assert!(!needs);
    }

    #[test]
    fn test_validate_cmd_reports_clean_flag() {
        let dir = seeded_repo();
        write(
            dir.path(),
            "docs/bad.md",
            "<!-- tracegit\nid: SR-011\ntype: system\n-->\n",
        );
        let (text, clean) = validate_cmd(dir.path(), None, OutputFormat::Text).unwrap();
        assert!(!clean);
        assert!(text.contains("PARSE_ERROR"));
    }
}
