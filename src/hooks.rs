//! Git hook installation.
//!
//! Installed hooks carry a marker line; re-installation rewrites marked
//! hooks in place, while a hook without the marker belongs to someone
//! else and is never touched.

use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::TraceError;
use crate::Result;

pub const HOOK_MARKER: &str = "# installed by tracegit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    PreCommit,
    PostMerge,
    PrePush,
}

impl Hook {
    /// Hooks installed by default; `pre-push` only with `--all`.
    pub const DEFAULT: [Hook; 2] = [Hook::PreCommit, Hook::PostMerge];
    pub const ALL: [Hook; 3] = [Hook::PreCommit, Hook::PostMerge, Hook::PrePush];

    pub fn file_name(&self) -> &'static str {
        match self {
            Hook::PreCommit => "pre-commit",
            Hook::PostMerge => "post-merge",
            Hook::PrePush => "pre-push",
        }
    }

    fn script(&self) -> String {
        let command = match self {
            Hook::PreCommit | Hook::PrePush => "tracegit validate",
            Hook::PostMerge => "tracegit scan",
        };
        format!("#!/bin/sh\n{HOOK_MARKER}\n{command} || exit 1\n")
    }
}

#[derive(Debug, Default, Serialize)]
pub struct HookReport {
    pub installed: Vec<String>,
    /// Hooks left alone because an unmarked file was already there.
    pub skipped: Vec<String>,
}

/// Install the default hooks, or all of them.
pub fn install_hooks(repo_root: &Path, all: bool) -> Result<HookReport> {
    let hooks: &[Hook] = if all { &Hook::ALL } else { &Hook::DEFAULT };
    install(repo_root, hooks)
}

fn install(repo_root: &Path, hooks: &[Hook]) -> Result<HookReport> {
    let git_dir = repo_root.join(".git");
    if !git_dir.is_dir() {
        return Err(TraceError::GitNotFound(repo_root.to_path_buf()));
    }
    let hooks_dir = git_dir.join("hooks");
    fs::create_dir_all(&hooks_dir)?;

    let mut report = HookReport::default();
    for hook in hooks {
        let path = hooks_dir.join(hook.file_name());
        if path.exists() {
            let existing = fs::read_to_string(&path)?;
            if !existing.contains(HOOK_MARKER) {
                report.skipped.push(hook.file_name().to_string());
                continue;
            }
        }
        fs::write(&path, hook.script())?;
        make_executable(&path)?;
        info!(hook = hook.file_name(), "hook installed");
        report.installed.push(hook.file_name().to_string());
    }
    Ok(report)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn git_repo() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join(".git/hooks")).unwrap();
        dir
    }

    #[test]
    fn test_default_install() {
        let dir = git_repo();
        let report = install_hooks(dir.path(), false).unwrap();
        assert_eq!(report.installed, vec!["pre-commit", "post-merge"]);
        assert!(report.skipped.is_empty());

        let pre_commit =
            fs::read_to_string(dir.path().join(".git/hooks/pre-commit")).unwrap();
        assert!(pre_commit.contains(HOOK_MARKER));
        assert!(pre_commit.contains("tracegit validate"));
        assert!(!dir.path().join(".git/hooks/pre-push").exists());
    }

    #[test]
    fn test_all_includes_pre_push() {
        let dir = git_repo();
        let report = install_hooks(dir.path(), true).unwrap();
        assert_eq!(report.installed.len(), 3);
        assert!(dir.path().join(".git/hooks/pre-push").exists());
    }

    #[test]
    fn test_reinstall_is_idempotent() {
        let dir = git_repo();
        install_hooks(dir.path(), false).unwrap();
        let report = install_hooks(dir.path(), false).unwrap();
        assert_eq!(report.installed.len(), 2);
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn test_never_overwrites_foreign_hook() {
        let dir = git_repo();
        let path = dir.path().join(".git/hooks/pre-commit");
        fs::write(&path, "#!/bin/sh\necho custom hook\n").unwrap();

        let report = install_hooks(dir.path(), false).unwrap();
        assert_eq!(report.skipped, vec!["pre-commit"]);
        assert_eq!(report.installed, vec!["post-merge"]);
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("echo custom hook"));
    }

    #[test]
    fn test_requires_git_dir() {
        let dir = TempDir::new().unwrap();
        let err = install_hooks(dir.path(), false).unwrap_err();
        assert!(matches!(err, TraceError::GitNotFound(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_hooks_are_executable() {
        use std::os::unix::fs::PermissionsExt;
        let dir = git_repo();
        install_hooks(dir.path(), false).unwrap();
        let mode = fs::metadata(dir.path().join(".git/hooks/pre-commit"))
            .unwrap()
            .permissions()
            .mode();
        assert_ne!(mode & 0o111, 0);
    }
}
