//! Git-backed working tree: set local changes aside, then restore them.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, warn};

use crate::domain::error::{EvalError, Result};

/// Message attached to stashes created by the harness.
pub const STASH_MESSAGE: &str = "next-evals: set aside before eval";

/// State captured by [`WorkingTree::set_aside`], consumed by restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Baseline {
    /// HEAD at the time the tree was set aside.
    pub head: String,

    /// Whether local modifications were stashed and must be reapplied.
    pub stashed: bool,
}

/// The mutable project checkout an eval runs against.
pub trait WorkingTree: Send + Sync {
    /// Root directory of the tree.
    fn root(&self) -> &Path;

    /// Stash any local modifications so the tree matches HEAD.
    fn set_aside(&self) -> Result<Baseline>;

    /// Discard all changes, remove untracked files and reapply the stash.
    fn restore(&self, baseline: &Baseline) -> Result<()>;
}

/// [`WorkingTree`] implemented with the `git` CLI.
#[derive(Debug, Clone)]
pub struct GitWorkingTree {
    root: PathBuf,
}

impl GitWorkingTree {
    /// Open a tree, failing if `root` is not inside a git work tree.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !is_git_repo(&root) {
            return Err(EvalError::GitError(format!(
                "{} is not a git work tree",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        run_git(&self.root, args)
    }

    /// Whether the tree has staged, unstaged or untracked changes.
    pub fn is_dirty(&self) -> Result<bool> {
        Ok(!self.git(&["status", "--porcelain"])?.trim().is_empty())
    }
}

impl WorkingTree for GitWorkingTree {
    fn root(&self) -> &Path {
        &self.root
    }

    fn set_aside(&self) -> Result<Baseline> {
        let head = capture_head_sha(&self.root)?;
        let stashed = if self.is_dirty()? {
            self.git(&["stash", "push", "--include-untracked", "-m", STASH_MESSAGE])?;
            info!(head = %head, "Stashed local modifications");
            true
        } else {
            false
        };
        Ok(Baseline { head, stashed })
    }

    fn restore(&self, baseline: &Baseline) -> Result<()> {
        // Run every step even if an earlier one failed.
        let mut failures = Vec::new();
        if let Err(e) = self.git(&["reset", "--hard", baseline.head.as_str()]) {
            failures.push(e.to_string());
        }
        if let Err(e) = self.git(&["clean", "-fd"]) {
            failures.push(e.to_string());
        }
        if baseline.stashed {
            match self.git(&["stash", "pop"]) {
                Ok(_) => info!("Reapplied stashed modifications"),
                Err(e) => failures.push(format!(
                    "{e}; local changes remain in the stash as '{STASH_MESSAGE}'"
                )),
            }
        }

        if !failures.is_empty() {
            warn!(
                head = %baseline.head,
                failures = failures.len(),
                "Working tree restore incomplete"
            );
            return Err(EvalError::GitError(failures.join("; ")));
        }
        debug!(head = %baseline.head, "Working tree restored");
        Ok(())
    }
}

fn run_git(repo_dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_dir)
        .output()
        .map_err(|e| EvalError::GitError(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(EvalError::GitError(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Capture the HEAD commit SHA from a git repository.
pub fn capture_head_sha(repo_dir: &Path) -> Result<String> {
    let sha = run_git(repo_dir, &["rev-parse", "HEAD"])?.trim().to_string();
    if sha.is_empty() {
        return Err(EvalError::GitError(
            "git rev-parse HEAD returned empty output".to_string(),
        ));
    }
    Ok(sha)
}

/// Check whether a directory is inside a git work tree.
pub fn is_git_repo(dir: &Path) -> bool {
    Command::new("git")
        .args(["rev-parse", "--is-inside-work-tree"])
        .current_dir(dir)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
