//! Git adapter for the runner.
//!
//! The runner checks out deterministically and commits with a fixed bot
//! identity, so we keep a small, explicit wrapper around `git` subprocess
//! calls. Porcelain parsing lives in [`crate::core::gate`]; this module only
//! shells out and hands the text over.

use std::path::PathBuf;
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument, warn};

use crate::core::gate::{StatusEntry, parse_porcelain};

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Return the current branch name (errors on detached HEAD).
    #[instrument(skip_all)]
    pub fn current_branch(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let name = out.trim().to_string();
        if name == "HEAD" {
            warn!("detached HEAD detected");
            return Err(anyhow!("detached HEAD (refuse to run)"));
        }
        debug!(branch = %name, "current branch");
        Ok(name)
    }

    /// Return the current HEAD commit SHA.
    pub fn head_sha(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "HEAD"])?;
        Ok(out.trim().to_string())
    }

    /// Fetch a single branch from a remote.
    #[instrument(skip_all, fields(remote, branch))]
    pub fn fetch(&self, remote: &str, branch: &str) -> Result<()> {
        self.run_checked(&["fetch", remote, branch])?;
        Ok(())
    }

    /// Checkout an existing branch.
    #[instrument(skip_all, fields(branch))]
    pub fn checkout_branch(&self, branch: &str) -> Result<()> {
        debug!(branch, "checking out branch");
        self.run_checked(&["checkout", branch])?;
        Ok(())
    }

    /// Hard-reset the worktree and index to a ref (e.g. `origin/main`).
    #[instrument(skip_all, fields(target))]
    pub fn reset_hard(&self, target: &str) -> Result<()> {
        debug!(target, "hard reset");
        self.run_checked(&["reset", "--hard", target])?;
        Ok(())
    }

    /// Get status entries (including untracked) in porcelain format.
    pub fn status_porcelain(&self) -> Result<Vec<StatusEntry>> {
        let out = self.run_capture(&["status", "--porcelain=v1", "-uall"])?;
        parse_porcelain(&out)
    }

    /// Stage all changes except paths under the given prefix.
    pub fn add_all_except(&self, prefix: &str) -> Result<()> {
        let exclude = format!(":(exclude){prefix}");
        self.run_checked(&["add", "-A", "--", ".", &exclude])?;
        Ok(())
    }

    /// True if there is anything staged for commit.
    pub fn has_staged_changes(&self) -> Result<bool> {
        let out = self.run(&["diff", "--cached", "--name-only"])?;
        Ok(!String::from_utf8_lossy(&out.stdout).trim().is_empty())
    }

    /// Commit staged changes as the given author/committer identity.
    ///
    /// The identity is passed per-invocation with `-c`, so the repository's
    /// own config is never touched. If there are no staged changes, this
    /// returns Ok(false) and does nothing; an empty commit is never created.
    #[instrument(skip_all)]
    pub fn commit_staged(&self, message: &str, name: &str, email: &str) -> Result<bool> {
        if !self.has_staged_changes()? {
            debug!("no staged changes, skipping commit");
            return Ok(false);
        }
        debug!("committing staged changes");
        let user = format!("user.name={name}");
        let mail = format!("user.email={email}");
        self.run_checked(&["-c", &user, "-c", &mail, "commit", "-m", message])?;
        Ok(true)
    }

    /// Push a branch to a remote. Non-fast-forward rejections surface as errors.
    #[instrument(skip_all, fields(remote, branch))]
    pub fn push(&self, remote: &str, branch: &str) -> Result<()> {
        debug!(remote, branch, "pushing");
        self.run_checked(&["push", remote, branch])?;
        Ok(())
    }

    /// Query the remote head SHA for a branch without fetching.
    ///
    /// Returns `None` when the branch does not exist on the remote.
    #[instrument(skip_all, fields(remote, branch))]
    pub fn ls_remote_head(&self, remote: &str, branch: &str) -> Result<Option<String>> {
        let refspec = format!("refs/heads/{branch}");
        let out = self.run_capture(&["ls-remote", remote, &refspec])?;
        Ok(parse_ls_remote(&out))
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

fn parse_ls_remote(output: &str) -> Option<String> {
    output
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().next())
        .filter(|sha| !sha.is_empty())
        .map(str::to_string)
}
