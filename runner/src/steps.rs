//! Orchestration for a single run: the six-step sequence.
//!
//! Steps execute in strict order and the run aborts on the first failure,
//! with one exception: cache restore is a best-effort optimization and a miss
//! (or a broken store) never fails the run. Nothing is committed until the
//! final gate, so a failed run leaves the repository exactly as it was.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::core::gate::{TreeState, tree_state, without_prefix};
use crate::core::trigger::Trigger;
use crate::io::cache::{DepCache, manifest_key};
use crate::io::config::RunnerConfig;
use crate::io::git::Git;
use crate::io::process::{CommandOutput, run_command_with_timeout};
use crate::io::secrets::{ACCESS_TOKEN_VAR, Secrets, USER_NAME_VAR};

/// Fixed commit message for gate commits. Not parameterized.
pub const COMMIT_MESSAGE: &str = "chore: auto-update README/banner";
/// Fixed bot author/committer name.
pub const BOT_NAME: &str = "banner-bot";
/// Fixed bot author/committer no-reply address.
pub const BOT_EMAIL: &str = "banner-bot@users.noreply.github.com";

/// Directory the runner owns inside the checkout (state, caches). Contents
/// are never staged by the commit gate.
pub const RUNNER_DIR: &str = ".banner-runner";

/// Pip cache directory the restore step populates, relative to the checkout.
pub const PIP_CACHE_DIR: &str = ".banner-runner/pip-cache";

/// The steps that can fail a run, in execution order. Cache restore has no
/// variant: it is best-effort and never fails the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Checkout,
    Runtime,
    Install,
    Generate,
    CommitGate,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Step::Checkout => "checkout",
            Step::Runtime => "runtime",
            Step::Install => "install",
            Step::Generate => "generate",
            Step::CommitGate => "commit-gate",
        }
    }
}

/// A step failed: the run halts and the child's exit code (when there is one)
/// becomes the run's exit code.
#[derive(Debug)]
pub struct StepFailure {
    pub step: Step,
    pub exit_code: Option<i32>,
    pub detail: String,
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} step failed", self.step.as_str())?;
        if let Some(code) = self.exit_code {
            write!(f, " (exit code {code})")?;
        }
        if !self.detail.is_empty() {
            write!(f, ": {}", self.detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for StepFailure {}

/// Parameters for one external command invocation within a step.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment for the child (inherits the rest of the process env).
    pub env: Vec<(String, String)>,
    pub workdir: PathBuf,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

/// Abstraction over external command execution for the runtime, install, and
/// generate steps. Tests use scripted runners that return predetermined
/// outputs without spawning interpreters.
pub trait StepRunner {
    fn run(&self, request: &CommandRequest) -> Result<CommandOutput>;
}

/// Runner that spawns real child processes.
pub struct SystemRunner;

impl StepRunner for SystemRunner {
    #[instrument(skip_all, fields(program = %request.program))]
    fn run(&self, request: &CommandRequest) -> Result<CommandOutput> {
        let mut cmd = Command::new(&request.program);
        cmd.args(&request.args).current_dir(&request.workdir);
        for (key, value) in &request.env {
            cmd.env(key, value);
        }
        run_command_with_timeout(cmd, request.timeout, request.output_limit_bytes)
    }
}

/// Summary of one completed run.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RunOutcome {
    pub trigger: Trigger,
    pub committed: bool,
    /// SHA of the gate commit, when one was created.
    pub commit: Option<String>,
    /// Number of porcelain entries the gate saw.
    pub changed_files: usize,
    pub cache_hit: bool,
}

impl RunOutcome {
    pub fn summary(&self) -> String {
        match &self.commit {
            Some(sha) => format!(
                "committed {} ({} file{} changed)",
                sha,
                self.changed_files,
                if self.changed_files == 1 { "" } else { "s" }
            ),
            None => "nothing to commit".to_string(),
        }
    }
}

/// Execute the full six-step sequence once.
#[instrument(skip_all, fields(trigger = trigger.as_str()))]
pub fn run_once<R: StepRunner>(
    root: &Path,
    cfg: &RunnerConfig,
    secrets: &Secrets,
    trigger: Trigger,
    runner: &R,
) -> Result<RunOutcome> {
    let timeout = Duration::from_secs(cfg.step_timeout_secs);
    let git = Git::new(root);

    // Step 1: clean checkout at the remote branch head. A detached HEAD is
    // refused up front rather than silently re-attached and hard-reset.
    git.current_branch()
        .map_err(|err| step_error(Step::Checkout, err))?;
    git.fetch(&cfg.remote, &cfg.branch)
        .map_err(|err| step_error(Step::Checkout, err))?;
    git.checkout_branch(&cfg.branch)
        .map_err(|err| step_error(Step::Checkout, err))?;
    let upstream = format!("{}/{}", cfg.remote, cfg.branch);
    git.reset_hard(&upstream)
        .map_err(|err| step_error(Step::Checkout, err))?;
    info!(branch = %cfg.branch, "checkout clean at remote head");

    // Step 2: provision the pinned runtime.
    let out = runner.run(&CommandRequest {
        program: cfg.python.interpreter.clone(),
        args: vec!["--version".to_string()],
        env: Vec::new(),
        workdir: root.to_path_buf(),
        timeout,
        output_limit_bytes: cfg.output_limit_bytes,
    })?;
    if !out.success() {
        return Err(step_failure(Step::Runtime, &out).into());
    }
    let reported = reported_version(&out).ok_or_else(|| StepFailure {
        step: Step::Runtime,
        exit_code: None,
        detail: format!("could not parse version from '{}'", out.stdout_text().trim()),
    })?;
    if !version_matches(&reported, &cfg.python.version_pin) {
        return Err(StepFailure {
            step: Step::Runtime,
            exit_code: None,
            detail: format!(
                "interpreter reports {reported}, pinned to {}",
                cfg.python.version_pin
            ),
        }
        .into());
    }
    debug!(version = %reported, "runtime provisioned");

    // Step 3: best-effort cache restore keyed by the manifest hash.
    let pip_cache = root.join(PIP_CACHE_DIR);
    let cache = DepCache::new(root.join(&cfg.cache_dir));
    let key = match fs::read(root.join(&cfg.manifest)) {
        Ok(bytes) => Some(manifest_key(&bytes)),
        Err(err) => {
            warn!(manifest = %cfg.manifest, err = %err, "manifest unreadable, skipping cache");
            None
        }
    };
    let cache_hit = match &key {
        Some(key) => match cache.restore(key, &pip_cache) {
            Ok(hit) => {
                info!(key = %key, hit, "cache restore");
                hit
            }
            Err(err) => {
                warn!(key = %key, err = %err, "cache restore failed, proceeding without cache");
                false
            }
        },
        None => false,
    };

    // Step 4: install dependencies from the manifest.
    let out = runner.run(&CommandRequest {
        program: cfg.python.interpreter.clone(),
        args: vec![
            "-m".to_string(),
            "pip".to_string(),
            "install".to_string(),
            "-r".to_string(),
            cfg.manifest.clone(),
        ],
        env: vec![(
            "PIP_CACHE_DIR".to_string(),
            pip_cache.display().to_string(),
        )],
        workdir: root.to_path_buf(),
        timeout,
        output_limit_bytes: cfg.output_limit_bytes,
    })?;
    if !out.success() {
        return Err(step_failure(Step::Install, &out).into());
    }
    if let Some(key) = &key {
        // Refresh the store so the next run with this manifest hits.
        if let Err(err) = cache.save(key, &pip_cache) {
            warn!(key = %key, err = %err, "cache save failed");
        }
    }

    // Step 5: run the generator with the secrets in its environment.
    let (program, args) = cfg
        .generator
        .command
        .split_first()
        .map(|(first, rest)| (first.clone(), rest.to_vec()))
        .context("generator.command is empty")?;
    let out = runner.run(&CommandRequest {
        program,
        args,
        env: vec![
            (ACCESS_TOKEN_VAR.to_string(), secrets.access_token.clone()),
            (USER_NAME_VAR.to_string(), secrets.user_name.clone()),
        ],
        workdir: root.to_path_buf(),
        timeout,
        output_limit_bytes: cfg.output_limit_bytes,
    })?;
    if !out.success() {
        return Err(step_failure(Step::Generate, &out).into());
    }
    info!("generator finished");

    // Step 6: commit and push only if the tree changed.
    let (commit, changed_files) = commit_if_changed(&git, &cfg.remote, &cfg.branch)?;
    Ok(RunOutcome {
        trigger,
        committed: commit.is_some(),
        commit,
        changed_files,
        cache_hit,
    })
}

/// The conditional commit gate.
///
/// Returns the new commit SHA when the tree was dirty, plus the number of
/// status entries the gate saw. A clean tree is a successful no-op.
#[instrument(skip_all)]
pub fn commit_if_changed(git: &Git, remote: &str, branch: &str) -> Result<(Option<String>, usize)> {
    let entries = git
        .status_porcelain()
        .map_err(|err| step_error(Step::CommitGate, err))?;
    let entries = without_prefix(entries, &format!("{RUNNER_DIR}/"));
    match tree_state(&entries) {
        TreeState::Clean => {
            info!("working tree clean, nothing to commit");
            Ok((None, 0))
        }
        TreeState::Dirty => {
            info!(changed = entries.len(), "working tree dirty, committing");
            git.add_all_except(RUNNER_DIR)
                .map_err(|err| step_error(Step::CommitGate, err))?;
            if !git
                .commit_staged(COMMIT_MESSAGE, BOT_NAME, BOT_EMAIL)
                .map_err(|err| step_error(Step::CommitGate, err))?
            {
                // Status was dirty but nothing was stageable (e.g. everything
                // matched .gitignore). Treat as clean.
                debug!("nothing staged after add, skipping commit");
                return Ok((None, entries.len()));
            }
            let sha = git
                .head_sha()
                .map_err(|err| step_error(Step::CommitGate, err))?;
            git.push(remote, branch)
                .map_err(|err| step_error(Step::CommitGate, err.context("push")))?;
            info!(sha = %sha, branch, "pushed gate commit");
            Ok((Some(sha), entries.len()))
        }
    }
}

/// Wrap a git error as a typed [`StepFailure`], so the CLI exit-code mapping
/// sees git steps and child-process steps the same way.
fn step_error(step: Step, err: anyhow::Error) -> anyhow::Error {
    anyhow::Error::new(StepFailure {
        step,
        exit_code: None,
        detail: format!("{err:#}"),
    })
}

fn step_failure(step: Step, out: &CommandOutput) -> StepFailure {
    let detail = if out.timed_out {
        "timed out".to_string()
    } else {
        out.stderr_text().trim().to_string()
    };
    StepFailure {
        step,
        exit_code: out.exit_code,
        detail,
    }
}

/// Extract the `X.Y.Z` token from `python --version` output.
///
/// Old interpreters print the banner to stderr, so both streams are checked.
fn reported_version(out: &CommandOutput) -> Option<String> {
    for text in [out.stdout_text(), out.stderr_text()] {
        for line in text.lines() {
            if let Some(rest) = line.trim().strip_prefix("Python ") {
                let token = rest.split_whitespace().next()?;
                return Some(token.to_string());
            }
        }
    }
    None
}

/// `3.12.4` matches pin `3.12`; `3.120.1` and `3.1.2` do not.
fn version_matches(version: &str, pin: &str) -> bool {
    version == pin || version.starts_with(&format!("{pin}."))
}
