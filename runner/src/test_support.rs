//! Test-only helpers: scripted step runners and git repo fixtures.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, anyhow};

use crate::io::process::CommandOutput;
use crate::io::secrets::Secrets;
use crate::steps::{CommandRequest, StepRunner};

/// Canned response for one scripted command invocation.
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ScriptedResponse {
    /// Successful invocation with the given stdout.
    pub fn ok(stdout: &str) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    /// Failed invocation with the given exit code and stderr.
    pub fn fail(exit_code: i32, stderr: &str) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }
}

/// Step runner that replays canned responses in order and records every
/// request, so tests can assert on sequencing and environment without
/// spawning interpreters.
pub struct ScriptedRunner {
    responses: RefCell<VecDeque<ScriptedResponse>>,
    calls: RefCell<Vec<CommandRequest>>,
}

impl ScriptedRunner {
    pub fn new(responses: Vec<ScriptedResponse>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Requests seen so far, in invocation order.
    pub fn calls(&self) -> Vec<CommandRequest> {
        self.calls.borrow().clone()
    }
}

impl StepRunner for ScriptedRunner {
    fn run(&self, request: &CommandRequest) -> Result<CommandOutput> {
        self.calls.borrow_mut().push(request.clone());
        let response = self
            .responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("unexpected command: {}", request.program))?;
        Ok(CommandOutput {
            exit_code: Some(response.exit_code),
            stdout: response.stdout.into_bytes(),
            stderr: response.stderr.into_bytes(),
            stdout_truncated: 0,
            stderr_truncated: 0,
            timed_out: false,
        })
    }
}

/// Responses for the three scripted steps of a fully successful run
/// (runtime check, install, generate).
pub fn happy_path_responses(version: &str) -> Vec<ScriptedResponse> {
    vec![
        ScriptedResponse::ok(&format!("Python {version}\n")),
        ScriptedResponse::ok("Successfully installed\n"),
        ScriptedResponse::ok(""),
    ]
}

/// Deterministic secrets for tests.
pub fn test_secrets() -> Secrets {
    Secrets {
        access_token: "test-token".to_string(),
        user_name: "test-user".to_string(),
    }
}

/// Create a bare remote and a work clone with one seed commit on `main`.
///
/// Returns `(workdir, remote_dir)`.
pub fn repo_with_remote(root: &Path) -> Result<(PathBuf, PathBuf)> {
    let remote = root.join("remote.git");
    let work = root.join("work");
    git_in(root, &["init", "--bare", "remote.git"])?;
    // The bare repo inherits init.defaultBranch; point HEAD at main so every
    // later clone lands on it.
    git_in(&remote, &["symbolic-ref", "HEAD", "refs/heads/main"])?;
    git_in(root, &["clone", "remote.git", "work"])?;
    // Rename the unborn default branch; works regardless of init.defaultBranch.
    git_in(&work, &["symbolic-ref", "HEAD", "refs/heads/main"])?;
    fs::write(work.join("README.md"), "# banner\n").context("write README.md")?;
    fs::write(work.join("requirements.txt"), "requests==2.32.0\n")
        .context("write requirements.txt")?;
    git_in(&work, &["add", "-A"])?;
    git_in(
        &work,
        &[
            "-c",
            "user.name=seed",
            "-c",
            "user.email=seed@example.com",
            "commit",
            "-m",
            "seed",
        ],
    )?;
    git_in(&work, &["push", "-u", "origin", "main"])?;
    Ok((work, remote))
}

/// Run git in a directory, failing loudly with stderr on a non-zero exit.
pub fn git_in(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .with_context(|| format!("spawn git {}", args.join(" ")))?;
    if !output.status.success() {
        return Err(anyhow!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
