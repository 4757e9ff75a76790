//! Runner state storage for watch-loop bookkeeping.
//!
//! The watch loop needs the last observed remote head to survive restarts,
//! otherwise every restart would misread the current head as a fresh push.
//! Run summaries ride along for operator inspection.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// State file path, relative to the working checkout.
pub const STATE_FILE: &str = ".banner-runner/state.json";

/// Persisted bookkeeping (`.banner-runner/state.json`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunnerState {
    /// Remote head SHA observed by the last poll.
    pub last_seen_head: Option<String>,
    /// RFC 3339 timestamp of the last completed run.
    pub last_run_at: Option<String>,
    /// Trigger of the last completed run.
    pub last_trigger: Option<String>,
    /// Commit created by the last run, if any.
    pub last_commit: Option<String>,
}

/// Load state from disk. A missing file is an empty state.
pub fn load_state(path: &Path) -> Result<RunnerState> {
    if !path.exists() {
        return Ok(RunnerState::default());
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("read state {}", path.display()))?;
    let state: RunnerState = serde_json::from_str(&contents)
        .with_context(|| format!("parse state {}", path.display()))?;
    debug!(last_seen_head = ?state.last_seen_head, "state loaded");
    Ok(state)
}

/// Atomically write state to disk (temp file + rename).
pub fn write_state(path: &Path, state: &RunnerState) -> Result<()> {
    debug!(path = %path.display(), last_seen_head = ?state.last_seen_head, "writing state");
    let mut buf = serde_json::to_string_pretty(state)?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("state path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, &buf)
        .with_context(|| format!("write temp state {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace state {}", path.display()))?;
    Ok(())
}
