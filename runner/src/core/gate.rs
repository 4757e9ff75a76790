//! Clean/dirty decision for the conditional commit gate.
//!
//! Porcelain status text is parsed and classified here; the side-effecting
//! stage/commit/push half of the gate lives in [`crate::steps`]. The gate is
//! idempotent by construction: an empty status means no commit, so a second
//! run over unchanged generator output never produces an empty commit.

use anyhow::{Result, anyhow};

/// Parsed `git status --porcelain` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// 2-letter XY code, or "??" for untracked.
    pub code: String,
    /// Path for the changed file.
    pub path: String,
}

/// Working tree state relative to the last commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeState {
    /// No status entries: the generator reproduced the committed artifact.
    Clean,
    /// At least one changed, added, or deleted file.
    Dirty,
}

/// Classify a set of status entries.
pub fn tree_state(entries: &[StatusEntry]) -> TreeState {
    if entries.is_empty() {
        TreeState::Clean
    } else {
        TreeState::Dirty
    }
}

/// Drop entries under a path prefix (the runner's own state/cache directory
/// must never count as generator output).
pub fn without_prefix(entries: Vec<StatusEntry>, prefix: &str) -> Vec<StatusEntry> {
    entries
        .into_iter()
        .filter(|entry| !entry.path.starts_with(prefix))
        .collect()
}

/// Parse `git status --porcelain=v1` output into entries.
pub fn parse_porcelain(output: &str) -> Result<Vec<StatusEntry>> {
    let mut entries = Vec::new();
    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }
        entries.push(parse_status_line(line)?);
    }
    Ok(entries)
}

fn parse_status_line(line: &str) -> Result<StatusEntry> {
    if let Some(path) = line.strip_prefix("?? ") {
        return Ok(StatusEntry {
            code: "??".to_string(),
            path: path.trim().to_string(),
        });
    }
    if line.len() < 4 {
        return Err(anyhow!("unexpected porcelain line: '{line}'"));
    }
    let code = line[..2].to_string();
    let mut path = line[3..].trim().to_string();
    if let Some((_, new)) = path.split_once("->") {
        path = new.trim().to_string();
    }
    Ok(StatusEntry { code, path })
}
