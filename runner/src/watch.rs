//! Trigger dispatcher loop for `banner-runner watch`.
//!
//! The loop wakes on a fixed poll interval and fires a run when the daily
//! schedule comes due or when the remote branch head moves (the push
//! trigger). Runs within one watch process serialize naturally; two watch
//! processes can still race to push, and that race is deliberately not
//! coordinated here (the loser's push fails the run).

use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::core::trigger::Trigger;
use crate::io::config::RunnerConfig;
use crate::io::git::Git;
use crate::io::secrets::Secrets;
use crate::io::state::{RunnerState, STATE_FILE, load_state, write_state};
use crate::steps::{RunOutcome, StepRunner, run_once};

/// What a polled remote head means for the push trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushDecision {
    /// No baseline yet: record the head without firing.
    Seed,
    /// The head moved: fire a push run.
    Fire,
    /// Head unchanged.
    NoChange,
}

/// Decide whether a polled head fires the push trigger.
pub fn push_decision(last_seen: Option<&str>, polled: &str) -> PushDecision {
    match last_seen {
        None => PushDecision::Seed,
        Some(seen) if seen == polled => PushDecision::NoChange,
        Some(_) => PushDecision::Fire,
    }
}

/// Reason why `watch` stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchStop {
    /// The configured run limit was reached.
    MaxRunsReached { max_runs: u32 },
}

/// Summary of a watch invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOutcome {
    pub runs_dispatched: u32,
    pub stop: WatchStop,
}

/// Watch for triggers and dispatch runs until `max_runs` is reached.
///
/// With `max_runs = None` this loops forever. Run failures are surfaced to
/// `on_run` and logged; the watcher itself keeps going, since each run is an
/// independent event.
pub fn watch<R: StepRunner, F: FnMut(Trigger, &Result<RunOutcome>)>(
    root: &Path,
    cfg: &RunnerConfig,
    secrets: &Secrets,
    runner: &R,
    max_runs: Option<u32>,
    mut on_run: F,
) -> Result<WatchOutcome> {
    let schedule = cfg.daily_schedule()?;
    let git = Git::new(root);
    let state_path = root.join(STATE_FILE);
    let mut state = load_state(&state_path).context("load watch state")?;

    let mut runs_dispatched = 0u32;
    let mut next_fire = schedule.next_fire(Utc::now());
    info!(next_fire = %next_fire, "watching for triggers");

    loop {
        if let Some(max) = max_runs
            && runs_dispatched >= max
        {
            return Ok(WatchOutcome {
                runs_dispatched,
                stop: WatchStop::MaxRunsReached { max_runs: max },
            });
        }

        if Utc::now() >= next_fire {
            dispatch(
                root, cfg, secrets, runner, &git, &mut state, &state_path,
                Trigger::Schedule, &mut on_run,
            );
            runs_dispatched += 1;
            next_fire = schedule.next_fire(Utc::now());
            debug!(next_fire = %next_fire, "schedule rearmed");
            continue;
        }

        match git.ls_remote_head(&cfg.remote, &cfg.branch) {
            Ok(Some(head)) => match push_decision(state.last_seen_head.as_deref(), &head) {
                PushDecision::Seed => {
                    debug!(head = %head, "seeding push baseline");
                    state.last_seen_head = Some(head);
                    persist(&state_path, &state);
                }
                PushDecision::Fire => {
                    info!(head = %head, "remote head moved");
                    dispatch(
                        root, cfg, secrets, runner, &git, &mut state, &state_path,
                        Trigger::Push, &mut on_run,
                    );
                    runs_dispatched += 1;
                    continue;
                }
                PushDecision::NoChange => {}
            },
            Ok(None) => warn!(branch = %cfg.branch, "branch missing on remote"),
            Err(err) => warn!(err = %err, "remote poll failed"),
        }

        thread::sleep(Duration::from_secs(cfg.poll_interval_secs));
    }
}

/// Run once for a trigger and record the outcome in the state file.
///
/// The post-run head refresh is what keeps the gate's own push from being
/// mistaken for an external push on the next poll.
#[allow(clippy::too_many_arguments)]
fn dispatch<R: StepRunner, F: FnMut(Trigger, &Result<RunOutcome>)>(
    root: &Path,
    cfg: &RunnerConfig,
    secrets: &Secrets,
    runner: &R,
    git: &Git,
    state: &mut RunnerState,
    state_path: &Path,
    trigger: Trigger,
    on_run: &mut F,
) {
    info!(trigger = trigger.as_str(), "dispatching run");
    let result = run_once(root, cfg, secrets, trigger, runner);
    match &result {
        Ok(outcome) => info!(trigger = trigger.as_str(), "{}", outcome.summary()),
        Err(err) => error!(trigger = trigger.as_str(), err = %format!("{err:#}"), "run failed"),
    }

    state.last_run_at = Some(Utc::now().to_rfc3339());
    state.last_trigger = Some(trigger.as_str().to_string());
    state.last_commit = result
        .as_ref()
        .ok()
        .and_then(|outcome| outcome.commit.clone());
    match git.ls_remote_head(&cfg.remote, &cfg.branch) {
        Ok(Some(head)) => state.last_seen_head = Some(head),
        Ok(None) => {}
        Err(err) => warn!(err = %err, "post-run head refresh failed"),
    }
    persist(state_path, state);

    on_run(trigger, &result);
}

fn persist(path: &Path, state: &RunnerState) {
    if let Err(err) = write_state(path, state) {
        warn!(err = %err, "state write failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_poll_seeds_without_firing() {
        assert_eq!(push_decision(None, "abc"), PushDecision::Seed);
    }

    #[test]
    fn unchanged_head_does_not_fire() {
        assert_eq!(push_decision(Some("abc"), "abc"), PushDecision::NoChange);
    }

    #[test]
    fn moved_head_fires() {
        assert_eq!(push_decision(Some("abc"), "def"), PushDecision::Fire);
    }
}
