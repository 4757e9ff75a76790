//! Update-if-changed banner runner CLI.
//!
//! Executes a fixed step sequence (checkout, runtime, cache restore, install,
//! generate, conditional commit/push) per trigger. `run` is manual dispatch;
//! `watch` fires on the daily schedule and on remote pushes.

use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::warn;

use banner_runner::core::trigger::Trigger;
use banner_runner::exit_codes;
use banner_runner::io::config::{CONFIG_FILE, RunnerConfig, load_config, write_config};
use banner_runner::io::secrets::Secrets;
use banner_runner::io::state::{STATE_FILE, load_state, write_state};
use banner_runner::logging;
use banner_runner::steps::{RunOutcome, StepFailure, SystemRunner, run_once};
use banner_runner::watch::watch;

#[derive(Parser)]
#[command(
    name = "banner-runner",
    version,
    about = "Update-if-changed runner for a generated README banner"
)]
struct Cli {
    /// Working checkout to operate on.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default `banner-runner.toml` if missing.
    Init {
        /// Overwrite an existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Check that the config file parses and validates.
    Validate,
    /// Execute one full run now (manual dispatch).
    Run,
    /// Watch for push/schedule triggers and dispatch runs.
    Watch {
        /// Stop after this many dispatched runs (default: run forever).
        #[arg(long)]
        max_runs: Option<u32>,
    },
}

fn main() {
    logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(exit_code_for(&err));
    }
}

/// A failed step exits with the child's code where one exists; everything
/// else is INVALID.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<StepFailure>() {
        Some(failure) => failure.exit_code.unwrap_or(exit_codes::INVALID),
        None => exit_codes::INVALID,
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(&cli.root, force),
        Command::Validate => cmd_validate(&cli.root),
        Command::Run => cmd_run(&cli.root),
        Command::Watch { max_runs } => cmd_watch(&cli.root, max_runs),
    }
}

fn cmd_init(root: &Path, force: bool) -> Result<()> {
    let path = root.join(CONFIG_FILE);
    if !force && path.exists() {
        println!("{} already exists (use --force to overwrite)", path.display());
        return Ok(());
    }
    write_config(&path, &RunnerConfig::default())?;
    println!("wrote {}", path.display());
    Ok(())
}

fn cmd_validate(root: &Path) -> Result<()> {
    let cfg = load_config(&root.join(CONFIG_FILE))?;
    println!(
        "config ok (branch {}, schedule '{}')",
        cfg.branch, cfg.schedule
    );
    Ok(())
}

fn cmd_run(root: &Path) -> Result<()> {
    let cfg = load_config(&root.join(CONFIG_FILE))?;
    let secrets = Secrets::from_env()?;
    let outcome = run_once(root, &cfg, &secrets, Trigger::Manual, &SystemRunner)?;
    record_run(root, &outcome);
    println!("{}", outcome.summary());
    Ok(())
}

fn cmd_watch(root: &Path, max_runs: Option<u32>) -> Result<()> {
    let cfg = load_config(&root.join(CONFIG_FILE))?;
    let secrets = Secrets::from_env()?;
    let outcome = watch(root, &cfg, &secrets, &SystemRunner, max_runs, |_, _| {})?;
    println!("dispatched {} run(s)", outcome.runs_dispatched);
    Ok(())
}

/// Best-effort bookkeeping for manual runs; a state write failure must not
/// fail an otherwise successful run.
fn record_run(root: &Path, outcome: &RunOutcome) {
    let path = root.join(STATE_FILE);
    let mut state = match load_state(&path) {
        Ok(state) => state,
        Err(err) => {
            warn!(err = %err, "state load failed");
            return;
        }
    };
    state.last_run_at = Some(Utc::now().to_rfc3339());
    state.last_trigger = Some(outcome.trigger.as_str().to_string());
    state.last_commit = outcome.commit.clone();
    if let Err(err) = write_state(&path, &state) {
        warn!(err = %err, "state write failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use banner_runner::steps::Step;

    #[test]
    fn step_failure_exit_code_passes_through() {
        let err = anyhow::Error::new(StepFailure {
            step: Step::Generate,
            exit_code: Some(7),
            detail: "boom".to_string(),
        });
        assert_eq!(exit_code_for(&err), 7);
    }

    #[test]
    fn codeless_step_failure_exits_invalid() {
        let err = anyhow::Error::new(StepFailure {
            step: Step::Checkout,
            exit_code: None,
            detail: "detached HEAD".to_string(),
        });
        assert_eq!(exit_code_for(&err), exit_codes::INVALID);
    }

    #[test]
    fn other_errors_exit_invalid() {
        assert_eq!(
            exit_code_for(&anyhow::anyhow!("bad config")),
            exit_codes::INVALID
        );
    }

    #[test]
    fn parse_init() {
        let cli = Cli::parse_from(["banner-runner", "init"]);
        assert!(matches!(cli.command, Command::Init { force: false }));
    }

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["banner-runner", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true }));
    }

    #[test]
    fn parse_watch_max_runs() {
        let cli = Cli::parse_from(["banner-runner", "watch", "--max-runs", "3"]);
        assert!(matches!(
            cli.command,
            Command::Watch {
                max_runs: Some(3)
            }
        ));
    }

    #[test]
    fn parse_root_flag() {
        let cli = Cli::parse_from(["banner-runner", "--root", "/tmp/checkout", "run"]);
        assert_eq!(cli.root, PathBuf::from("/tmp/checkout"));
    }
}
