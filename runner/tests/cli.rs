//! CLI contract tests: spawn the binary and verify exit codes and output.

use std::fs;
use std::process::Command;

use banner_runner::exit_codes;
use banner_runner::io::config::CONFIG_FILE;

fn bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_banner-runner"))
}

#[test]
fn init_writes_config_and_validate_accepts_it() {
    let temp = tempfile::tempdir().expect("tempdir");

    let out = bin()
        .arg("--root")
        .arg(temp.path())
        .arg("init")
        .output()
        .expect("run init");
    assert_eq!(out.status.code(), Some(exit_codes::OK));
    assert!(temp.path().join(CONFIG_FILE).exists());

    let out = bin()
        .arg("--root")
        .arg(temp.path())
        .arg("validate")
        .output()
        .expect("run validate");
    assert_eq!(out.status.code(), Some(exit_codes::OK));
    assert!(String::from_utf8_lossy(&out.stdout).contains("config ok"));
}

#[test]
fn validate_rejects_malformed_schedule() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(
        temp.path().join(CONFIG_FILE),
        "schedule = \"whenever\"\n",
    )
    .expect("write config");

    let out = bin()
        .arg("--root")
        .arg(temp.path())
        .arg("validate")
        .output()
        .expect("run validate");
    assert_eq!(out.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&out.stderr).contains("schedule"));
}

#[test]
fn run_without_secrets_fails_before_any_step() {
    let temp = tempfile::tempdir().expect("tempdir");

    let out = bin()
        .arg("--root")
        .arg(temp.path())
        .arg("run")
        .env_remove("ACCESS_TOKEN")
        .env_remove("USER_NAME")
        .output()
        .expect("run");
    assert_eq!(out.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&out.stderr).contains("ACCESS_TOKEN"));
}

#[test]
fn watch_with_zero_max_runs_exits_immediately() {
    let temp = tempfile::tempdir().expect("tempdir");

    let out = bin()
        .arg("--root")
        .arg(temp.path())
        .arg("watch")
        .arg("--max-runs")
        .arg("0")
        .env("ACCESS_TOKEN", "t")
        .env("USER_NAME", "u")
        .output()
        .expect("run watch");
    assert_eq!(out.status.code(), Some(exit_codes::OK));
    assert!(String::from_utf8_lossy(&out.stdout).contains("dispatched 0 run(s)"));
}
