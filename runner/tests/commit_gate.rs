//! Conditional commit gate tests against real git repositories.
//!
//! Each test builds a bare remote plus a work clone in a tempdir and drives
//! the gate directly, verifying the idempotence and fixed-identity
//! properties.

use std::fs;

use banner_runner::io::git::Git;
use banner_runner::steps::{BOT_EMAIL, BOT_NAME, COMMIT_MESSAGE, Step, StepFailure, commit_if_changed};
use banner_runner::test_support::{git_in, repo_with_remote};

#[test]
fn clean_tree_commits_nothing() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (work, _remote) = repo_with_remote(temp.path()).expect("fixture");
    let git = Git::new(&work);

    let (commit, changed) = commit_if_changed(&git, "origin", "main").expect("gate");
    assert!(commit.is_none());
    assert_eq!(changed, 0);

    let count = git_in(&work, &["rev-list", "--count", "HEAD"]).expect("rev-list");
    assert_eq!(count.trim(), "1");
}

#[test]
fn dirty_tree_commits_once_and_pushes() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (work, remote) = repo_with_remote(temp.path()).expect("fixture");
    let git = Git::new(&work);

    fs::write(work.join("README.md"), "# banner (regenerated)\n").expect("write");

    let (commit, changed) = commit_if_changed(&git, "origin", "main").expect("gate");
    let sha = commit.expect("expected a commit");
    assert_eq!(changed, 1);

    let log = git_in(&work, &["log", "-1", "--format=%an%n%ae%n%s"]).expect("log");
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines, vec![BOT_NAME, BOT_EMAIL, COMMIT_MESSAGE]);

    let remote_head = git_in(&remote, &["rev-parse", "main"]).expect("remote head");
    assert_eq!(remote_head.trim(), sha);

    // Second invocation with no intervening change: idempotent, no commit.
    let (commit, _) = commit_if_changed(&git, "origin", "main").expect("gate");
    assert!(commit.is_none());
    let count = git_in(&work, &["rev-list", "--count", "HEAD"]).expect("rev-list");
    assert_eq!(count.trim(), "2");
}

#[test]
fn commit_contains_added_and_deleted_files() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (work, _remote) = repo_with_remote(temp.path()).expect("fixture");
    let git = Git::new(&work);

    fs::write(work.join("dark_mode.svg"), "<svg/>").expect("write");
    fs::remove_file(work.join("README.md")).expect("remove");

    let (commit, changed) = commit_if_changed(&git, "origin", "main").expect("gate");
    assert!(commit.is_some());
    assert_eq!(changed, 2);

    let show = git_in(&work, &["show", "--name-status", "--format="]).expect("show");
    assert!(show.contains("A\tdark_mode.svg"));
    assert!(show.contains("D\tREADME.md"));
}

#[test]
fn push_conflict_fails_the_gate() {
    let temp = tempfile::tempdir().expect("tempdir");
    let (work, _remote) = repo_with_remote(temp.path()).expect("fixture");

    // A second clone pushes first, so our push is non-fast-forward. The clone
    // must land on main whatever init.defaultBranch says on this machine.
    git_in(temp.path(), &["clone", "remote.git", "other"]).expect("clone");
    let other = temp.path().join("other");
    let branch = git_in(&other, &["rev-parse", "--abbrev-ref", "HEAD"]).expect("branch");
    assert_eq!(branch.trim(), "main");
    fs::write(other.join("README.md"), "# racing change\n").expect("write");
    git_in(&other, &["add", "-A"]).expect("add");
    git_in(
        &other,
        &[
            "-c",
            "user.name=racer",
            "-c",
            "user.email=racer@example.com",
            "commit",
            "-m",
            "race",
        ],
    )
    .expect("commit");
    git_in(&other, &["push", "origin", "main"]).expect("push");

    let git = Git::new(&work);
    fs::write(work.join("README.md"), "# losing change\n").expect("write");
    let err = commit_if_changed(&git, "origin", "main").expect_err("push must fail");
    let failure = err.downcast_ref::<StepFailure>().expect("step failure");
    assert_eq!(failure.step, Step::CommitGate);
    assert!(failure.detail.contains("push"));
}
