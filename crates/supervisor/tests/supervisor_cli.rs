//! End-to-end smoke tests against the built `astra-migrate-supervisor` binary.

use assert_cmd::prelude::*;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn help_lists_usage_and_succeeds() {
    let mut cmd = Command::cargo_bin("astra-migrate-supervisor").unwrap();
    cmd.arg("--help");
    let output = cmd.output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("astra-migrate-supervisor"));
}

#[test]
fn status_reports_unknown_without_a_prior_run() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("astra-migrate-supervisor").unwrap();
    cmd.args(["--state-dir", &dir.path().to_string_lossy(), "status"]);
    let output = cmd.output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("unknown"));
}

#[test]
fn check_migration_fails_without_a_prior_run() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("astra-migrate-supervisor").unwrap();
    cmd.args(["--state-dir", &dir.path().to_string_lossy(), "check-migration"]);
    let output = cmd.output().unwrap();
    assert!(!output.status.success());
}

#[test]
fn stop_fails_without_a_running_supervisor() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("astra-migrate-supervisor").unwrap();
    cmd.args(["--state-dir", &dir.path().to_string_lossy(), "stop"]);
    let output = cmd.output().unwrap();
    assert!(!output.status.success());
}
