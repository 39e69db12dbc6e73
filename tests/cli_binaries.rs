//! End-to-end smoke tests against the built `astra-migrate` binary.

use assert_cmd::prelude::*;
use std::process::Command;

#[test]
fn help_lists_usage_and_succeeds() {
    let mut cmd = Command::cargo_bin("astra-migrate").unwrap();
    cmd.arg("--help");
    let output = cmd.output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Usage:"));
    assert!(stdout.contains("astra-migrate"));
}

#[test]
fn a_missing_config_file_exits_with_a_fatal_code() {
    let mut cmd = Command::cargo_bin("astra-migrate").unwrap();
    cmd.args(["--config", "/nonexistent/astra-migrate-config.yaml"]);
    let output = cmd.output().unwrap();
    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn encrypt_all_without_a_fernet_key_is_rejected() {
    let mut cmd = Command::cargo_bin("astra-migrate").unwrap();
    cmd.args(["--encrypt-all", "--config", "/nonexistent/astra-migrate-config.yaml"]);
    let output = cmd.output().unwrap();
    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(1));
}
