//! Smoke tests for the Almanac CLI.
//!
//! These tests verify basic CLI functionality:
//! - `almanac --version` outputs version info
//! - `almanac --help` outputs help text
//! - a bad `--root` fails with a JSON error

use assert_cmd::Command;
use predicates::prelude::*;

/// Get a Command for the almanac binary.
fn almanac() -> Command {
    Command::new(env!("CARGO_BIN_EXE_almanac"))
}

#[test]
fn test_version_flag() {
    almanac()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("almanac"))
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_help_flag() {
    almanac()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("timeline"));
}

#[test]
fn test_no_args_shows_usage() {
    almanac()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_missing_root_is_json_error() {
    almanac()
        .args(["scan", "--root", "/definitely/not/here/almanac"])
        .env_remove("ALMANAC_ROOT")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains(r#""error""#))
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_missing_root_human_error() {
    almanac()
        .args(["-H", "scan", "-C", "/definitely/not/here/almanac"])
        .env_remove("ALMANAC_ROOT")
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("Error: "));
}
