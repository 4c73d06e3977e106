//! Integration tests for the `zet` binary.
//!
//! Argument parsing, help output, completions, settings handling, and the
//! engine-free DNS commands. No tunnel engine is running.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a command for the `zet` binary with env isolation.
fn zet_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("zet");
    cmd.env("HOME", "/tmp/zet-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/zet-cli-test-nonexistent")
        .env("XDG_DATA_HOME", "/tmp/zet-cli-test-nonexistent")
        .env("NO_COLOR", "1")
        .env_remove("ZET_CONFIG")
        .env_remove("ZET_OUTPUT")
        .env_remove("RUST_LOG");
    cmd
}

/// Write a settings file keeping all state under `dir`.
fn settings_in(dir: &Path) -> PathBuf {
    let path = dir.join("config.toml");
    let state = dir.join("state");
    std::fs::write(
        &path,
        format!(
            "[engine]\ncommand_socket = \"{0}/cmd.sock\"\nevent_socket = \"{0}/evt.sock\"\n\n\
             [storage]\nstate_dir = \"{1}\"\n",
            dir.display(),
            state.display()
        ),
    )
    .unwrap();
    path
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = zet_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_lists_commands() {
    zet_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("identities")
            .and(predicate::str::contains("services"))
            .and(predicate::str::contains("dns"))
            .and(predicate::str::contains("watch")),
    );
}

#[test]
fn test_version_flag() {
    zet_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("zet"));
}

#[test]
fn test_invalid_subcommand() {
    zet_cmd()
        .arg("tunnels")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("tunnels"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_zsh() {
    zet_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_completions_bash() {
    zet_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honors_flag() {
    zet_cmd()
        .args(["config", "path", "--config", "/etc/zet/custom.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/etc/zet/custom.toml"));
}

#[test]
fn test_config_init_then_show() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zet").join("config.toml");
    let path_arg = path.to_str().unwrap();

    zet_cmd()
        .args(["config", "init", "--config", path_arg])
        .assert()
        .success();
    assert!(path.exists());

    zet_cmd()
        .args(["config", "show", "--config", path_arg])
        .assert()
        .success()
        .stdout(predicate::str::contains("timeout_secs = 30"));

    zet_cmd()
        .args(["config", "init", "--config", path_arg])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_invalid_settings_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[engine]\ntimeout_secs = \"soon\"\n").unwrap();

    zet_cmd()
        .args(["config", "show", "--config", path.to_str().unwrap()])
        .assert()
        .failure()
        .code(1);
}

// ── DNS (no engine) ─────────────────────────────────────────────────

#[test]
fn test_dns_show_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = settings_in(dir.path());

    zet_cmd()
        .args(["dns", "show", "--config", config.to_str().unwrap()])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("100.64.0.2").and(predicate::str::contains("100.64.0.0/10")),
        );
}

#[test]
fn test_dns_set_persists() {
    let dir = tempfile::tempdir().unwrap();
    let config = settings_in(dir.path());
    let config = config.to_str().unwrap();

    zet_cmd()
        .args([
            "dns",
            "set",
            "--nameserver",
            "100.96.0.2",
            "--range",
            "100.96.0.0/12",
            "--config",
            config,
        ])
        .assert()
        .success();

    zet_cmd()
        .args(["dns", "show", "-o", "json", "--config", config])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"nameserver\": \"100.96.0.2\""));

    let prefs = std::fs::read_to_string(dir.path().join("state").join("prefs.toml")).unwrap();
    assert!(prefs.contains("100.96.0.0/12"));
}

#[test]
fn test_dns_set_rejects_nameserver_outside_range() {
    let dir = tempfile::tempdir().unwrap();
    let config = settings_in(dir.path());

    zet_cmd()
        .args([
            "dns",
            "set",
            "--nameserver",
            "10.0.0.2",
            "--range",
            "100.64.0.0/10",
            "--config",
            config.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .code(2);
}

// ── Engine-bound commands ───────────────────────────────────────────

#[test]
fn test_identities_list_without_engine() {
    let dir = tempfile::tempdir().unwrap();
    let config = settings_in(dir.path());

    zet_cmd()
        .args(["identities", "list", "--config", config.to_str().unwrap()])
        .assert()
        .failure()
        .code(7)
        .stderr(predicate::str::contains("unavailable"));
}

#[test]
fn test_zero_timeout_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = settings_in(dir.path());

    zet_cmd()
        .args([
            "identities",
            "list",
            "--timeout",
            "0",
            "--config",
            config.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .code(2);
}
