//! Integration tests for the `meshwatch` binary.
//!
//! Argument parsing, configuration failures, and the offline inspection
//! commands. Nothing here needs a live tailnet.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

const ISOLATED_ENV: &[&str] = &[
    "MESHWATCH_CONFIG",
    "MESHWATCH_API_TOKEN",
    "MESHWATCH_MESH",
    "MESHWATCH_NOTIFY_ENDPOINTS",
    "MESHWATCH_STATE_PATH",
    "MESHWATCH_LOG_FORMAT",
    "TAILSCALE_API_KEY",
    "TAILSCALE_TAILNET",
    "APPRISE_URLS",
    "CHECK_INTERVAL",
    "STATE_FILE",
    "ONLINE_THRESHOLD_SECONDS",
    "RUST_LOG",
];

/// Build a [`Command`] for the binary with env isolation.
///
/// Clears every variable the config loader reads and points the config
/// directory at a nonexistent path.
fn meshwatch_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("meshwatch");
    cmd.env("HOME", "/tmp/meshwatch-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/meshwatch-cli-test-nonexistent");
    for var in ISOLATED_ENV {
        cmd.env_remove(var);
    }
    cmd
}

fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    std::fs::write(&path, body).unwrap();
    path
}

fn state_config(dir: &Path) -> std::path::PathBuf {
    let state = dir.join("state.json");
    write_config(dir, &format!("state_path = {:?}\n", state.display().to_string()))
}

const STATE_FILE: &str = r#"{
  "format": "meshwatch-state",
  "version": 1,
  "saved_at": "2024-06-15T10:00:00Z",
  "devices": {
    "n1": {
      "device_id": "n1",
      "display_name": "laptop",
      "online": true,
      "last_updated": "2024-06-15T10:00:00Z"
    },
    "n2": {
      "device_id": "n2",
      "display_name": "nas",
      "online": false,
      "last_updated": "2024-06-14T08:30:00Z"
    }
  }
}
"#;

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_help_flag() {
    meshwatch_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("tailnet")
            .and(predicate::str::contains("once"))
            .and(predicate::str::contains("state")),
    );
}

#[test]
fn test_version_flag() {
    meshwatch_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("meshwatch"));
}

#[test]
fn test_unknown_subcommand_is_usage_error() {
    meshwatch_cmd().arg("frobnicate").assert().code(2);
}

// ── Startup failures ────────────────────────────────────────────────

#[test]
fn test_missing_token_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "mesh = \"example.com\"\n");

    meshwatch_cmd()
        .arg("--config")
        .arg(&config)
        .arg("once")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("api_token").and(predicate::str::contains(
            "MESHWATCH_API_TOKEN",
        )));
}

#[test]
fn test_missing_config_file_fails_startup() {
    meshwatch_cmd()
        .args(["--config", "/tmp/meshwatch-cli-test-nonexistent/nope.toml", "run"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_unsupported_endpoint_scheme_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        "api_token = \"tskey\"\nmesh = \"example.com\"\nnotify_endpoints = [\"carrier-pigeon://coop\"]\n",
    );

    meshwatch_cmd()
        .arg("--config")
        .arg(&config)
        .arg("run")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("notify_endpoints"));
}

#[test]
fn test_legacy_env_is_read() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");

    meshwatch_cmd()
        .arg("--config")
        .arg(&config)
        .arg("config")
        .env("TAILSCALE_TAILNET", "legacy.example")
        .env("CHECK_INTERVAL", "120")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("mesh = \"legacy.example\"")
                .and(predicate::str::contains("poll_interval_secs = 120")),
        );
}

#[test]
fn test_unreachable_directory_fails_once() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(
        dir.path(),
        &format!(
            "api_token = \"tskey\"\nmesh = \"example.com\"\napi_base = \"http://127.0.0.1:9\"\n\
             request_timeout_secs = 2\nstate_path = {:?}\n",
            dir.path().join("state.json").display().to_string()
        ),
    );

    meshwatch_cmd()
        .arg("--config")
        .arg(&config)
        .arg("once")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Poll cycle failed"));
    assert!(!dir.path().join("state.json").exists());
}

// ── Inspection commands ─────────────────────────────────────────────

#[test]
fn test_config_omits_token() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "api_token = \"tskey-secret\"\nmesh = \"corp\"\n");

    meshwatch_cmd()
        .arg("--config")
        .arg(&config)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("mesh = \"corp\"").and(predicate::str::contains("tskey").not()));
}

#[test]
fn test_state_without_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let config = state_config(dir.path());

    meshwatch_cmd()
        .arg("--config")
        .arg(&config)
        .args(["state", "--json"])
        .assert()
        .success()
        .stdout("{}\n");
}

#[test]
fn test_state_lists_devices() {
    let dir = tempfile::tempdir().unwrap();
    let config = state_config(dir.path());
    std::fs::write(dir.path().join("state.json"), STATE_FILE).unwrap();

    meshwatch_cmd()
        .arg("--config")
        .arg(&config)
        .arg("state")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("n1\tonline\tlaptop")
                .and(predicate::str::contains("n2\toffline\tnas")),
        );
}

#[test]
fn test_state_json_round_trips_records() {
    let dir = tempfile::tempdir().unwrap();
    let config = state_config(dir.path());
    std::fs::write(dir.path().join("state.json"), STATE_FILE).unwrap();

    let output = meshwatch_cmd()
        .arg("--config")
        .arg(&config)
        .args(["state", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["n1"]["online"], true);
    assert_eq!(parsed["n2"]["display_name"], "nas");
}

#[test]
fn test_corrupt_state_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = state_config(dir.path());
    std::fs::write(dir.path().join("state.json"), "{ truncated").unwrap();

    meshwatch_cmd()
        .arg("--config")
        .arg(&config)
        .arg("state")
        .assert()
        .code(4)
        .stderr(predicate::str::contains("State file could not be read"));
    assert!(dir.path().join("state.json").exists());
}
