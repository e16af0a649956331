//! Basic CLI E2E tests.
//!
//! Tests invoke CLI commands via cargo run and verify outputs. Each test
//! points TEAREADY_DATA_DIR at its own temp directory.

use std::path::Path;
use std::process::Command;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(dir: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new("cargo")
        .args(["run", "-q", "-p", "teaready-cli", "--"])
        .args(args)
        .env("TEAREADY_DATA_DIR", dir)
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn json(stdout: &str) -> serde_json::Value {
    serde_json::from_str(stdout.trim()).expect("Failed to parse JSON output")
}

#[test]
fn test_teas_list() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(dir.path(), &["teas"]);
    assert_eq!(code, 0, "teas failed");
    assert!(stdout.contains("Oolong"));

    let (stdout, _, code) = run_cli(dir.path(), &["teas", "--json"]);
    assert_eq!(code, 0);
    assert_eq!(json(&stdout).as_array().map(Vec::len), Some(9));
}

#[test]
fn test_status_without_session() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(dir.path(), &["status"]);
    assert_eq!(code, 0, "status failed");
    assert_eq!(json(&stdout)["state"], "no_session");
}

#[test]
fn test_start_status_cancel() {
    let dir = tempfile::tempdir().unwrap();

    let (stdout, _, code) = run_cli(dir.path(), &["start", "green"]);
    assert_eq!(code, 0, "start failed");
    let started = json(&stdout);
    assert_eq!(started["type"], "session_started");
    assert_eq!(started["duration_secs"], 120);

    let (stdout, _, code) = run_cli(dir.path(), &["status"]);
    assert_eq!(code, 0);
    let status = json(&stdout);
    assert_eq!(status["state"], "steeping");
    assert_eq!(status["tea"], "Green");

    let (stdout, _, code) = run_cli(dir.path(), &["cancel"]);
    assert_eq!(code, 0);
    assert_eq!(json(&stdout)["type"], "session_cancelled");

    let (stdout, _, code) = run_cli(dir.path(), &["cancel"]);
    assert_eq!(code, 0);
    assert_eq!(json(&stdout)["type"], "no_session");
}

#[test]
fn test_start_with_secs_override() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(dir.path(), &["start", "0", "--secs", "90"]);
    assert_eq!(code, 0);
    assert_eq!(json(&stdout)["duration_secs"], 90);
}

#[test]
fn test_start_unknown_tea_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(dir.path(), &["start", "earl grey"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_dismiss_requires_ready() {
    let dir = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(dir.path(), &["dismiss"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_config_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(dir.path(), &["config", "get", "reminder.enabled"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "true");

    let (_, _, code) = run_cli(dir.path(), &["config", "set", "teas.green", "150"]);
    assert_eq!(code, 0);
    let (stdout, _, _) = run_cli(dir.path(), &["start", "green"]);
    assert_eq!(json(&stdout)["duration_secs"], 150);

    let (_, _, code) = run_cli(dir.path(), &["config", "get", "no.such.key"]);
    assert_eq!(code, 1);
}

#[test]
fn test_hidden_tea_and_temp_unit() {
    let dir = tempfile::tempdir().unwrap();
    let (_, _, code) = run_cli(dir.path(), &["config", "set", "teas.black", "0"]);
    assert_eq!(code, 0);
    let (_, _, code) = run_cli(dir.path(), &["config", "set", "display.temp_unit", "fahrenheit"]);
    assert_eq!(code, 0);

    let (stdout, _, code) = run_cli(dir.path(), &["teas"]);
    assert_eq!(code, 0);
    assert!(!stdout.contains("Black"));
    assert!(stdout.contains("176°F"));

    let (_, stderr, code) = run_cli(dir.path(), &["start", "black"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}
