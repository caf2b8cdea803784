//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own data directory.

use std::path::Path;
use std::process::Command;

use serde_json::Value;
use tempfile::TempDir;

/// Run a CLI command and return (exit code, stdout, stderr).
fn run_cli(dir: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_questlog-cli"))
        .env("QUESTLOG_DATA_DIR", dir)
        .env_remove("QUESTLOG_LOG")
        .args(args)
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

fn run_json(dir: &Path, args: &[&str]) -> Value {
    let (code, stdout, stderr) = run_cli(dir, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("stdout should be JSON")
}

#[test]
fn test_quest_lifecycle() {
    let dir = TempDir::new().unwrap();

    let quest = run_json(dir.path(), &["quest", "add", "Write report", "--kind", "side", "--exp", "50"]);
    let id = quest["id"].as_str().unwrap().to_string();
    assert_eq!(quest["state"], "not_started");
    assert_eq!(quest["kind"]["type"], "side");

    let started = run_json(dir.path(), &["quest", "start", &id]);
    assert_eq!(started["state"], "started");

    let completion = run_json(dir.path(), &["quest", "complete", &id]);
    assert_eq!(completion["quest_id"], id.as_str());
    assert_eq!(completion["exp"]["effective"], 50);
    assert_eq!(completion["gold"], 5);

    let list = run_json(dir.path(), &["quest", "list"]);
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["state"], "completed");

    let open = run_json(dir.path(), &["quest", "list", "--open"]);
    assert!(open.as_array().unwrap().is_empty());
}

#[test]
fn test_second_main_quest_start_fails() {
    let dir = TempDir::new().unwrap();
    let first = run_json(dir.path(), &["quest", "add", "First", "--kind", "main"]);
    let second = run_json(dir.path(), &["quest", "add", "Second", "--kind", "main"]);

    run_json(dir.path(), &["quest", "start", first["id"].as_str().unwrap()]);
    let (code, _, stderr) = run_cli(dir.path(), &["quest", "start", second["id"].as_str().unwrap()]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"), "stderr was: {stderr}");
}

#[test]
fn test_unknown_quest_fails() {
    let dir = TempDir::new().unwrap();
    let (code, _, stderr) = run_cli(dir.path(), &["quest", "start", "missing"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_user_show_defaults() {
    let dir = TempDir::new().unwrap();
    let shown = run_json(dir.path(), &["user", "show"]);
    assert_eq!(shown["user"]["name"], "Player");
    assert_eq!(shown["user"]["level"], 1);
    assert_eq!(shown["exp_multiplier"], 1.0);
    assert_eq!(shown["can_use_redemption"], false);
}

#[test]
fn test_user_update_and_win() {
    let dir = TempDir::new().unwrap();
    let user = run_json(dir.path(), &["user", "update", "--name", "Ayla"]);
    assert_eq!(user["name"], "Ayla");

    let wins = run_json(dir.path(), &["user", "win", "mental"]);
    assert_eq!(wins["all_completed"], false);

    let (code, _, _) = run_cli(dir.path(), &["user", "win", "mental"]);
    assert_eq!(code, 1, "a daily win is claimed once per day");
}

#[test]
fn test_config_get_and_set() {
    let dir = TempDir::new().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["config", "get", "penalty.curse_multiplier"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "0.5");

    let (code, _, _) = run_cli(dir.path(), &["config", "set", "penalty.curse_multiplier", "0.25"]);
    assert_eq!(code, 0);
    let (_, stdout, _) = run_cli(dir.path(), &["config", "get", "penalty.curse_multiplier"]);
    assert_eq!(stdout.trim(), "0.25");

    let (code, _, _) = run_cli(dir.path(), &["config", "set", "penalty.curse_multiplier", "3"]);
    assert_eq!(code, 1, "multipliers above 1 are rejected");
}

#[test]
fn test_history_records_events() {
    let dir = TempDir::new().unwrap();
    run_json(dir.path(), &["quest", "add", "Logged", "--kind", "side"]);

    let history = run_json(dir.path(), &["history", "--kind", "quest_added"]);
    let entries = history.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["kind"], "quest_added");
}

#[test]
fn test_tick_and_curse() {
    let dir = TempDir::new().unwrap();
    run_json(dir.path(), &["tick"]);
    let curse = run_json(dir.path(), &["curse"]);
    assert_eq!(curse["penalty"]["is_cursed"], false);
}

#[test]
fn test_watch_stops_after_ticks() {
    let dir = TempDir::new().unwrap();
    let (code, _, stderr) = run_cli(dir.path(), &["watch", "--interval-secs", "1", "--ticks", "1"]);
    assert_eq!(code, 0, "{stderr}");
}

#[test]
fn test_completions_bash() {
    let dir = TempDir::new().unwrap();
    let (code, stdout, _) = run_cli(dir.path(), &["completions", "bash"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("questlog-cli"));
}
