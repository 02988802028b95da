//! Runs the `attester-bridge` binary against scripted fake engines.

use std::process::{Command, Output};

use attester_core::EngineKind;
use attester_test_utils::FakeEngine;
use serde_json::{Value, json};
use tempfile::TempDir;

fn tasks_list() -> Value {
    json!({"event": "tasksList", "tasks": [
        {"taskId": 1, "name": "Suite", "subTasks": [
            {"taskId": 2, "name": "passes"},
            {"taskId": 3, "name": "fails"}
        ]}
    ]})
}

fn bridge(engine: &FakeEngine, config_home: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_attester-bridge"))
        .env("XDG_CONFIG_HOME", config_home.path())
        .env_remove("ATTESTER_PATH")
        .env_remove("ATJSTESTRUNNER_PATH")
        .env_remove("ATTESTER_NODE_BIN")
        .env_remove("ATTESTER_PHANTOMJS_BIN")
        .arg("--engine-root")
        .arg(engine.root())
        .args(["--node", "sh", "--phantomjs", "true"])
        .args(args)
        .output()
        .expect("failed to run attester-bridge")
}

#[test]
fn list_prints_the_tree() {
    let engine = FakeEngine::builder(EngineKind::AtJsTestRunner)
        .message(tasks_list())
        .then("exec sleep 3600")
        .build();
    let home = tempfile::tempdir().unwrap();

    let output = bridge(
        &engine,
        &home,
        &["--engine", "atjstestrunner", "list", "--", "--any"],
    );
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert_eq!(stdout, "atjstestrunner\n  Suite\n    passes\n    fails\n");
}

#[test]
fn run_json_reports_failures_and_exits_non_zero() {
    let engine = FakeEngine::builder(EngineKind::AtJsTestRunner)
        .message(tasks_list())
        .message(json!({"event": "taskStarted", "taskId": 2}))
        .message(json!({"event": "taskFinished", "taskId": 2}))
        .message(json!({"event": "taskStarted", "taskId": 3}))
        .message(json!({"event": "error", "taskId": 3, "error": {
            "failure": false,
            "message": "TypeError: x is undefined",
            "stack": [{"className": "Suite", "function": "fails", "file": "suite.js"}]
        }}))
        .message(json!({"event": "taskFinished", "taskId": 3}))
        .message(json!({"event": "campaignFinished"}))
        .build();
    let home = tempfile::tempdir().unwrap();

    let output = bridge(
        &engine,
        &home,
        &["--engine", "atjstestrunner", "run", "--json", "--", "--any"],
    );
    assert_eq!(output.status.code(), Some(1));

    let summary: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["engine"], "atjstestrunner");
    assert_eq!(summary["started"], 2);
    assert_eq!(summary["finished"], 2);
    assert_eq!(summary["failed"], 1);
    assert_eq!(summary["failures"][0]["test"], "atjstestrunner/Suite/fails");
    assert_eq!(summary["failures"][0]["kind"], "error");
    assert_eq!(summary["failures"][0]["stack"][0], "Suite.fails(suite.js)");
}

#[test]
fn run_json_keeps_engine_diagnostics_off_stdout() {
    let engine = FakeEngine::builder(EngineKind::AtJsTestRunner)
        .before("echo 'engine warming up' >&2")
        .message(tasks_list())
        .message(json!({"event": "taskIgnored", "taskId": 2}))
        .message(json!({"event": "taskIgnored", "taskId": 3}))
        .message(json!({"event": "campaignFinished"}))
        .build();
    let home = tempfile::tempdir().unwrap();

    let output = bridge(
        &engine,
        &home,
        &["--engine", "atjstestrunner", "run", "--json", "--", "--any"],
    );
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(!stdout.contains("warming up"), "stdout: {stdout}");
    let summary: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(summary["ignored"], 2);
    assert_eq!(summary["failed"], 0);
}

#[test]
fn attester_run_succeeds_without_failures() {
    let engine = FakeEngine::builder(EngineKind::Attester)
        .message(tasks_list())
        .message(json!({"event": "taskIgnored", "taskId": 3}))
        .message(json!({"event": "campaignFinished"}))
        .build();
    let campaign = engine.touch("nightly.yml");
    let home = tempfile::tempdir().unwrap();

    let output = bridge(&engine, &home, &["run", campaign.to_str().unwrap()]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("IGNORED  nightly/Suite/fails"));
    assert!(stdout.contains("0 started, 0 finished, 1 ignored, 0 failed"));
}

#[test]
fn missing_campaign_file_fails() {
    let engine = FakeEngine::builder(EngineKind::Attester).build();
    let home = tempfile::tempdir().unwrap();

    let output = bridge(&engine, &home, &["list", "does-not-exist.yml"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("configuration file not found"), "stderr: {stderr}");
}

#[test]
fn init_writes_config_once() {
    let engine = FakeEngine::builder(EngineKind::Attester).build();
    let home = tempfile::tempdir().unwrap();

    let output = bridge(&engine, &home, &["init"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let written =
        std::fs::read_to_string(home.path().join("attester-bridge").join("config.toml")).unwrap();
    assert!(written.contains("[paths]"));
    assert!(written.contains("node = \"sh\""));
    assert!(written.contains(&engine.root().display().to_string()));

    let again = bridge(&engine, &home, &["init"]);
    assert!(!again.status.success());
    assert!(String::from_utf8_lossy(&again.stderr).contains("--force"));

    let forced = bridge(&engine, &home, &["init", "--force"]);
    assert!(forced.status.success());
}
