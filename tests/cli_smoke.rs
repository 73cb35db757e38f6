//! Behavioural smoke tests for the CLI entrypoint.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

const INPUT_VARS: [&str; 9] = [
    "BERTH_REPOSITORY_URL",
    "BERTH_ACCESS_TOKEN",
    "BERTH_BRANCH",
    "BERTH_SSH_USER",
    "BERTH_SSH_HOST",
    "BERTH_SSH_KEY_PATH",
    "BERTH_APP_PORT",
    "BERTH_WORKSPACE_DIR",
    "BERTH_LOG_DIR",
];

fn berth(log_dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("berth");
    for var in INPUT_VARS {
        cmd.env_remove(var);
    }
    cmd.env("BERTH_LOG_DIR", log_dir.path());
    cmd
}

fn log_dir() -> TempDir {
    TempDir::new().expect("create log dir")
}

#[test]
fn help_lists_cleanup_flag() {
    let logs = log_dir();
    berth(&logs)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--cleanup"));
}

#[test]
fn missing_inputs_fail_with_exit_code_one() {
    let logs = log_dir();
    berth(&logs)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("error:"))
        .stderr(predicate::str::contains("Validated stage failed (InvalidConfig)"));
}

#[test]
fn invalid_port_is_rejected_before_any_command_runs() {
    let logs = log_dir();
    let key = logs.path().join("id_test");
    std::fs::write(&key, "key").expect("write key");

    berth(&logs)
        .args([
            "--repository-url",
            "https://example.com/app",
            "--access-token",
            "s3cr3t-token",
            "--ssh-host",
            "203.0.113.10",
            "--app-port",
            "abc",
        ])
        .arg("--ssh-key")
        .arg(&key)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("app_port"))
        .stderr(predicate::str::contains("s3cr3t-token").not());
}

#[test]
fn failed_run_leaves_a_log_file() {
    let logs = log_dir();
    berth(&logs)
        .arg("--cleanup")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("see the run log for details"));

    let entries: Vec<_> = std::fs::read_dir(logs.path())
        .expect("read log dir")
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    assert!(
        entries
            .iter()
            .any(|name| name.starts_with("deploy_") && name.ends_with(".log")),
        "{entries:?}"
    );
}
