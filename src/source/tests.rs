//! Unit tests for source staging.

use super::*;
use crate::test_support::{ScriptedRunner, default_tool_config, sample_deployment_config};
use rstest::{fixture, rstest};
use tempfile::TempDir;

struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

#[fixture]
fn workspace() -> Workspace {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 tempdir");
    Workspace { _dir: dir, root }
}

fn stager(runner: &ScriptedRunner) -> SourceStager<ScriptedRunner> {
    SourceStager::new(runner.clone(), &default_tool_config())
}

#[test]
fn authenticated_url_embeds_token_as_user_info() {
    let token = SecretString::from(String::from("abc123"));
    let url = authenticated_url("https://example.com/org/app.git", &token).expect("url");
    assert_eq!(url.expose_secret(), "https://abc123@example.com/org/app.git");
}

#[test]
fn authenticated_url_percent_encodes_token() {
    let token = SecretString::from(String::from("a b@c"));
    let url = authenticated_url("https://example.com/app.git", &token).expect("url");
    assert_eq!(url.expose_secret(), "https://a%20b%40c@example.com/app.git");
}

#[test]
fn authenticated_url_leaves_ssh_remotes_alone() {
    let token = SecretString::from(String::from("abc123"));
    let url = authenticated_url("git@example.com:org/app.git", &token).expect("url");
    assert_eq!(url.expose_secret(), "git@example.com:org/app.git");
}

#[test]
fn redact_masks_every_occurrence() {
    assert_eq!(
        redact("fatal: https://tok@host/ and tok again", "tok"),
        "fatal: https://***@host/ and *** again"
    );
    assert_eq!(redact("nothing here", ""), "nothing here");
}

#[rstest]
fn clones_missing_working_copy_then_scrubs_origin(workspace: Workspace) {
    let runner = ScriptedRunner::permissive();
    let config = sample_deployment_config(&workspace.root);

    let handle = stager(&runner).stage(&config).expect("staging should succeed");

    assert!(!handle.existing_working_copy);
    assert_eq!(handle.path, workspace.root.join("app"));
    assert_eq!(handle.branch, "main");

    let commands: Vec<String> = runner
        .invocations()
        .iter()
        .map(crate::test_support::CommandInvocation::command_string)
        .collect();
    assert_eq!(commands.len(), 3, "commands: {commands:?}");
    assert_eq!(
        commands.first().map(String::as_str),
        Some("git ls-remote --heads https://s3cr3t-token@example.com/app.git")
    );
    assert_eq!(
        commands.get(1).cloned(),
        Some(format!(
            "git clone --branch main https://s3cr3t-token@example.com/app.git {}",
            handle.path
        ))
    );
    assert_eq!(
        commands.get(2).cloned(),
        Some(format!(
            "git -C {} remote set-url origin https://example.com/app.git",
            handle.path
        ))
    );
}

#[rstest]
fn existing_working_copy_takes_update_path(workspace: Workspace) {
    std::fs::create_dir_all(workspace.root.join("app/.git")).expect("create fake clone");
    let runner = ScriptedRunner::permissive();
    let config = sample_deployment_config(&workspace.root);

    let handle = stager(&runner).stage(&config).expect("staging should succeed");

    assert!(handle.existing_working_copy);
    assert!(runner.invoked(" clone ").is_empty(), "must not re-clone");
    assert_eq!(runner.invoked("fetch --prune origin").len(), 1);
    assert_eq!(runner.invoked("checkout main").len(), 1);
    assert_eq!(runner.invoked("pull --ff-only origin main").len(), 1);
    let last = runner
        .invocations()
        .last()
        .map(crate::test_support::CommandInvocation::command_string)
        .expect("final invocation");
    assert!(
        last.ends_with("remote set-url origin https://example.com/app.git"),
        "origin not scrubbed: {last}"
    );
}

#[rstest]
fn unreachable_repository_stops_before_touching_disk(workspace: Workspace) {
    let runner = ScriptedRunner::new();
    runner.fail_on(
        "ls-remote",
        128,
        "fatal: could not read from https://s3cr3t-token@example.com/app.git",
    );
    let config = sample_deployment_config(&workspace.root);

    let err = stager(&runner).stage(&config).expect_err("probe should fail");

    let SourceError::RepositoryUnreachable { url, stderr } = err else {
        panic!("expected RepositoryUnreachable, got {err:?}");
    };
    assert_eq!(url, "https://example.com/app.git");
    assert!(!stderr.contains("s3cr3t-token"), "token leaked: {stderr}");
    assert_eq!(runner.invocations().len(), 1);
    assert!(!workspace.root.join("app").exists());
}

#[rstest]
fn failed_pull_still_scrubs_origin(workspace: Workspace) {
    std::fs::create_dir_all(workspace.root.join("app/.git")).expect("create fake clone");
    let runner = ScriptedRunner::permissive();
    runner.fail_on("pull --ff-only", 1, "fatal: Not possible to fast-forward");
    let config = sample_deployment_config(&workspace.root);

    let err = stager(&runner).stage(&config).expect_err("pull should fail");

    assert!(
        matches!(err, SourceError::GitFailed { ref step, .. } if step == "pull"),
        "unexpected: {err:?}"
    );
    assert_eq!(
        runner
            .invoked("remote set-url origin https://example.com/app.git")
            .len(),
        1
    );
}

#[rstest]
fn foreign_directory_is_replaced_by_fresh_clone(workspace: Workspace) {
    let occupied = workspace.root.join("app");
    std::fs::create_dir_all(&occupied).expect("create foreign dir");
    std::fs::write(occupied.join("stray.txt"), "junk").expect("write stray file");
    let runner = ScriptedRunner::permissive();
    let config = sample_deployment_config(&workspace.root);

    let handle = stager(&runner).stage(&config).expect("staging should succeed");

    assert!(!handle.existing_working_copy);
    assert!(!occupied.exists(), "foreign directory should be removed");
    assert_eq!(runner.invoked("clone --branch main").len(), 1);
}

#[rstest]
fn foreign_directory_is_kept_when_reclone_disabled(workspace: Workspace) {
    let occupied = workspace.root.join("app");
    std::fs::create_dir_all(&occupied).expect("create foreign dir");
    let runner = ScriptedRunner::permissive();
    let tools = ToolConfig {
        reclone_foreign_directories: false,
        ..default_tool_config()
    };
    let config = sample_deployment_config(&workspace.root);

    let err = SourceStager::new(runner.clone(), &tools)
        .stage(&config)
        .expect_err("foreign directory should block staging");

    assert!(matches!(err, SourceError::ForeignDirectory { .. }), "unexpected: {err:?}");
    assert!(occupied.exists());
    assert!(runner.invoked("clone").is_empty());
}
