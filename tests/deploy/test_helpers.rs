//! Shared fixtures and helpers for deployment BDD scenarios.

use std::sync::Arc;

use berth::test_support::{ScriptedRunner, default_tool_config};
use berth::{CleanupOutcome, DeployOutcome, DeploymentOrchestrator, RawInputs, StageFailure};
use camino::{Utf8Path, Utf8PathBuf};
use rstest::fixture;
use tempfile::TempDir;

pub const HOST: &str = "203.0.113.10";
pub const CONNECTIVITY_PATTERN: &str = "@203.0.113.10 true";
pub const REPORT_PATTERN: &str = "compose_plugin=";
pub const HEALTH_PATTERN: &str = "http://localhost/";

#[derive(Clone, Debug)]
pub enum RunOutcome {
    Deployed(Box<DeployOutcome>),
    CleanedUp(CleanupOutcome),
    Failed(StageFailure),
}

impl RunOutcome {
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Deployed(_) | Self::CleanedUp(_) => 0,
            Self::Failed(_) => 1,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DeployContext {
    pub workspace: Utf8PathBuf,
    pub raw: RawInputs,
    pub runner: ScriptedRunner,
    pub outcome: Option<RunOutcome>,
    _tmp: Arc<TempDir>,
}

impl DeployContext {
    pub fn orchestrator(&self) -> DeploymentOrchestrator<ScriptedRunner> {
        DeploymentOrchestrator::new(self.runner.clone(), default_tool_config())
    }

    pub fn remote_scripts(&self) -> Vec<String> {
        self.runner
            .invocations()
            .iter()
            .filter(|call| call.program == "ssh")
            .filter_map(|call| call.args.last().map(|arg| arg.to_string_lossy().into_owned()))
            .collect()
    }
}

#[fixture]
pub fn deploy_context() -> DeployContext {
    let tmp = TempDir::new().unwrap_or_else(|err| panic!("create workspace: {err}"));
    let workspace = Utf8PathBuf::from_path_buf(tmp.path().to_path_buf())
        .unwrap_or_else(|path| panic!("workspace path is not UTF-8: {}", path.display()));
    let key = workspace.join("id_test");
    std::fs::write(&key, "key").unwrap_or_else(|err| panic!("write key file: {err}"));

    let raw = RawInputs {
        repository_url: None,
        access_token: Some(String::from("s3cr3t-token")),
        branch: None,
        ssh_user: None,
        ssh_host: Some(HOST.to_owned()),
        ssh_key_path: Some(key.to_string()),
        app_port: None,
        workspace_dir: Some(workspace.to_string()),
    };

    DeployContext {
        workspace,
        raw,
        runner: ScriptedRunner::permissive(),
        outcome: None,
        _tmp: Arc::new(tmp),
    }
}

/// Creates `<workspace>/<name>/.git` plus the given descriptor file.
pub fn create_working_copy(workspace: &Utf8Path, name: &str, descriptor: &str) {
    let checkout = workspace.join(name);
    std::fs::create_dir_all(checkout.join(".git"))
        .unwrap_or_else(|err| panic!("create working copy: {err}"));
    std::fs::write(checkout.join(descriptor), "services: {}\n")
        .unwrap_or_else(|err| panic!("write descriptor: {err}"));
}
