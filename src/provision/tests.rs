//! Unit tests for provisioning batches and version parsing.

use super::*;
use crate::remote::RemoteSession;
use crate::test_support::{ScriptedRunner, default_tool_config, sample_deployment_config};
use camino::Utf8Path;
use rstest::rstest;

fn executor(runner: &ScriptedRunner) -> RemoteExecutor<ScriptedRunner> {
    let tools = default_tool_config();
    let config = sample_deployment_config(Utf8Path::new("/work"));
    RemoteExecutor::new(runner.clone(), RemoteSession::new(&config, &tools), &tools)
}

#[test]
fn parses_full_report_preferring_plugin() {
    let report = ProvisionReport::parse(
        "docker=Docker version 24.0.5, build ced0996\n\
         nginx=nginx version: nginx/1.18.0 (Ubuntu)\n\
         compose_plugin=2.20.2\n\
         compose_standalone=docker-compose version 1.29.2\n",
    );
    assert_eq!(
        report.container_engine.as_deref(),
        Some("Docker version 24.0.5, build ced0996")
    );
    assert_eq!(
        report.proxy_engine.as_deref(),
        Some("nginx version: nginx/1.18.0 (Ubuntu)")
    );
    assert_eq!(
        report.compose,
        Some(ComposeTool::Plugin {
            version: String::from("2.20.2")
        })
    );
}

#[rstest]
#[case::standalone_only(
    "compose_plugin=\ncompose_standalone=docker-compose version 1.29.2\n",
    Some("docker-compose")
)]
#[case::none("docker=Docker version 24\ncompose_plugin=\ncompose_standalone=\n", None)]
#[case::garbage("no separator here\n", None)]
fn detects_compose_tool(#[case] stdout: &str, #[case] command: Option<&str>) {
    let report = ProvisionReport::parse(stdout);
    assert_eq!(report.compose.as_ref().map(ComposeTool::command), command);
}

#[test]
fn install_script_covers_engines_and_group() {
    let script = ProvisionManager::install_script("ubuntu");
    let rendered = script.render();
    assert_eq!(
        script.commands().get(1).map(String::as_str),
        Some("sudo -n apt-get update -y"),
        "package indexes are refreshed on every run"
    );
    let curl_step = script
        .commands()
        .iter()
        .find(|line| line.contains("install -y curl"))
        .expect("curl install step");
    assert!(
        curl_step.starts_with("command -v curl") && !curl_step.contains("nginx"),
        "curl must be installed on its own: {curl_step}"
    );
    for fragment in [
        "apt-get install -y docker.io nginx",
        "usermod -aG docker ubuntu",
        "systemctl enable --now docker",
        "systemctl enable --now nginx",
    ] {
        assert!(rendered.contains(fragment), "missing {fragment}:\n{rendered}");
    }
}

#[test]
fn provision_runs_install_then_unchecked_report() {
    let runner = ScriptedRunner::new();
    runner.push_success();
    runner.push_output(
        Some(1),
        "docker=Docker version 24.0.5\nnginx=nginx/1.18.0\ncompose_plugin=\ncompose_standalone=\n",
        "",
    );

    let report = ProvisionManager
        .provision(&executor(&runner), "ubuntu")
        .expect("provisioning should succeed");

    assert_eq!(report.container_engine.as_deref(), Some("Docker version 24.0.5"));
    assert!(report.compose.is_none());
    assert_eq!(runner.invocations().len(), 2);
}

#[test]
fn failed_install_stops_before_report() {
    let runner = ScriptedRunner::new();
    runner.push_output(Some(100), "", "E: Unable to locate package");

    let err = ProvisionManager
        .provision(&executor(&runner), "ubuntu")
        .expect_err("install failure should surface");

    assert!(
        matches!(err, RemoteError::CommandFailed { ref label, .. } if label == "provision host"),
        "unexpected: {err:?}"
    );
    assert_eq!(runner.invocations().len(), 1);
}
