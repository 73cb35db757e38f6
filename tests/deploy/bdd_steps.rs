//! BDD step definitions for deployment behaviour.

use berth::DeployStage;
use rstest_bdd_macros::{given, then, when};

use super::test_helpers::{
    CONNECTIVITY_PATTERN, DeployContext, HEALTH_PATTERN, REPORT_PATTERN, RunOutcome,
    create_working_copy,
};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

fn outcome(deploy_context: &DeployContext) -> Result<&RunOutcome, StepError> {
    deploy_context
        .outcome
        .as_ref()
        .ok_or_else(|| StepError::Assertion(String::from("missing outcome")))
}

#[given("a working copy of \"{url}\" on branch \"{branch}\" with \"{descriptor}\"")]
fn working_copy(
    mut deploy_context: DeployContext,
    url: String,
    branch: String,
    descriptor: String,
) -> DeployContext {
    let name = url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .trim_end_matches(".git")
        .to_owned();
    create_working_copy(&deploy_context.workspace, &name, descriptor.trim());
    deploy_context.raw.repository_url = Some(url);
    deploy_context.raw.branch = Some(branch);
    deploy_context
}

#[given("deployment inputs for \"{url}\"")]
fn deployment_inputs(mut deploy_context: DeployContext, url: String) -> DeployContext {
    deploy_context.raw.repository_url = Some(url);
    deploy_context.raw.app_port = Some(String::from("8080"));
    deploy_context
}

#[given("the application listens on port \"{port}\"")]
fn application_port(mut deploy_context: DeployContext, port: String) -> DeployContext {
    deploy_context.raw.app_port = Some(port);
    deploy_context
}

#[given("a reachable host with healthy services")]
fn reachable_host(deploy_context: DeployContext) -> DeployContext {
    deploy_context.runner.respond_to(
        REPORT_PATTERN,
        Some(0),
        "docker=Docker version 24.0.5\nnginx=nginx/1.18.0\ncompose_plugin=2.20.2\n",
    );
    deploy_context.runner.respond_to(
        HEALTH_PATTERN,
        Some(0),
        "docker=pass\nnginx=pass\nhttp=pass\n",
    );
    deploy_context
}

#[given("a host that refuses SSH connections")]
fn unreachable_host(deploy_context: DeployContext) -> DeployContext {
    deploy_context.runner.fail_on(
        CONNECTIVITY_PATTERN,
        255,
        "ssh: connect to host 203.0.113.10 port 22: Connection refused",
    );
    deploy_context
}

#[when("I run the deployment")]
fn run_deployment(mut deploy_context: DeployContext) -> DeployContext {
    let result = deploy_context.orchestrator().deploy(&deploy_context.raw);
    deploy_context.outcome = Some(match result {
        Ok(outcome) => RunOutcome::Deployed(Box::new(outcome)),
        Err(failure) => RunOutcome::Failed(failure),
    });
    deploy_context
}

#[when("I run the cleanup")]
fn run_cleanup(mut deploy_context: DeployContext) -> DeployContext {
    let result = deploy_context.orchestrator().cleanup(&deploy_context.raw);
    deploy_context.outcome = Some(match result {
        Ok(outcome) => RunOutcome::CleanedUp(outcome),
        Err(failure) => RunOutcome::Failed(failure),
    });
    deploy_context
}

#[then("the deployment reached the \"{stage}\" stage")]
fn reached_stage(deploy_context: &DeployContext, stage: String) -> Result<(), StepError> {
    let RunOutcome::Deployed(deployed) = outcome(deploy_context)? else {
        return Err(StepError::Assertion(format!(
            "expected a successful deployment, got {:?}",
            deploy_context.outcome
        )));
    };
    if deployed
        .stages
        .iter()
        .any(|reached| reached.as_str() == stage.trim())
    {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "stage {stage} missing from {:?}",
            deployed.stages
        )))
    }
}

#[then("{passed:u32} of {total:u32} health checks pass")]
fn health_checks_pass(
    deploy_context: &DeployContext,
    passed: u32,
    total: u32,
) -> Result<(), StepError> {
    let RunOutcome::Deployed(deployed) = outcome(deploy_context)? else {
        return Err(StepError::Assertion(String::from(
            "expected a successful deployment",
        )));
    };
    let expected = format!("{passed}/{total}");
    if deployed.health.to_string() == expected {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {expected} healthy, got {}",
            deployed.health
        )))
    }
}

#[then("the run fails at the \"{stage}\" stage")]
fn fails_at_stage(deploy_context: &DeployContext, stage: String) -> Result<(), StepError> {
    let RunOutcome::Failed(failure) = outcome(deploy_context)? else {
        return Err(StepError::Assertion(String::from("expected the run to fail")));
    };
    if failure.stage.as_str() == stage.trim() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected failure at {stage}, got {failure}"
        )))
    }
}

#[then("no provisioning, transfer or deployment command was sent")]
fn nothing_sent_after_connectivity(deploy_context: &DeployContext) -> Result<(), StepError> {
    let scripts = deploy_context.remote_scripts();
    let uploads = deploy_context.runner.invoked("scp ");
    if scripts == [String::from("true")] && uploads.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "unexpected remote traffic: scripts {scripts:?}, uploads {uploads:?}"
        )))
    }
}

#[then("the cleanup removed the remote project \"{project}\"")]
fn cleanup_removed_project(deploy_context: &DeployContext, project: String) -> Result<(), StepError> {
    let RunOutcome::CleanedUp(cleaned) = outcome(deploy_context)? else {
        return Err(StepError::Assertion(String::from("expected cleanup to succeed")));
    };
    if cleaned.stages.last() != Some(&DeployStage::CleanedUp) {
        return Err(StepError::Assertion(format!(
            "cleanup stopped early: {:?}",
            cleaned.stages
        )));
    }
    let removal = format!("rm -rf \"$HOME\"/{}", project.trim());
    if deploy_context
        .remote_scripts()
        .iter()
        .any(|script| script.contains(&removal))
    {
        Ok(())
    } else {
        Err(StepError::Assertion(format!("no `{removal}` command was sent")))
    }
}

#[then("the run exits with code \"{code}\"")]
fn run_exit_code(deploy_context: &DeployContext, code: String) -> Result<(), StepError> {
    let actual = outcome(deploy_context)?.exit_code();
    if actual.to_string() == code.trim() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected exit code {code}, got {actual}"
        )))
    }
}
