//! BDD scenarios for deployment and cleanup runs.

use rstest_bdd_macros::scenario;

use super::test_helpers::{DeployContext, deploy_context};

#[scenario(
    path = "tests/features/deploy.feature",
    name = "Deploy a compose application end to end"
)]
fn scenario_compose_end_to_end(deploy_context: DeployContext) {
    let _ = deploy_context;
}

#[scenario(
    path = "tests/features/deploy.feature",
    name = "Stop when the host is unreachable"
)]
fn scenario_unreachable_host(deploy_context: DeployContext) {
    let _ = deploy_context;
}

#[scenario(
    path = "tests/features/deploy.feature",
    name = "Clean up a host that never saw a deployment"
)]
fn scenario_cleanup_without_deployment(deploy_context: DeployContext) {
    let _ = deploy_context;
}
