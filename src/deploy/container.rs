//! Remote extraction and container (re)deployment.
//!
//! Containers are always fully replaced: compose projects are taken down
//! before being brought up again, and the single-image container is removed
//! before the fresh image runs.

use tracing::info;

use crate::command::CommandRunner;
use crate::naming::ProjectName;
use crate::package::{DeployableArtifact, DeploymentDescriptor};
use crate::provision::ComposeTool;
use crate::remote::{RemoteError, RemoteExecutor, RemoteScript};

/// Compose command used when provisioning detected no compose tool.
pub const FALLBACK_COMPOSE_COMMAND: &str = "docker compose";

fn remote_dir(project: &ProjectName) -> String {
    format!("\"$HOME\"/{project}")
}

/// Batch replacing the remote copy with the uploaded archive's contents.
#[must_use]
pub fn extract_script(project: &ProjectName) -> RemoteScript {
    RemoteScript::new("extract archive").commands_from([
        format!("rm -rf {}", remote_dir(project)),
        format!(
            "tar -xzf \"$HOME\"/{} -C \"$HOME\"",
            project.archive_file_name()
        ),
    ])
}

/// Batch recreating a compose project with `file`.
#[must_use]
pub fn compose_script(
    project: &ProjectName,
    file: &str,
    compose: Option<&ComposeTool>,
) -> RemoteScript {
    let command = compose.map_or(FALLBACK_COMPOSE_COMMAND, ComposeTool::command);
    let file_arg = shell_escape::unix::escape(file.into());
    RemoteScript::new("compose deploy").commands_from([
        format!("cd {}", remote_dir(project)),
        format!("{command} -f {file_arg} down --remove-orphans"),
        format!("{command} -f {file_arg} up -d --build"),
    ])
}

/// Batch rebuilding and restarting the single application container.
#[must_use]
pub fn build_file_script(project: &ProjectName, app_port: u16) -> RemoteScript {
    let container = project.container_name();
    let image = project.image_reference();
    RemoteScript::new("container deploy").commands_from([
        format!("cd {}", remote_dir(project)),
        format!("docker stop {container} >/dev/null 2>&1 || true"),
        format!("docker rm {container} >/dev/null 2>&1 || true"),
        format!("docker build -t {image} ."),
        format!(
            "docker run -d --name {container} --restart unless-stopped -p {app_port}:{app_port} {image}"
        ),
    ])
}

/// Brings up the application described by `artifact`.
///
/// # Errors
///
/// Returns [`RemoteError`] when the deployment batch fails.
pub fn deploy_container<R: CommandRunner>(
    remote: &RemoteExecutor<R>,
    artifact: &DeployableArtifact,
    compose: Option<&ComposeTool>,
    app_port: u16,
) -> Result<(), RemoteError> {
    let script = match &artifact.descriptor {
        DeploymentDescriptor::Compose { file } => compose_script(&artifact.project, file, compose),
        DeploymentDescriptor::BuildFile => build_file_script(&artifact.project, app_port),
    };
    remote.run(&script)?;
    info!(project = %artifact.project, descriptor = %artifact.descriptor, "containers running");
    Ok(())
}
