//! Teardown of deployed containers and transferred artifacts.

use camino::Utf8Path;
use thiserror::Error;
use tracing::info;

use crate::command::CommandRunner;
use crate::naming::ProjectName;
use crate::package::{COMPOSE_FILES, PackageError, remove_local_archive};
use crate::remote::{RemoteError, RemoteExecutor, RemoteScript};

/// What a cleanup run removed.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CleanupReport {
    /// Whether a leftover local archive was deleted.
    pub local_archive_removed: bool,
}

/// Errors raised during cleanup.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum CleanupError {
    /// The remote teardown batch failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),
    /// The local archive could not be deleted.
    #[error(transparent)]
    Local(#[from] PackageError),
}

/// Removes the application from the host and the local workspace.
#[derive(Clone, Copy, Debug, Default)]
pub struct CleanupManager;

impl CleanupManager {
    /// Teardown batch. Every container step tolerates absence, so the batch
    /// succeeds on a host that never saw a deployment.
    #[must_use]
    pub fn script(project: &ProjectName) -> RemoteScript {
        let dir = format!("\"$HOME\"/{project}");
        let container = project.container_name();
        let compose_files = COMPOSE_FILES.join(" ");
        RemoteScript::new("cleanup").commands_from([
            format!(
                "for file in {compose_files}; do \
                 if [ -f {dir}/\"$file\" ]; then \
                 (cd {dir} && (docker compose -f \"$file\" down --remove-orphans \
                 || docker-compose -f \"$file\" down --remove-orphans)) || true; \
                 fi; done"
            ),
            format!("docker stop {container} >/dev/null 2>&1 || true"),
            format!("docker rm {container} >/dev/null 2>&1 || true"),
            String::from("docker network prune -f >/dev/null 2>&1 || true"),
            format!("rm -rf {dir} \"$HOME\"/{}", project.archive_file_name()),
        ])
    }

    /// Tears down the remote deployment and deletes the local archive.
    ///
    /// # Errors
    ///
    /// Returns [`CleanupError::Remote`] when the batch fails and
    /// [`CleanupError::Local`] when the local archive cannot be removed.
    pub fn cleanup<R: CommandRunner>(
        self,
        remote: &RemoteExecutor<R>,
        project: &ProjectName,
        workspace: &Utf8Path,
    ) -> Result<CleanupReport, CleanupError> {
        remote.run(&Self::script(project))?;
        let local_archive_removed = remove_local_archive(workspace, &project.archive_file_name())?;
        info!(project = %project, local_archive_removed, "cleanup finished");
        Ok(CleanupReport {
            local_archive_removed,
        })
    }
}
