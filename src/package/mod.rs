//! Deployability checks and archive creation.

use std::ffi::OsString;
use std::fmt;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use thiserror::Error;
use tracing::info;

use crate::command::{CommandError, CommandRunner};
use crate::naming::ProjectName;
use crate::settings::ToolConfig;
use crate::source::RepositoryHandle;

/// Compose descriptor file names, in order of preference.
pub const COMPOSE_FILES: [&str; 4] = [
    "docker-compose.yml",
    "docker-compose.yaml",
    "compose.yml",
    "compose.yaml",
];

/// Single-image build descriptor.
pub const BUILD_FILE: &str = "Dockerfile";

/// How the application is built and run on the host.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DeploymentDescriptor {
    /// Multi-service compose file at the working-copy root.
    Compose {
        /// File name relative to the project root.
        file: String,
    },
    /// Single `Dockerfile` at the working-copy root.
    BuildFile,
}

impl fmt::Display for DeploymentDescriptor {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compose { file } => formatter.write_str(file),
            Self::BuildFile => formatter.write_str(BUILD_FILE),
        }
    }
}

/// Archive ready for transfer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeployableArtifact {
    /// Local archive location, adjacent to the working copy.
    pub archive_path: Utf8PathBuf,
    /// Project the archive contains.
    pub project: ProjectName,
    /// Descriptor found at the project root.
    pub descriptor: DeploymentDescriptor,
}

/// Errors raised while verifying or packaging the working copy.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum PackageError {
    /// Neither a compose file nor a `Dockerfile` exists.
    #[error(
        "no deployment descriptor in {path}: expected docker-compose.yml, compose.yml or Dockerfile"
    )]
    MissingDeploymentDescriptor {
        /// Working copy that was inspected.
        path: Utf8PathBuf,
    },
    /// `tar` exited non-zero.
    #[error("archiving {archive} failed with status {status_text}: {stderr}")]
    ArchiveFailed {
        /// Archive that was being written.
        archive: Utf8PathBuf,
        /// Exit status.
        status_text: String,
        /// Captured standard error.
        stderr: String,
    },
    /// Local filesystem access failed.
    #[error("filesystem error at {path}: {message}")]
    Io {
        /// Path being accessed.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// `tar` could not be spawned.
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Detects the deployment descriptor of a working copy.
///
/// Compose files take precedence over a `Dockerfile`.
///
/// # Errors
///
/// Returns [`PackageError::MissingDeploymentDescriptor`] when none exists,
/// or [`PackageError::Io`] when `path` is not a readable directory.
pub fn detect_descriptor(path: &Utf8Path) -> Result<DeploymentDescriptor, PackageError> {
    let root = path.metadata().map_err(|err| PackageError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    if !root.is_dir() {
        return Err(PackageError::Io {
            path: path.to_path_buf(),
            message: String::from("not a directory"),
        });
    }
    // Descriptors may be symlinks pointing outside the working copy.
    let is_file = |name: &str| path.join(name).is_file();

    if let Some(file) = COMPOSE_FILES.iter().find(|name| is_file(name)) {
        return Ok(DeploymentDescriptor::Compose {
            file: (*file).to_owned(),
        });
    }
    if is_file(BUILD_FILE) {
        return Ok(DeploymentDescriptor::BuildFile);
    }
    Err(PackageError::MissingDeploymentDescriptor {
        path: path.to_path_buf(),
    })
}

/// Verifies and archives a working copy.
#[derive(Clone, Debug)]
pub struct ArtifactPackager<R: CommandRunner> {
    runner: R,
    tar_bin: String,
}

impl<R: CommandRunner> ArtifactPackager<R> {
    /// Creates a packager using the tar binary in `tools`.
    #[must_use]
    pub fn new(runner: R, tools: &ToolConfig) -> Self {
        Self {
            runner,
            tar_bin: tools.tar_bin.clone(),
        }
    }

    /// Checks the working copy for a deployment descriptor.
    ///
    /// # Errors
    ///
    /// See [`detect_descriptor`].
    pub fn verify(&self, repo: &RepositoryHandle) -> Result<DeploymentDescriptor, PackageError> {
        let descriptor = detect_descriptor(&repo.path)?;
        info!(project = %repo.project, descriptor = %descriptor, "deployment descriptor found");
        Ok(descriptor)
    }

    /// Writes `<workspace>/<name>.tar.gz`, replacing any stale archive.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::ArchiveFailed`] when tar exits non-zero and
    /// [`PackageError::Io`] when the stale archive cannot be removed.
    pub fn package(
        &self,
        repo: &RepositoryHandle,
        descriptor: DeploymentDescriptor,
    ) -> Result<DeployableArtifact, PackageError> {
        let workspace = repo.path.parent().unwrap_or_else(|| Utf8Path::new("."));
        let archive_name = repo.project.archive_file_name();
        let archive_path = workspace.join(&archive_name);

        remove_local_archive(workspace, &archive_name)?;

        let args = [
            OsString::from("-czf"),
            OsString::from(archive_path.as_str()),
            OsString::from("-C"),
            OsString::from(workspace.as_str()),
            OsString::from(repo.project.as_str()),
        ];
        let output = self.runner.run(&self.tar_bin, &args)?;
        if !output.is_success() {
            return Err(PackageError::ArchiveFailed {
                archive: archive_path,
                status_text: output.status_text(),
                stderr: output.stderr.trim().to_owned(),
            });
        }

        info!(archive = %archive_path, "archive created");
        Ok(DeployableArtifact {
            archive_path,
            project: repo.project.clone(),
            descriptor,
        })
    }
}

/// Deletes `name` from `dir` when present. Returns whether a file was
/// removed.
///
/// # Errors
///
/// Returns [`PackageError::Io`] when the directory cannot be opened or the
/// file cannot be removed.
pub fn remove_local_archive(dir: &Utf8Path, name: &str) -> Result<bool, PackageError> {
    let io_error = |err: std::io::Error| PackageError::Io {
        path: dir.join(name),
        message: err.to_string(),
    };
    let handle = match Dir::open_ambient_dir(dir, ambient_authority()) {
        Ok(handle) => handle,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(io_error(err)),
    };
    match handle.remove_file(name) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(io_error(err)),
    }
}
