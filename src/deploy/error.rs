//! Error taxonomy for deployment runs.

use std::fmt;

use thiserror::Error;

use super::DeployStage;
use crate::cleanup::CleanupError;
use crate::config::ConfigError;
use crate::package::PackageError;
use crate::proxy::ProxyError;
use crate::remote::RemoteError;
use crate::settings::SettingsError;
use crate::source::SourceError;

/// Category of a fatal failure.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    /// Inputs or tool settings failed validation.
    InvalidConfig,
    /// The repository could not be listed.
    RepositoryUnreachable,
    /// Cloning or updating the working copy failed.
    SourceStageFailed,
    /// The working copy has neither a compose file nor a `Dockerfile`.
    MissingDeploymentDescriptor,
    /// The host refused or timed out the SSH connectivity check.
    RemoteUnreachable,
    /// A remote batch or upload exited non-zero.
    RemoteCommandFailed,
    /// nginx rejected the generated site.
    ProxyConfigInvalid,
    /// Local I/O or process spawn failure.
    Unexpected,
}

impl ErrorKind {
    /// Stable identifier used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidConfig => "InvalidConfig",
            Self::RepositoryUnreachable => "RepositoryUnreachable",
            Self::SourceStageFailed => "SourceStageFailed",
            Self::MissingDeploymentDescriptor => "MissingDeploymentDescriptor",
            Self::RemoteUnreachable => "RemoteUnreachable",
            Self::RemoteCommandFailed => "RemoteCommandFailed",
            Self::ProxyConfigInvalid => "ProxyConfigInvalid",
            Self::Unexpected => "Unexpected",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Any error a stage can raise.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum DeployError {
    /// Run inputs are invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Tool settings are invalid.
    #[error(transparent)]
    Settings(#[from] SettingsError),
    /// Source staging failed.
    #[error(transparent)]
    Source(#[from] SourceError),
    /// Verification or packaging failed.
    #[error(transparent)]
    Package(#[from] PackageError),
    /// A remote operation failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),
    /// Proxy configuration failed.
    #[error(transparent)]
    Proxy(#[from] ProxyError),
    /// Cleanup failed.
    #[error(transparent)]
    Cleanup(#[from] CleanupError),
}

impl DeployError {
    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::Settings(_) => ErrorKind::InvalidConfig,
            Self::Source(err) => source_kind(err),
            Self::Package(err) => package_kind(err),
            Self::Remote(err) | Self::Proxy(ProxyError::Remote(err)) => remote_kind(err),
            Self::Proxy(ProxyError::ConfigInvalid { .. }) => ErrorKind::ProxyConfigInvalid,
            Self::Cleanup(CleanupError::Remote(err)) => remote_kind(err),
            Self::Cleanup(CleanupError::Local(err)) => package_kind(err),
        }
    }
}

const fn source_kind(err: &SourceError) -> ErrorKind {
    match err {
        SourceError::RepositoryUnreachable { .. } => ErrorKind::RepositoryUnreachable,
        SourceError::InvalidUrl { .. }
        | SourceError::GitFailed { .. }
        | SourceError::ForeignDirectory { .. } => ErrorKind::SourceStageFailed,
        SourceError::Io { .. } | SourceError::Command(_) => ErrorKind::Unexpected,
    }
}

const fn package_kind(err: &PackageError) -> ErrorKind {
    match err {
        PackageError::MissingDeploymentDescriptor { .. } => ErrorKind::MissingDeploymentDescriptor,
        PackageError::ArchiveFailed { .. } | PackageError::Io { .. } | PackageError::Command(_) => {
            ErrorKind::Unexpected
        }
    }
}

const fn remote_kind(err: &RemoteError) -> ErrorKind {
    match err {
        RemoteError::Unreachable { .. } => ErrorKind::RemoteUnreachable,
        RemoteError::CommandFailed { .. } => ErrorKind::RemoteCommandFailed,
        RemoteError::Command(_) => ErrorKind::Unexpected,
    }
}

/// Fatal failure of a run, tagged with the stage that was being attempted.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{stage} stage failed ({kind}): {error}", kind = error.kind())]
pub struct StageFailure {
    /// Stage that did not complete.
    pub stage: DeployStage,
    /// Underlying error.
    #[source]
    pub error: DeployError,
}

impl StageFailure {
    /// Classification of the underlying error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}
