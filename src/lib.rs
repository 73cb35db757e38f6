//! Core library for the berth deployment tool.
//!
//! A run stages a repository locally, packages it, provisions one remote
//! host over SSH, ships and starts the application in containers, fronts it
//! with nginx and reports health. Every external tool is spawned through the
//! [`CommandRunner`] seam so each stage can be exercised without a network.

pub mod cleanup;
pub mod command;
pub mod config;
pub mod deploy;
pub mod health;
pub mod logging;
pub mod naming;
pub mod package;
pub mod provision;
pub mod proxy;
pub mod remote;
pub mod settings;
pub mod source;
pub mod test_support;

pub use cleanup::{CleanupError, CleanupManager, CleanupReport};
pub use command::{CommandError, CommandOutput, CommandRunner, ProcessCommandRunner};
pub use config::{ConfigError, ConfigValidator, DeploymentConfig, RawInputs};
pub use deploy::{
    CleanupOutcome, DeployError, DeployOutcome, DeployStage, DeploymentOrchestrator, ErrorKind,
    StageFailure,
};
pub use health::{CheckResult, HealthCheck, HealthReport, HealthValidator};
pub use logging::{LoggingError, RunLog, init_run_log};
pub use naming::{NamingError, ProjectName};
pub use package::{ArtifactPackager, DeployableArtifact, DeploymentDescriptor, PackageError};
pub use provision::{ComposeTool, ProvisionManager, ProvisionReport};
pub use proxy::{ProxyError, ProxyRule, ReverseProxyConfigurer};
pub use remote::{
    ConnectionOptions, RemoteError, RemoteExecutor, RemoteOutput, RemoteScript, RemoteSession,
};
pub use settings::{SettingsError, ToolConfig};
pub use source::{RepositoryHandle, SourceError, SourceStager};
