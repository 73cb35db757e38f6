//! Deployment state machine.
//!
//! A run walks the stages of [`DeployStage`] in order. The first failure ends
//! it with a [`StageFailure`]; nothing is rolled back, so remote changes stay
//! in place for inspection and a rerun picks up from the same inputs.

use std::fmt;

use tracing::{debug, info};

use crate::cleanup::{CleanupManager, CleanupReport};
use crate::command::{CommandRunner, ProcessCommandRunner};
use crate::config::{self, DeploymentConfig, RawInputs};
use crate::health::{HealthReport, HealthValidator};
use crate::naming::ProjectName;
use crate::package::{
    ArtifactPackager, DeployableArtifact, DeploymentDescriptor, remove_local_archive,
};
use crate::provision::{ProvisionManager, ProvisionReport};
use crate::proxy::{ProxyRule, ReverseProxyConfigurer};
use crate::remote::{RemoteError, RemoteExecutor, RemoteSession};
use crate::settings::ToolConfig;
use crate::source::SourceStager;

pub mod container;
mod error;

pub use error::{DeployError, ErrorKind, StageFailure};

/// States a run moves through.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum DeployStage {
    /// Inputs and tool settings validated.
    Validated,
    /// Working copy cloned or updated.
    Staged,
    /// Descriptor found and archive written.
    Verified,
    /// SSH connectivity check passed.
    ConnectivityConfirmed,
    /// Engines installed and running.
    Provisioned,
    /// Archive uploaded and extracted.
    Transferred,
    /// Application containers running.
    ContainerDeployed,
    /// Reverse proxy installed and reloaded.
    ProxyConfigured,
    /// Health checks ran.
    DeploymentValidated,
    /// Deployment torn down.
    CleanedUp,
}

impl DeployStage {
    /// Stable identifier used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validated => "Validated",
            Self::Staged => "Staged",
            Self::Verified => "Verified",
            Self::ConnectivityConfirmed => "ConnectivityConfirmed",
            Self::Provisioned => "Provisioned",
            Self::Transferred => "Transferred",
            Self::ContainerDeployed => "ContainerDeployed",
            Self::ProxyConfigured => "ProxyConfigured",
            Self::DeploymentValidated => "DeploymentValidated",
            Self::CleanedUp => "CleanedUp",
        }
    }
}

impl fmt::Display for DeployStage {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Result of a successful deployment.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeployOutcome {
    /// Deployed project.
    pub project: ProjectName,
    /// Descriptor the application was deployed with.
    pub descriptor: DeploymentDescriptor,
    /// Whether an existing working copy was updated.
    pub existing_working_copy: bool,
    /// Engine versions found after provisioning.
    pub provision: ProvisionReport,
    /// Post-deployment checks.
    pub health: HealthReport,
    /// Stages completed, in order.
    pub stages: Vec<DeployStage>,
}

/// Result of a successful cleanup.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CleanupOutcome {
    /// Project that was torn down.
    pub project: ProjectName,
    /// What was removed.
    pub report: CleanupReport,
    /// Stages completed, in order.
    pub stages: Vec<DeployStage>,
}

#[derive(Debug, Default)]
struct Progress {
    stages: Vec<DeployStage>,
}

impl Progress {
    fn record<T, E>(&mut self, stage: DeployStage, result: Result<T, E>) -> Result<T, StageFailure>
    where
        E: Into<DeployError>,
    {
        match result {
            Ok(value) => {
                info!(stage = %stage, "stage complete");
                self.stages.push(stage);
                Ok(value)
            }
            Err(err) => Err(StageFailure {
                stage,
                error: err.into(),
            }),
        }
    }
}

/// Drives a deployment or cleanup run against one host.
#[derive(Clone, Debug)]
pub struct DeploymentOrchestrator<R: CommandRunner + Clone> {
    runner: R,
    tools: ToolConfig,
}

impl DeploymentOrchestrator<ProcessCommandRunner> {
    /// Convenience constructor that wires the real process runner.
    #[must_use]
    pub const fn with_process_runner(tools: ToolConfig) -> Self {
        Self::new(ProcessCommandRunner, tools)
    }
}

impl<R: CommandRunner + Clone> DeploymentOrchestrator<R> {
    /// Creates an orchestrator spawning every command through `runner`.
    #[must_use]
    pub const fn new(runner: R, tools: ToolConfig) -> Self {
        Self { runner, tools }
    }

    /// Runs the full deployment pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`StageFailure`] naming the first stage that failed. Health
    /// check failures are reported in the outcome instead.
    pub fn deploy(&self, raw: &RawInputs) -> Result<DeployOutcome, StageFailure> {
        let mut progress = Progress::default();
        let config = progress.record(DeployStage::Validated, self.validate(raw))?;

        let stager = SourceStager::new(self.runner.clone(), &self.tools);
        let repo = progress.record(DeployStage::Staged, stager.stage(&config))?;

        let packager = ArtifactPackager::new(self.runner.clone(), &self.tools);
        let artifact = progress.record(
            DeployStage::Verified,
            packager
                .verify(&repo)
                .and_then(|descriptor| packager.package(&repo, descriptor)),
        )?;

        let remote = self.executor(&config);
        progress.record(DeployStage::ConnectivityConfirmed, confirm(&remote))?;

        let provision = progress.record(
            DeployStage::Provisioned,
            ProvisionManager.provision(&remote, &config.ssh_user),
        )?;

        progress.record(DeployStage::Transferred, transfer(&remote, &artifact))?;

        progress.record(
            DeployStage::ContainerDeployed,
            container::deploy_container(
                &remote,
                &artifact,
                provision.compose.as_ref(),
                config.app_port,
            ),
        )?;

        progress.record(
            DeployStage::ProxyConfigured,
            ReverseProxyConfigurer.configure(&remote, &ProxyRule::for_app_port(config.app_port)),
        )?;

        let health = HealthValidator.validate(&remote);
        progress.record(DeployStage::DeploymentValidated, Ok::<_, DeployError>(()))?;

        Ok(DeployOutcome {
            project: artifact.project,
            descriptor: artifact.descriptor,
            existing_working_copy: repo.existing_working_copy,
            provision,
            health,
            stages: progress.stages,
        })
    }

    /// Tears down a deployment. Only a successful connectivity check is
    /// required; no previous deployment needs to exist.
    ///
    /// # Errors
    ///
    /// Returns [`StageFailure`] naming the first stage that failed.
    pub fn cleanup(&self, raw: &RawInputs) -> Result<CleanupOutcome, StageFailure> {
        let mut progress = Progress::default();
        let config = progress.record(DeployStage::Validated, self.validate(raw))?;

        let remote = self.executor(&config);
        progress.record(DeployStage::ConnectivityConfirmed, confirm(&remote))?;

        let report = progress.record(
            DeployStage::CleanedUp,
            CleanupManager.cleanup(&remote, &config.project, &config.workspace_dir),
        )?;

        Ok(CleanupOutcome {
            project: config.project,
            report,
            stages: progress.stages,
        })
    }

    fn validate(&self, raw: &RawInputs) -> Result<DeploymentConfig, DeployError> {
        self.tools.validate()?;
        Ok(config::validate(raw)?)
    }

    fn executor(&self, config: &DeploymentConfig) -> RemoteExecutor<R> {
        RemoteExecutor::new(
            self.runner.clone(),
            RemoteSession::new(config, &self.tools),
            &self.tools,
        )
    }
}

fn confirm<R: CommandRunner>(remote: &RemoteExecutor<R>) -> Result<(), RemoteError> {
    let answered_ping = remote.probe_reachability();
    debug!(answered_ping, "reachability probe finished");
    remote.test_connection()
}

fn transfer<R: CommandRunner>(
    remote: &RemoteExecutor<R>,
    artifact: &DeployableArtifact,
) -> Result<(), DeployError> {
    remote.upload(&artifact.archive_path)?;
    remote.run(&container::extract_script(&artifact.project))?;
    if let Some(dir) = artifact.archive_path.parent()
        && let Some(name) = artifact.archive_path.file_name()
    {
        remove_local_archive(dir, name)?;
    }
    Ok(())
}
