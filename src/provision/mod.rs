//! Host provisioning: container engine and reverse proxy.
//!
//! Installation runs as one checked batch. Package indexes are always
//! refreshed; each package is installed only when its command is missing. Versions are then collected by a
//! second, unchecked batch that prints `key=value` lines.

use std::fmt;

use tracing::{info, warn};

use crate::command::CommandRunner;
use crate::remote::{RemoteError, RemoteExecutor, RemoteScript};

const DOCKER_KEY: &str = "docker";
const NGINX_KEY: &str = "nginx";
const COMPOSE_PLUGIN_KEY: &str = "compose_plugin";
const COMPOSE_STANDALONE_KEY: &str = "compose_standalone";

/// Compose implementation available on the host.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ComposeTool {
    /// `docker compose` CLI plugin.
    Plugin {
        /// Reported version string.
        version: String,
    },
    /// Standalone `docker-compose` binary.
    Standalone {
        /// Reported version string.
        version: String,
    },
}

impl ComposeTool {
    /// Command prefix used to invoke this tool.
    #[must_use]
    pub const fn command(&self) -> &'static str {
        match self {
            Self::Plugin { .. } => "docker compose",
            Self::Standalone { .. } => "docker-compose",
        }
    }

    /// Reported version string.
    #[must_use]
    pub fn version(&self) -> &str {
        match self {
            Self::Plugin { version } | Self::Standalone { version } => version,
        }
    }
}

impl fmt::Display for ComposeTool {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} ({})", self.command(), self.version())
    }
}

/// Installed engine versions after provisioning.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ProvisionReport {
    /// `docker --version` output.
    pub container_engine: Option<String>,
    /// `nginx -v` output.
    pub proxy_engine: Option<String>,
    /// Detected compose tool, plugin preferred.
    pub compose: Option<ComposeTool>,
}

impl ProvisionReport {
    /// Parses `key=value` lines. Unknown keys and empty values are ignored.
    #[must_use]
    pub fn parse(stdout: &str) -> Self {
        let mut report = Self::default();
        let mut standalone = None;
        for line in stdout.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let version = value.trim();
            if version.is_empty() {
                continue;
            }
            let owned = Some(version.to_owned());
            match key.trim() {
                DOCKER_KEY => report.container_engine = owned,
                NGINX_KEY => report.proxy_engine = owned,
                COMPOSE_PLUGIN_KEY => {
                    report.compose = Some(ComposeTool::Plugin {
                        version: version.to_owned(),
                    });
                }
                COMPOSE_STANDALONE_KEY => standalone = owned,
                _ => {}
            }
        }
        if report.compose.is_none() {
            report.compose = standalone.map(|version| ComposeTool::Standalone { version });
        }
        report
    }
}

/// Ensures docker and nginx are installed, enabled and running.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProvisionManager;

impl ProvisionManager {
    /// Batch installing and enabling both engines for `ssh_user`.
    #[must_use]
    pub fn install_script(ssh_user: &str) -> RemoteScript {
        let user = shell_escape::unix::escape(ssh_user.into());
        RemoteScript::new("provision host")
            .command("export DEBIAN_FRONTEND=noninteractive")
            .command("sudo -n apt-get update -y")
            .command(
                "if ! command -v docker >/dev/null 2>&1 || ! command -v nginx >/dev/null 2>&1; \
                 then sudo -n -E apt-get install -y docker.io nginx; fi",
            )
            .command("command -v curl >/dev/null 2>&1 || sudo -n -E apt-get install -y curl")
            .command(
                "docker compose version >/dev/null 2>&1 || \
                 command -v docker-compose >/dev/null 2>&1 || \
                 sudo -n -E apt-get install -y docker-compose-v2 || \
                 sudo -n -E apt-get install -y docker-compose || true",
            )
            .command(format!("sudo -n usermod -aG docker {user}"))
            .command("sudo -n systemctl enable --now docker")
            .command("sudo -n systemctl enable --now nginx")
    }

    /// Unchecked batch printing one `key=value` line per engine.
    #[must_use]
    pub fn report_script() -> RemoteScript {
        RemoteScript::new("report versions").commands_from([
            format!("echo \"{DOCKER_KEY}=$(docker --version 2>/dev/null || true)\""),
            format!("echo \"{NGINX_KEY}=$(sudo -n nginx -v 2>&1 || true)\""),
            format!(
                "echo \"{COMPOSE_PLUGIN_KEY}=$(docker compose version --short 2>/dev/null || true)\""
            ),
            format!(
                "echo \"{COMPOSE_STANDALONE_KEY}=$(docker-compose --version 2>/dev/null || true)\""
            ),
        ])
    }

    /// Installs the engines, then reports their versions.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError`] when the installation batch fails or the
    /// report batch cannot be spawned.
    pub fn provision<R: CommandRunner>(
        self,
        remote: &RemoteExecutor<R>,
        ssh_user: &str,
    ) -> Result<ProvisionReport, RemoteError> {
        remote.run(&Self::install_script(ssh_user))?;
        let output = remote.run_unchecked(&Self::report_script())?;
        let report = ProvisionReport::parse(&output.stdout);

        info!(
            docker = report.container_engine.as_deref().unwrap_or("unknown"),
            nginx = report.proxy_engine.as_deref().unwrap_or("unknown"),
            "host provisioned"
        );
        match report.compose.as_ref() {
            Some(tool) => info!(compose = %tool, "compose tool available"),
            None => warn!("no compose tool found; compose deployments will fail"),
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests;
