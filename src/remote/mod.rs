//! Remote execution over SSH and SCP.
//!
//! Every call made against the target host during a run goes through one
//! [`RemoteExecutor`] bound to one [`RemoteSession`], so user, host, key and
//! transport options never drift between stages.

use std::ffi::OsString;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::command::{CommandError, CommandOutput, CommandRunner, status_text};
use crate::config::DeploymentConfig;
use crate::settings::ToolConfig;

mod script;

pub use script::RemoteScript;

/// Transport options shared by every SSH and SCP invocation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConnectionOptions {
    /// TCP port of the SSH daemon.
    pub port: u16,
    /// Connect timeout for the probe and the connectivity check.
    pub probe_timeout_secs: u32,
    /// Connect timeout for every other call.
    pub connect_timeout_secs: u32,
    /// `StrictHostKeyChecking` value.
    pub host_key_policy: String,
    /// Optional `UserKnownHostsFile` override.
    pub known_hosts_file: Option<String>,
}

impl From<&ToolConfig> for ConnectionOptions {
    fn from(tools: &ToolConfig) -> Self {
        Self {
            port: tools.ssh_port,
            probe_timeout_secs: tools.ssh_probe_timeout_secs,
            connect_timeout_secs: tools.ssh_connect_timeout_secs,
            host_key_policy: tools.ssh_host_key_policy.clone(),
            known_hosts_file: tools.ssh_known_hosts_file.clone(),
        }
    }
}

/// Identity of the target host for one run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteSession {
    /// Hostname or IP address.
    pub host: String,
    /// SSH login.
    pub user: String,
    /// Private key file.
    pub key_path: Utf8PathBuf,
    /// Transport options.
    pub options: ConnectionOptions,
}

impl RemoteSession {
    /// Builds the session from validated inputs and tool settings.
    #[must_use]
    pub fn new(config: &DeploymentConfig, tools: &ToolConfig) -> Self {
        Self {
            host: config.ssh_host.clone(),
            user: config.ssh_user.clone(),
            key_path: config.ssh_key_path.clone(),
            options: ConnectionOptions::from(tools),
        }
    }

    /// `user@host` destination string.
    #[must_use]
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// `user@host:` target for scp. IPv6 literals are bracketed, since scp
    /// splits the host from the path at the first unbracketed `:`.
    #[must_use]
    pub fn scp_destination(&self) -> String {
        if self.host.contains(':') {
            format!("{}@[{}]:", self.user, self.host)
        } else {
            format!("{}:", self.destination())
        }
    }

    /// Options common to ssh and scp. The port flag differs between the two
    /// clients and is added by the callers.
    fn auth_options(&self, timeout_secs: u32) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("-i"),
            OsString::from(self.key_path.as_str()),
            OsString::from("-o"),
            OsString::from("IdentitiesOnly=yes"),
            OsString::from("-o"),
            OsString::from("BatchMode=yes"),
            OsString::from("-o"),
            OsString::from("PasswordAuthentication=no"),
            OsString::from("-o"),
            OsString::from(format!(
                "StrictHostKeyChecking={}",
                self.options.host_key_policy
            )),
        ];
        if let Some(file) = self.options.known_hosts_file.as_deref() {
            args.push(OsString::from("-o"));
            args.push(OsString::from(format!("UserKnownHostsFile={file}")));
        }
        args.push(OsString::from("-o"));
        args.push(OsString::from(format!("ConnectTimeout={timeout_secs}")));
        args
    }

    fn ssh_args(&self, timeout_secs: u32, remote_command: &str) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("-p"),
            OsString::from(self.options.port.to_string()),
        ];
        args.extend(self.auth_options(timeout_secs));
        args.push(OsString::from(self.destination()));
        args.push(OsString::from(remote_command));
        args
    }

    fn scp_args(&self, local: &Utf8Path) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("-P"),
            OsString::from(self.options.port.to_string()),
        ];
        args.extend(self.auth_options(self.options.connect_timeout_secs));
        args.push(OsString::from(local.as_str()));
        args.push(OsString::from(self.scp_destination()));
        args
    }
}

/// Captured result of a remote batch.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteOutput {
    /// Exit code of the SSH client, which mirrors the remote shell.
    pub exit_code: Option<i32>,
    /// Remote standard output.
    pub stdout: String,
    /// Remote standard error.
    pub stderr: String,
}

impl RemoteOutput {
    /// Returns `true` when the batch exited with status zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }
}

impl From<CommandOutput> for RemoteOutput {
    fn from(output: CommandOutput) -> Self {
        Self {
            exit_code: output.code,
            stdout: output.stdout,
            stderr: output.stderr,
        }
    }
}

/// Errors raised by remote operations.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RemoteError {
    /// The connectivity check could not authenticate or connect.
    #[error("host {destination} is unreachable over SSH (status {status_text}): {stderr}")]
    Unreachable {
        /// `user@host` that was tried.
        destination: String,
        /// Exit status of the SSH client.
        status_text: String,
        /// Client diagnostics.
        stderr: String,
    },
    /// A batch or upload exited non-zero.
    #[error("remote step `{label}` failed with status {status_text}: {stderr}")]
    CommandFailed {
        /// Label of the batch or upload.
        label: String,
        /// Exit status.
        status_text: String,
        /// Captured standard error.
        stderr: String,
    },
    /// The local SSH or SCP client could not be spawned.
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Runs batches, uploads and probes against one [`RemoteSession`].
#[derive(Clone, Debug)]
pub struct RemoteExecutor<R: CommandRunner> {
    runner: R,
    session: RemoteSession,
    ssh_bin: String,
    scp_bin: String,
    ping_bin: String,
}

impl<R: CommandRunner> RemoteExecutor<R> {
    /// Creates an executor for `session` using the binaries from `tools`.
    #[must_use]
    pub fn new(runner: R, session: RemoteSession, tools: &ToolConfig) -> Self {
        Self {
            runner,
            session,
            ssh_bin: tools.ssh_bin.clone(),
            scp_bin: tools.scp_bin.clone(),
            ping_bin: tools.ping_bin.clone(),
        }
    }

    /// Session every call is made against.
    #[must_use]
    pub const fn session(&self) -> &RemoteSession {
        &self.session
    }

    /// Sends one ICMP echo to the host.
    ///
    /// Many hosts drop ICMP, so the result is advisory: a failure is logged
    /// as a warning and never ends the run.
    #[must_use]
    pub fn probe_reachability(&self) -> bool {
        let args = [
            OsString::from("-c"),
            OsString::from("1"),
            OsString::from("-W"),
            OsString::from(self.session.options.probe_timeout_secs.to_string()),
            OsString::from(self.session.host.as_str()),
        ];
        match self.runner.run(&self.ping_bin, &args) {
            Ok(output) if output.is_success() => true,
            Ok(output) => {
                warn!(
                    host = %self.session.host,
                    status = %output.status_text(),
                    "host did not answer ping; continuing with SSH check"
                );
                false
            }
            Err(err) => {
                warn!(host = %self.session.host, error = %err, "ping probe could not run");
                false
            }
        }
    }

    /// Runs `true` on the host with the short probe timeout.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Unreachable`] when SSH exits non-zero, or
    /// [`RemoteError::Command`] when the client cannot be spawned.
    pub fn test_connection(&self) -> Result<(), RemoteError> {
        let args = self
            .session
            .ssh_args(self.session.options.probe_timeout_secs, "true");
        let output = self.runner.run(&self.ssh_bin, &args)?;
        if output.is_success() {
            return Ok(());
        }
        Err(RemoteError::Unreachable {
            destination: self.session.destination(),
            status_text: output.status_text(),
            stderr: output.stderr.trim().to_owned(),
        })
    }

    /// Runs `script` and fails on a non-zero exit.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::CommandFailed`] on a non-zero exit, or
    /// [`RemoteError::Command`] when the client cannot be spawned.
    pub fn run(&self, script: &RemoteScript) -> Result<RemoteOutput, RemoteError> {
        let output = self.run_unchecked(script)?;
        if output.is_success() {
            return Ok(output);
        }
        Err(RemoteError::CommandFailed {
            label: script.label().to_owned(),
            status_text: status_text(output.exit_code),
            stderr: output.stderr.trim().to_owned(),
        })
    }

    /// Runs `script` and returns its output whatever the exit status.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::Command`] when the client cannot be spawned.
    pub fn run_unchecked(&self, script: &RemoteScript) -> Result<RemoteOutput, RemoteError> {
        let args = self
            .session
            .ssh_args(self.session.options.connect_timeout_secs, &script.render());
        let output = RemoteOutput::from(self.runner.run(&self.ssh_bin, &args)?);
        debug!(
            label = script.label(),
            status = %status_text(output.exit_code),
            stdout = %output.stdout.trim(),
            stderr = %output.stderr.trim(),
            "remote batch finished"
        );
        Ok(output)
    }

    /// Copies `local` into the remote user's home directory.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::CommandFailed`] when `scp` exits non-zero, or
    /// [`RemoteError::Command`] when it cannot be spawned.
    pub fn upload(&self, local: &Utf8Path) -> Result<(), RemoteError> {
        let args = self.session.scp_args(local);
        let output = self.runner.run(&self.scp_bin, &args)?;
        if output.is_success() {
            debug!(file = %local, "upload finished");
            return Ok(());
        }
        Err(RemoteError::CommandFailed {
            label: format!("upload {}", local.file_name().unwrap_or(local.as_str())),
            status_text: output.status_text(),
            stderr: output.stderr.trim().to_owned(),
        })
    }
}
