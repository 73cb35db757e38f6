//! Tool and transport settings loaded via `ortho-config`.
//!
//! These values describe *how* a run reaches its collaborators (binary
//! names, SSH timeouts, host-key policy) rather than *what* is deployed, so
//! they live in `berth.toml` or `BERTH_TOOLS_*` environment variables
//! instead of the per-run inputs.

use std::ffi::OsString;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Host-key policy applied when none is configured.
pub const DEFAULT_HOST_KEY_POLICY: &str = "accept-new";

/// External tool and SSH settings.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "BERTH_TOOLS",
    discovery(
        app_name = "berth",
        env_var = "BERTH_CONFIG_PATH",
        config_file_name = "berth.toml",
        dotfile_name = ".berth.toml",
        project_file_name = "berth.toml"
    )
)]
pub struct ToolConfig {
    /// Path to the `git` executable.
    #[ortho_config(default = "git".to_owned())]
    pub git_bin: String,
    /// Path to the `tar` executable.
    #[ortho_config(default = "tar".to_owned())]
    pub tar_bin: String,
    /// Path to the `ssh` executable.
    #[ortho_config(default = "ssh".to_owned())]
    pub ssh_bin: String,
    /// Path to the `scp` executable.
    #[ortho_config(default = "scp".to_owned())]
    pub scp_bin: String,
    /// Path to the `ping` executable used for the advisory probe.
    #[ortho_config(default = "ping".to_owned())]
    pub ping_bin: String,
    /// TCP port of the remote SSH daemon.
    #[ortho_config(default = 22)]
    pub ssh_port: u16,
    /// Connect timeout for the reachability probe and the connectivity
    /// check. Kept short so an unreachable host fails the run quickly.
    #[ortho_config(default = 5)]
    pub ssh_probe_timeout_secs: u32,
    /// Connect timeout for every other SSH and SCP invocation.
    #[ortho_config(default = 30)]
    pub ssh_connect_timeout_secs: u32,
    /// Value passed as `StrictHostKeyChecking`. The default `accept-new`
    /// trusts a host on first use and rejects changed keys afterwards.
    #[ortho_config(default = DEFAULT_HOST_KEY_POLICY.to_owned())]
    pub ssh_host_key_policy: String,
    /// Optional `UserKnownHostsFile` override.
    pub ssh_known_hosts_file: Option<String>,
    /// Whether a non-git directory occupying the working-copy path may be
    /// deleted and replaced by a fresh clone.
    #[ortho_config(default = true)]
    pub reclone_foreign_directories: bool,
}

/// Errors raised while loading or validating tool settings.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SettingsError {
    /// Merging configuration layers failed.
    #[error("tool configuration parsing failed: {0}")]
    Parse(String),
    /// A required value is blank or zero.
    #[error("missing {field}: set BERTH_TOOLS_{env_suffix} or add {field} to berth.toml", env_suffix = field.to_uppercase())]
    InvalidValue {
        /// Field that failed validation.
        field: String,
    },
}

impl ToolConfig {
    /// Loads settings from defaults, configuration files and environment
    /// variables without parsing the process arguments.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, SettingsError> {
        Self::load_from_iter([OsString::from("berth")])
            .map_err(|err| SettingsError::Parse(err.to_string()))
    }

    /// Ensures binaries and policies are non-blank and timeouts non-zero.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::InvalidValue`] naming the first bad field.
    pub fn validate(&self) -> Result<(), SettingsError> {
        Self::require_value(&self.git_bin, "git_bin")?;
        Self::require_value(&self.tar_bin, "tar_bin")?;
        Self::require_value(&self.ssh_bin, "ssh_bin")?;
        Self::require_value(&self.scp_bin, "scp_bin")?;
        Self::require_value(&self.ping_bin, "ping_bin")?;
        Self::require_value(&self.ssh_host_key_policy, "ssh_host_key_policy")?;
        Self::require_positive(u32::from(self.ssh_port), "ssh_port")?;
        Self::require_positive(self.ssh_probe_timeout_secs, "ssh_probe_timeout_secs")?;
        Self::require_positive(self.ssh_connect_timeout_secs, "ssh_connect_timeout_secs")?;
        if let Some(file) = self.ssh_known_hosts_file.as_deref() {
            Self::require_value(file, "ssh_known_hosts_file")?;
        }
        Ok(())
    }

    fn require_value(value: &str, field: &str) -> Result<(), SettingsError> {
        if value.trim().is_empty() {
            return Err(SettingsError::InvalidValue {
                field: field.to_owned(),
            });
        }
        Ok(())
    }

    fn require_positive(value: u32, field: &str) -> Result<(), SettingsError> {
        if value == 0 {
            return Err(SettingsError::InvalidValue {
                field: field.to_owned(),
            });
        }
        Ok(())
    }
}
