//! Command-line interface definitions for the `berth` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Default directory for run logs.
pub(crate) const DEFAULT_LOG_DIR: &str = "logs";

/// Top-level CLI for the `berth` binary.
///
/// Every input can also come from its `BERTH_*` environment variable. Values
/// are validated as a whole before anything is spawned, so missing inputs
/// are reported by the validator rather than by the parser.
#[derive(Debug, Parser)]
#[command(
    name = "berth",
    version,
    about = "Stage, ship and proxy a containerised application on a single remote host over SSH"
)]
pub(crate) struct Cli {
    /// Tear down the deployment on the host instead of deploying.
    #[arg(long)]
    pub(crate) cleanup: bool,
    /// Repository URL; `.git` is appended when missing.
    #[arg(long, env = "BERTH_REPOSITORY_URL", value_name = "URL")]
    pub(crate) repository_url: Option<String>,
    /// Access token used for HTTPS clones.
    #[arg(long, env = "BERTH_ACCESS_TOKEN", value_name = "TOKEN", hide_env_values = true)]
    pub(crate) access_token: Option<String>,
    /// Branch to deploy [default: main].
    #[arg(long, env = "BERTH_BRANCH", value_name = "BRANCH")]
    pub(crate) branch: Option<String>,
    /// SSH login on the target host [default: ubuntu].
    #[arg(long, env = "BERTH_SSH_USER", value_name = "USER")]
    pub(crate) ssh_user: Option<String>,
    /// Hostname or IP address of the target host.
    #[arg(long, env = "BERTH_SSH_HOST", value_name = "HOST")]
    pub(crate) ssh_host: Option<String>,
    /// Private key used for SSH authentication.
    #[arg(long = "ssh-key", env = "BERTH_SSH_KEY_PATH", value_name = "PATH")]
    pub(crate) ssh_key_path: Option<String>,
    /// Port the application listens on.
    #[arg(long, env = "BERTH_APP_PORT", value_name = "PORT")]
    pub(crate) app_port: Option<String>,
    /// Local directory holding working copies [default: .].
    #[arg(long, env = "BERTH_WORKSPACE_DIR", value_name = "DIR")]
    pub(crate) workspace_dir: Option<String>,
    /// Directory receiving the run log.
    #[arg(long, env = "BERTH_LOG_DIR", value_name = "DIR", default_value = DEFAULT_LOG_DIR)]
    pub(crate) log_dir: String,
}
