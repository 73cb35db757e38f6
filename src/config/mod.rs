//! Validation of the per-run deployment inputs.
//!
//! Raw values arrive as optional strings from CLI flags or their `BERTH_*`
//! environment fallbacks. [`ConfigValidator`] turns them into an immutable
//! [`DeploymentConfig`] or reports the first offending field.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use secrecy::SecretString;
use thiserror::Error;

use crate::naming::{CANONICAL_SUFFIX, ProjectName};

/// Branch deployed when none is supplied.
pub const DEFAULT_BRANCH: &str = "main";

/// SSH login used when none is supplied.
pub const DEFAULT_SSH_USER: &str = "ubuntu";

/// Local directory holding working copies when none is supplied.
pub const DEFAULT_WORKSPACE_DIR: &str = ".";

/// Unvalidated run inputs.
#[derive(Clone, Debug, Default)]
pub struct RawInputs {
    /// Repository URL, with or without the `.git` suffix.
    pub repository_url: Option<String>,
    /// Access token used for HTTPS clones.
    pub access_token: Option<String>,
    /// Branch to deploy.
    pub branch: Option<String>,
    /// SSH login on the target host.
    pub ssh_user: Option<String>,
    /// Hostname or IP address of the target host.
    pub ssh_host: Option<String>,
    /// Private key used for SSH authentication.
    pub ssh_key_path: Option<String>,
    /// Port the application listens on.
    pub app_port: Option<String>,
    /// Local directory holding working copies.
    pub workspace_dir: Option<String>,
}

/// Validated, immutable inputs for one run.
#[derive(Clone, Debug)]
pub struct DeploymentConfig {
    /// Repository URL ending in `.git` exactly once.
    pub repository_url: String,
    /// Access token. Never logged or displayed.
    pub access_token: SecretString,
    /// Branch to deploy.
    pub branch: String,
    /// SSH login on the target host.
    pub ssh_user: String,
    /// Hostname or IP address of the target host.
    pub ssh_host: String,
    /// Existing readable private key file.
    pub ssh_key_path: Utf8PathBuf,
    /// Port the application listens on, 1..=65535.
    pub app_port: u16,
    /// Local directory holding working copies.
    pub workspace_dir: Utf8PathBuf,
    /// Project name derived from the repository URL.
    pub project: ProjectName,
}

/// Errors raised while validating run inputs.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// A field is missing or malformed.
    #[error("invalid {field}: {reason}")]
    InvalidConfig {
        /// Name of the offending field.
        field: String,
        /// What is wrong with it.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.to_owned(),
            reason: reason.into(),
        }
    }
}

/// Turns [`RawInputs`] into a [`DeploymentConfig`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates and normalises every field.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfig`] for the first field that fails.
    pub fn validate(self, raw: &RawInputs) -> Result<DeploymentConfig, ConfigError> {
        validate(raw)
    }
}

/// Validates and normalises every field of `raw`.
///
/// Fields are checked in a fixed order so the reported field is
/// deterministic. The only side effect is reading the key file's metadata.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidConfig`] for the first field that fails.
pub fn validate(raw: &RawInputs) -> Result<DeploymentConfig, ConfigError> {
    let repository_url = normalise_repository_url(raw.repository_url.as_deref())?;
    let project = ProjectName::from_repository_url(&repository_url)
        .map_err(|err| ConfigError::invalid("repository_url", err.to_string()))?;
    let access_token = required(raw.access_token.as_deref(), "access_token")?;
    let ssh_host = validate_host(raw.ssh_host.as_deref())?;
    let ssh_user = validate_user(raw.ssh_user.as_deref())?;
    let branch = validate_branch(raw.branch.as_deref())?;
    let app_port = parse_port(raw.app_port.as_deref())?;
    let ssh_key_path = validate_key_path(raw.ssh_key_path.as_deref())?;
    let workspace_dir = optional(raw.workspace_dir.as_deref())
        .map_or_else(|| Utf8PathBuf::from(DEFAULT_WORKSPACE_DIR), |dir| {
            Utf8PathBuf::from(expand_tilde(dir))
        });

    Ok(DeploymentConfig {
        repository_url,
        access_token: SecretString::from(access_token),
        branch,
        ssh_user,
        ssh_host,
        ssh_key_path,
        app_port,
        workspace_dir,
        project,
    })
}

/// Trims a trailing `/` and appends `.git` unless already present.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidConfig`] when the URL is missing or blank.
pub fn normalise_repository_url(value: Option<&str>) -> Result<String, ConfigError> {
    let url = required(value, "repository_url")?;
    let trimmed = url.trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::invalid("repository_url", "must not be empty"));
    }
    if trimmed.ends_with(CANONICAL_SUFFIX) {
        Ok(trimmed.to_owned())
    } else {
        Ok(format!("{trimmed}{CANONICAL_SUFFIX}"))
    }
}

/// Parses an application port made of ASCII digits only.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidConfig`] for signs, spaces, non-digits,
/// zero, or values above 65535.
pub fn parse_port(value: Option<&str>) -> Result<u16, ConfigError> {
    required(value, "app_port")?;
    let text = value.unwrap_or_default();
    if !text.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(ConfigError::invalid(
            "app_port",
            format!("{text:?} must contain digits only"),
        ));
    }
    let port: u16 = text
        .parse()
        .map_err(|_| ConfigError::invalid("app_port", format!("{text} exceeds 65535")))?;
    if port == 0 {
        return Err(ConfigError::invalid("app_port", "must be between 1 and 65535"));
    }
    Ok(port)
}

/// Expands a leading `~/` prefix to the user's home directory.
///
/// Returns the input unchanged when `HOME` is unset.
#[must_use]
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return format!("{}/{rest}", home.to_string_lossy());
    }
    path.to_owned()
}

fn optional(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|text| !text.is_empty())
}

fn required(value: Option<&str>, field: &str) -> Result<String, ConfigError> {
    optional(value)
        .map(str::to_owned)
        .ok_or_else(|| ConfigError::invalid(field, "must not be empty"))
}

fn has_forbidden_chars(value: &str) -> bool {
    value
        .chars()
        .any(|ch| ch.is_whitespace() || ch.is_control())
}

fn reject_option_like(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.starts_with('-') {
        return Err(ConfigError::invalid(field, "must not start with '-'"));
    }
    Ok(())
}

fn validate_host(value: Option<&str>) -> Result<String, ConfigError> {
    let host = required(value, "ssh_host")?;
    if has_forbidden_chars(&host) {
        return Err(ConfigError::invalid(
            "ssh_host",
            "must not contain whitespace or control characters",
        ));
    }
    reject_option_like(&host, "ssh_host")?;
    Ok(host)
}

fn validate_user(value: Option<&str>) -> Result<String, ConfigError> {
    let Some(user) = optional(value) else {
        return Ok(DEFAULT_SSH_USER.to_owned());
    };
    if has_forbidden_chars(user) || user.contains('@') {
        return Err(ConfigError::invalid(
            "ssh_user",
            "must not contain whitespace, control characters or '@'",
        ));
    }
    reject_option_like(user, "ssh_user")?;
    Ok(user.to_owned())
}

fn validate_branch(value: Option<&str>) -> Result<String, ConfigError> {
    let Some(branch) = optional(value) else {
        return Ok(DEFAULT_BRANCH.to_owned());
    };
    if has_forbidden_chars(branch) {
        return Err(ConfigError::invalid(
            "branch",
            "must not contain whitespace or control characters",
        ));
    }
    reject_option_like(branch, "branch")?;
    Ok(branch.to_owned())
}

fn validate_key_path(value: Option<&str>) -> Result<Utf8PathBuf, ConfigError> {
    let raw = required(value, "ssh_key_path")?;
    let expanded = Utf8PathBuf::from(expand_tilde(&raw));
    check_readable_file(&expanded)
        .map_err(|reason| ConfigError::invalid("ssh_key_path", format!("{expanded}: {reason}")))?;
    Ok(expanded)
}

/// Symlinks are resolved first; the checks run against the target.
fn check_readable_file(path: &Utf8Path) -> Result<(), String> {
    let resolved = path.canonicalize_utf8().map_err(|err| err.to_string())?;
    let (Some(dir_path), Some(file_name)) = (resolved.parent(), resolved.file_name()) else {
        return Err(String::from("not a regular file"));
    };

    let dir =
        Dir::open_ambient_dir(dir_path, ambient_authority()).map_err(|err| err.to_string())?;
    let metadata = dir.metadata(file_name).map_err(|err| err.to_string())?;
    if !metadata.is_file() {
        return Err(String::from("not a regular file"));
    }
    dir.open(file_name).map_err(|err| err.to_string())?;
    Ok(())
}
