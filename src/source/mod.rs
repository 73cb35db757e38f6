//! Local working copy management.
//!
//! [`SourceStager`] clones the repository on first use and updates it in
//! place afterwards. The access token only ever travels on git's command
//! line: `origin` is reset to the plain URL before staging returns, and any
//! git output quoted in an error is redacted.

use std::ffi::OsString;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::command::{CommandError, CommandOutput, CommandRunner};
use crate::config::DeploymentConfig;
use crate::naming::ProjectName;
use crate::settings::ToolConfig;

/// Placeholder substituted for the token in quoted output.
pub const REDACTED: &str = "***";

/// Up-to-date working copy on the target branch.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RepositoryHandle {
    /// Project name, also the directory name.
    pub project: ProjectName,
    /// Working copy location.
    pub path: Utf8PathBuf,
    /// Checked out branch.
    pub branch: String,
    /// Whether an existing clone was updated rather than created.
    pub existing_working_copy: bool,
}

/// Errors raised while staging the source.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SourceError {
    /// The repository URL cannot carry credentials.
    #[error("cannot embed credentials in {url}: {reason}")]
    InvalidUrl {
        /// Token-free repository URL.
        url: String,
        /// Parser or encoder message.
        reason: String,
    },
    /// `git ls-remote` could not reach the repository.
    #[error("repository {url} is unreachable: {stderr}")]
    RepositoryUnreachable {
        /// Token-free repository URL.
        url: String,
        /// Redacted git diagnostics.
        stderr: String,
    },
    /// A git step exited non-zero.
    #[error("git {step} failed with status {status_text}: {stderr}")]
    GitFailed {
        /// Short name of the git step.
        step: String,
        /// Exit status.
        status_text: String,
        /// Redacted git diagnostics.
        stderr: String,
    },
    /// A non-git directory occupies the working copy path and replacing it
    /// is disabled.
    #[error(
        "{path} exists but is not a git working copy; remove it or enable reclone_foreign_directories"
    )]
    ForeignDirectory {
        /// Occupied path.
        path: Utf8PathBuf,
    },
    /// Local filesystem access failed.
    #[error("filesystem error at {path}: {message}")]
    Io {
        /// Path being accessed.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// git could not be spawned.
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Embeds `token` as the user-info of an HTTP(S) repository URL.
///
/// Other URLs, including scp-style SSH remotes, are returned unchanged.
///
/// # Errors
///
/// Returns [`SourceError::InvalidUrl`] when an HTTP(S) URL cannot carry a
/// username.
pub fn authenticated_url(
    repository_url: &str,
    token: &SecretString,
) -> Result<SecretString, SourceError> {
    let Ok(mut url) = Url::parse(repository_url) else {
        return Ok(SecretString::from(repository_url.to_owned()));
    };
    if !matches!(url.scheme(), "http" | "https") {
        return Ok(SecretString::from(repository_url.to_owned()));
    }
    url.set_username(token.expose_secret())
        .map_err(|()| SourceError::InvalidUrl {
            url: repository_url.to_owned(),
            reason: String::from("URL has no host"),
        })?;
    url.set_password(None).map_err(|()| SourceError::InvalidUrl {
        url: repository_url.to_owned(),
        reason: String::from("URL has no host"),
    })?;
    Ok(SecretString::from(String::from(url)))
}

/// Replaces every occurrence of `secret` in `text` with [`REDACTED`].
#[must_use]
pub fn redact(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        return text.to_owned();
    }
    text.replace(secret, REDACTED)
}

/// Clones or updates the working copy.
#[derive(Clone, Debug)]
pub struct SourceStager<R: CommandRunner> {
    runner: R,
    git_bin: String,
    reclone_foreign_directories: bool,
}

struct GitContext<'a> {
    path: &'a Utf8Path,
    auth_url: &'a SecretString,
    secrets: [String; 2],
}

impl<R: CommandRunner> SourceStager<R> {
    /// Creates a stager using the git binary and reclone policy in `tools`.
    #[must_use]
    pub fn new(runner: R, tools: &ToolConfig) -> Self {
        Self {
            runner,
            git_bin: tools.git_bin.clone(),
            reclone_foreign_directories: tools.reclone_foreign_directories,
        }
    }

    /// Produces an up-to-date working copy of `config.branch`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::RepositoryUnreachable`] when the remote cannot
    /// be listed, [`SourceError::GitFailed`] for any failing git step,
    /// [`SourceError::ForeignDirectory`] when a non-git directory is in the
    /// way and may not be replaced, and [`SourceError::Io`] for local
    /// filesystem failures.
    pub fn stage(&self, config: &DeploymentConfig) -> Result<RepositoryHandle, SourceError> {
        let project = config.project.clone();
        let path = config.workspace_dir.join(project.as_str());
        let auth_url = authenticated_url(&config.repository_url, &config.access_token)?;
        let ctx = GitContext {
            path: &path,
            auth_url: &auth_url,
            secrets: secret_forms(&config.access_token),
        };

        self.probe_remote(&ctx, &config.repository_url)?;

        let workspace = open_workspace(&config.workspace_dir)?;
        let existing_working_copy = self.prepare_directory(&workspace, &path, project.as_str())?;

        let staged = if existing_working_copy {
            self.update(&ctx, &config.branch)
        } else {
            self.clone_fresh(&ctx, &config.branch)
        };
        let scrubbed = if existing_working_copy || staged.is_ok() {
            self.reset_origin(&ctx, &config.repository_url)
        } else {
            Ok(())
        };
        staged?;
        scrubbed?;

        if existing_working_copy {
            info!(path = %path, branch = %config.branch, "working copy updated");
        } else {
            info!(path = %path, branch = %config.branch, "repository cloned");
        }
        Ok(RepositoryHandle {
            project,
            path,
            branch: config.branch.clone(),
            existing_working_copy,
        })
    }

    fn probe_remote(&self, ctx: &GitContext<'_>, plain_url: &str) -> Result<(), SourceError> {
        let args = [
            OsString::from("ls-remote"),
            OsString::from("--heads"),
            OsString::from(ctx.auth_url.expose_secret()),
        ];
        let output = self.runner.run(&self.git_bin, &args)?;
        if output.is_success() {
            return Ok(());
        }
        Err(SourceError::RepositoryUnreachable {
            url: plain_url.to_owned(),
            stderr: ctx.redacted(&output.stderr),
        })
    }

    /// Returns `true` when `path` already holds a git working copy.
    fn prepare_directory(
        &self,
        workspace: &Dir,
        path: &Utf8Path,
        name: &str,
    ) -> Result<bool, SourceError> {
        if !workspace.exists(name) {
            return Ok(false);
        }
        if workspace.is_dir(name) && workspace.exists(format!("{name}/.git")) {
            return Ok(true);
        }
        if !self.reclone_foreign_directories {
            return Err(SourceError::ForeignDirectory {
                path: path.to_path_buf(),
            });
        }

        warn!(path = %path, "replacing non-git directory with a fresh clone");
        let removed = if workspace.is_dir(name) {
            workspace.remove_dir_all(name)
        } else {
            workspace.remove_file(name)
        };
        removed.map_err(|err| SourceError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Ok(false)
    }

    fn update(&self, ctx: &GitContext<'_>, branch: &str) -> Result<(), SourceError> {
        self.git_in(
            ctx,
            "remote set-url",
            &["remote", "set-url", "origin", ctx.auth_url.expose_secret()],
        )?;
        self.git_in(ctx, "fetch", &["fetch", "--prune", "origin"])?;
        self.git_in(ctx, "checkout", &["checkout", branch])?;
        self.git_in(ctx, "pull", &["pull", "--ff-only", "origin", branch])
    }

    fn clone_fresh(&self, ctx: &GitContext<'_>, branch: &str) -> Result<(), SourceError> {
        let args = [
            OsString::from("clone"),
            OsString::from("--branch"),
            OsString::from(branch),
            OsString::from(ctx.auth_url.expose_secret()),
            OsString::from(ctx.path.as_str()),
        ];
        let output = self.runner.run(&self.git_bin, &args)?;
        ctx.check("clone", &output)
    }

    fn reset_origin(&self, ctx: &GitContext<'_>, plain_url: &str) -> Result<(), SourceError> {
        self.git_in(
            ctx,
            "remote set-url",
            &["remote", "set-url", "origin", plain_url],
        )
    }

    fn git_in(&self, ctx: &GitContext<'_>, step: &str, args: &[&str]) -> Result<(), SourceError> {
        let mut full = vec![OsString::from("-C"), OsString::from(ctx.path.as_str())];
        full.extend(args.iter().map(OsString::from));
        let output = self.runner.run(&self.git_bin, &full)?;
        ctx.check(step, &output)
    }
}

impl GitContext<'_> {
    fn redacted(&self, text: &str) -> String {
        let cleaned = self
            .secrets
            .iter()
            .fold(text.to_owned(), |acc, secret| redact(&acc, secret));
        cleaned.trim().to_owned()
    }

    fn check(&self, step: &str, output: &CommandOutput) -> Result<(), SourceError> {
        if output.is_success() {
            return Ok(());
        }
        Err(SourceError::GitFailed {
            step: step.to_owned(),
            status_text: output.status_text(),
            stderr: self.redacted(&output.stderr),
        })
    }
}

/// The raw token and its percent-encoded form as it appears in URLs.
fn secret_forms(token: &SecretString) -> [String; 2] {
    let raw = token.expose_secret().to_owned();
    let encoded = Url::parse("https://placeholder.invalid/")
        .ok()
        .and_then(|mut url| url.set_username(&raw).ok().map(|()| url))
        .map_or_else(|| raw.clone(), |url| url.username().to_owned());
    [raw, encoded]
}

fn open_workspace(dir: &Utf8Path) -> Result<Dir, SourceError> {
    let io_error = |err: std::io::Error| SourceError::Io {
        path: dir.to_path_buf(),
        message: err.to_string(),
    };
    Dir::create_ambient_dir_all(dir, ambient_authority()).map_err(io_error)?;
    Dir::open_ambient_dir(dir, ambient_authority()).map_err(io_error)
}

#[cfg(test)]
mod tests;
