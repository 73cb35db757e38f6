//! Derivation of local and remote names from the repository URL.
//!
//! Every directory, archive, container and image name used by a run is
//! built here from a validated [`ProjectName`], so nothing downstream ever
//! interpolates an unchecked string into a path or a remote command.

use std::fmt;

use thiserror::Error;

/// Suffix every repository URL carries after validation.
pub const CANONICAL_SUFFIX: &str = ".git";

/// Extension of the transport archive.
pub const ARCHIVE_EXTENSION: &str = ".tar.gz";

/// Errors raised when a derived name is unusable.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum NamingError {
    /// The candidate name violates the allowed pattern.
    #[error("invalid project name {name:?}: {reason}")]
    Invalid {
        /// Offending candidate.
        name: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Directory name of the working copy, derived from the repository URL.
///
/// Restricted to ASCII alphanumerics plus `.`, `_` and `-`, starting with an
/// alphanumeric, which rules out separators and `.`/`..` traversal.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ProjectName(String);

impl ProjectName {
    /// Validates `candidate` as a project name.
    ///
    /// # Errors
    ///
    /// Returns [`NamingError::Invalid`] when the name is empty, starts with a
    /// non-alphanumeric character, or contains anything outside
    /// `[A-Za-z0-9._-]`.
    pub fn parse(candidate: &str) -> Result<Self, NamingError> {
        let invalid = |reason: &str| NamingError::Invalid {
            name: candidate.to_owned(),
            reason: reason.to_owned(),
        };

        let Some(first) = candidate.chars().next() else {
            return Err(invalid("name is empty"));
        };
        if !first.is_ascii_alphanumeric() {
            return Err(invalid("name must start with a letter or digit"));
        }
        if let Some(bad) = candidate
            .chars()
            .find(|ch| !(ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-')))
        {
            return Err(invalid(&format!("character {bad:?} is not allowed")));
        }
        Ok(Self(candidate.to_owned()))
    }

    /// Derives the project name from the final path segment of a repository
    /// URL, dropping the canonical suffix.
    ///
    /// Both URL (`https://host/org/app.git`) and scp-like
    /// (`git@host:org/app.git`) forms are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`NamingError::Invalid`] when the segment is not a valid
    /// project name.
    pub fn from_repository_url(url: &str) -> Result<Self, NamingError> {
        let trimmed = url.trim().trim_end_matches('/');
        let segment = trimmed
            .rsplit(['/', ':'])
            .next()
            .unwrap_or(trimmed);
        let stem = segment.strip_suffix(CANONICAL_SUFFIX).unwrap_or(segment);
        Self::parse(stem)
    }

    /// The validated name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the transport archive, e.g. `app.tar.gz`.
    #[must_use]
    pub fn archive_file_name(&self) -> String {
        format!("{}{ARCHIVE_EXTENSION}", self.0)
    }

    /// Name of the single application container.
    ///
    /// Docker rejects upper-case image references, so the container and the
    /// image share the lower-cased project name.
    #[must_use]
    pub fn container_name(&self) -> String {
        self.0.to_ascii_lowercase()
    }

    /// Image reference built for the single-container path.
    #[must_use]
    pub fn image_reference(&self) -> String {
        format!("{}:latest", self.container_name())
    }
}

impl fmt::Display for ProjectName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}
