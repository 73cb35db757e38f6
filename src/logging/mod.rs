//! Console and run-log output.
//!
//! Every run writes a debug-level log file named after its start time in
//! addition to the filtered console output on stderr.

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding the console filter directive.
pub const LOG_ENV: &str = "BERTH_LOG";

const DEFAULT_CONSOLE_FILTER: &str = "info";

/// Errors raised while setting up logging.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum LoggingError {
    /// The log directory could not be created.
    #[error("failed to create log directory {path}: {message}")]
    CreateDir {
        /// Directory that could not be created.
        path: Utf8PathBuf,
        /// Operating system error string.
        message: String,
    },
    /// A global subscriber was already installed.
    #[error("failed to install log subscriber: {0}")]
    Install(String),
}

/// Active run log. Dropping it flushes pending file output.
#[derive(Debug)]
pub struct RunLog {
    path: Utf8PathBuf,
    _guard: WorkerGuard,
}

impl RunLog {
    /// Location of the log file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

/// Name of the run log for a run started at `started`.
#[must_use]
pub fn log_file_name(started: &DateTime<Local>) -> String {
    format!("deploy_{}.log", started.format("%Y%m%d_%H%M%S"))
}

/// Installs the console and file layers for this process.
///
/// The console honours `BERTH_LOG` (default `info`); the file always
/// receives `debug` and above without ANSI colours.
///
/// # Errors
///
/// Returns [`LoggingError::CreateDir`] when `dir` cannot be created and
/// [`LoggingError::Install`] when a subscriber is already installed.
pub fn init_run_log(dir: &Utf8Path) -> Result<RunLog, LoggingError> {
    Dir::create_ambient_dir_all(dir, ambient_authority()).map_err(|err| {
        LoggingError::CreateDir {
            path: dir.to_path_buf(),
            message: err.to_string(),
        }
    })?;

    let file_name = log_file_name(&Local::now());
    let path = dir.join(&file_name);
    let appender = tracing_appender::rolling::never(dir, &file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let console_filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_CONSOLE_FILTER));
    let console_layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(console_filter);
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer)
        .with_filter(LevelFilter::DEBUG);

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|err| LoggingError::Install(err.to_string()))?;

    info!(log_file = %path, "run log started");
    Ok(RunLog {
        path,
        _guard: guard,
    })
}
