//! Binary entry point for the berth CLI.

use std::io::{self, Write};
use std::process;

use camino::Utf8Path;
use clap::Parser;
use thiserror::Error;
use tracing::{error, info, warn};

use berth::{
    DeploymentOrchestrator, LoggingError, RawInputs, SettingsError, StageFailure, ToolConfig,
    init_run_log,
};

mod cli;

use cli::Cli;

#[derive(Debug, Error)]
enum CliError {
    #[error("logging setup failed: {0}")]
    Logging(#[from] LoggingError),
    #[error("configuration error: {0}")]
    Settings(#[from] SettingsError),
    #[error("deployment failed: {0}")]
    Stage(#[from] StageFailure),
}

fn main() {
    let cli = Cli::parse();
    let exit_code = execute(&cli);
    process::exit(exit_code);
}

/// Runs the requested action. The run log is flushed when this returns.
fn execute(cli: &Cli) -> i32 {
    let run_log = match init_run_log(Utf8Path::new(&cli.log_dir)) {
        Ok(run_log) => run_log,
        Err(err) => {
            report_error(&CliError::from(err), None);
            return 1;
        }
    };

    match dispatch(cli) {
        Ok(summary) => {
            writeln!(io::stdout(), "{summary}").ok();
            0
        }
        Err(err) => {
            error!(error = %err, "run failed");
            report_error(&err, Some(run_log.path()));
            1
        }
    }
}

fn dispatch(cli: &Cli) -> Result<String, CliError> {
    let tools = ToolConfig::load_without_cli_args()?;
    let orchestrator = DeploymentOrchestrator::with_process_runner(tools);
    let raw = raw_inputs(cli);

    if cli.cleanup {
        let outcome = orchestrator.cleanup(&raw)?;
        info!(project = %outcome.project, "cleanup complete");
        return Ok(format!("cleaned up {}", outcome.project));
    }

    let outcome = orchestrator.deploy(&raw)?;
    if !outcome.health.all_passed() {
        warn!(
            health = %outcome.health,
            "deployment finished but some health checks failed"
        );
    }
    info!(project = %outcome.project, health = %outcome.health, "deployment complete");
    Ok(format!(
        "deployed {} (health {})",
        outcome.project, outcome.health
    ))
}

fn raw_inputs(cli: &Cli) -> RawInputs {
    RawInputs {
        repository_url: cli.repository_url.clone(),
        access_token: cli.access_token.clone(),
        branch: cli.branch.clone(),
        ssh_user: cli.ssh_user.clone(),
        ssh_host: cli.ssh_host.clone(),
        ssh_key_path: cli.ssh_key_path.clone(),
        app_port: cli.app_port.clone(),
        workspace_dir: cli.workspace_dir.clone(),
    }
}

fn report_error(err: &CliError, log_path: Option<&Utf8Path>) {
    write_error(io::stderr(), err, log_path);
}

fn write_error(mut target: impl Write, err: &CliError, log_path: Option<&Utf8Path>) {
    writeln!(target, "error: {err}").ok();
    if let Some(path) = log_path {
        writeln!(target, "see the run log for details: {path}").ok();
    }
}
