//! Post-deployment health checks.
//!
//! The checks never fail a run: their outcome is reported as `passed/total`
//! and individual failures are logged as warnings.

use std::fmt;

use tracing::{info, warn};

use crate::command::CommandRunner;
use crate::remote::{RemoteExecutor, RemoteScript};

/// One post-deployment check.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum HealthCheck {
    /// The docker service is active.
    ContainerEngine,
    /// The nginx service is active.
    ProxyEngine,
    /// The proxy answers HTTP on the loopback interface.
    HttpEndpoint,
}

impl HealthCheck {
    /// Every check, in reporting order.
    pub const ALL: [Self; 3] = [Self::ContainerEngine, Self::ProxyEngine, Self::HttpEndpoint];

    /// Key printed by the remote batch.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::ContainerEngine => "docker",
            Self::ProxyEngine => "nginx",
            Self::HttpEndpoint => "http",
        }
    }

    const fn probe(self) -> &'static str {
        match self {
            Self::ContainerEngine => "systemctl is-active --quiet docker",
            Self::ProxyEngine => "systemctl is-active --quiet nginx",
            Self::HttpEndpoint => "curl -sS -I --max-time 10 http://localhost/ >/dev/null 2>&1",
        }
    }

    const fn pass_detail(self) -> &'static str {
        match self {
            Self::ContainerEngine | Self::ProxyEngine => "service active",
            Self::HttpEndpoint => "proxy responded",
        }
    }

    const fn fail_detail(self) -> &'static str {
        match self {
            Self::ContainerEngine | Self::ProxyEngine => "service not active",
            Self::HttpEndpoint => "no HTTP response on port 80",
        }
    }
}

impl fmt::Display for HealthCheck {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.key())
    }
}

/// Outcome of one check.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CheckResult {
    /// Which check ran.
    pub check: HealthCheck,
    /// Whether it passed.
    pub passed: bool,
    /// Short explanation.
    pub detail: String,
}

/// Outcome of every check.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HealthReport {
    /// One result per check, in [`HealthCheck::ALL`] order.
    pub results: Vec<CheckResult>,
}

impl HealthReport {
    /// Number of passing checks.
    #[must_use]
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|result| result.passed).count()
    }

    /// Number of checks run.
    #[must_use]
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Returns `true` when every check passed.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.passed() == self.total()
    }

    /// Builds a report from the batch output. Checks without a line are
    /// failed.
    #[must_use]
    pub fn parse(stdout: &str) -> Self {
        let results = HealthCheck::ALL
            .into_iter()
            .map(|check| {
                let verdict = stdout.lines().find_map(|line| {
                    let (key, value) = line.trim().split_once('=')?;
                    (key == check.key()).then(|| value.trim().to_owned())
                });
                match verdict.as_deref() {
                    Some("pass") => CheckResult {
                        check,
                        passed: true,
                        detail: check.pass_detail().to_owned(),
                    },
                    Some(_) => CheckResult {
                        check,
                        passed: false,
                        detail: check.fail_detail().to_owned(),
                    },
                    None => CheckResult {
                        check,
                        passed: false,
                        detail: String::from("no result reported"),
                    },
                }
            })
            .collect();
        Self { results }
    }

    fn unavailable(reason: &str) -> Self {
        let results = HealthCheck::ALL
            .into_iter()
            .map(|check| CheckResult {
                check,
                passed: false,
                detail: format!("health batch could not run: {reason}"),
            })
            .collect();
        Self { results }
    }
}

impl fmt::Display for HealthReport {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}/{}", self.passed(), self.total())
    }
}

/// Runs the post-deployment checks.
#[derive(Clone, Copy, Debug, Default)]
pub struct HealthValidator;

impl HealthValidator {
    /// Unchecked batch printing `key=pass|fail` for every check.
    #[must_use]
    pub fn script() -> RemoteScript {
        let lines = HealthCheck::ALL.into_iter().map(|check| {
            let key = check.key();
            format!(
                "if {}; then echo {key}=pass; else echo {key}=fail; fi",
                check.probe()
            )
        });
        RemoteScript::new("health checks").commands_from(lines)
    }

    /// Runs every check. Never fails; transport problems fail all checks.
    #[must_use]
    pub fn validate<R: CommandRunner>(self, remote: &RemoteExecutor<R>) -> HealthReport {
        let report = match remote.run_unchecked(&Self::script()) {
            Ok(output) => HealthReport::parse(&output.stdout),
            Err(err) => HealthReport::unavailable(&err.to_string()),
        };

        for result in report.results.iter().filter(|result| !result.passed) {
            warn!(check = %result.check, detail = %result.detail, "health check failed");
        }
        info!(passed = report.passed(), total = report.total(), "health checks finished");
        report
    }
}
