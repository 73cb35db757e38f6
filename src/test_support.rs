//! Test support utilities shared across unit and integration tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::rc::Rc;

use camino::Utf8Path;
use secrecy::SecretString;

use crate::command::{CommandError, CommandOutput, CommandRunner};
use crate::config::DeploymentConfig;
use crate::naming::ProjectName;
use crate::settings::{DEFAULT_HOST_KEY_POLICY, ToolConfig};

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }
}

#[derive(Clone, Debug)]
struct Rule {
    pattern: String,
    output: CommandOutput,
}

#[derive(Debug, Default)]
struct State {
    queue: VecDeque<CommandOutput>,
    rules: Vec<Rule>,
    permissive: bool,
    invocations: Vec<CommandInvocation>,
}

/// Scripted command runner used to drive deterministic command outcomes
/// without spawning processes.
///
/// Responses are chosen in this order: the first persistent rule whose
/// pattern occurs in the command string, then the FIFO queue, then (when
/// permissive) an empty success. Anything else is reported as a spawn
/// failure.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    state: Rc<RefCell<State>>,
}

impl ScriptedRunner {
    /// Creates a strict runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a runner that answers unmatched commands with success.
    #[must_use]
    pub fn permissive() -> Self {
        let runner = Self::default();
        runner.state.borrow_mut().permissive = true;
        runner
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.state.borrow().invocations.clone()
    }

    /// Returns the command strings of invocations containing `pattern`.
    #[must_use]
    pub fn invoked(&self, pattern: &str) -> Vec<String> {
        self.state
            .borrow()
            .invocations
            .iter()
            .map(CommandInvocation::command_string)
            .filter(|command| command.contains(pattern))
            .collect()
    }

    /// Queues a successful exit status.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Queues a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), "", "simulated failure");
    }

    /// Queues an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.state.borrow_mut().queue.push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }

    /// Answers every command containing `pattern` with the given output.
    pub fn respond_to(
        &self,
        pattern: impl Into<String>,
        code: Option<i32>,
        stdout: impl Into<String>,
    ) {
        self.respond_with(
            pattern,
            CommandOutput {
                code,
                stdout: stdout.into(),
                stderr: String::new(),
            },
        );
    }

    /// Answers every command containing `pattern` with a failure.
    pub fn fail_on(&self, pattern: impl Into<String>, code: i32, stderr: impl Into<String>) {
        self.respond_with(
            pattern,
            CommandOutput {
                code: Some(code),
                stdout: String::new(),
                stderr: stderr.into(),
            },
        );
    }

    fn respond_with(&self, pattern: impl Into<String>, output: CommandOutput) {
        self.state.borrow_mut().rules.push(Rule {
            pattern: pattern.into(),
            output,
        });
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, CommandError> {
        let invocation = CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
        };
        let command = invocation.command_string();
        let mut state = self.state.borrow_mut();
        state.invocations.push(invocation);

        if let Some(rule) = state
            .rules
            .iter()
            .find(|rule| command.contains(&rule.pattern))
        {
            return Ok(rule.output.clone());
        }
        if let Some(output) = state.queue.pop_front() {
            return Ok(output);
        }
        if state.permissive {
            return Ok(CommandOutput {
                code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
            });
        }
        Err(CommandError::Spawn {
            program: program.to_owned(),
            message: String::from("no scripted response available"),
        })
    }
}

/// Tool settings equal to the built-in defaults, without touching the
/// environment or configuration files.
#[must_use]
pub fn default_tool_config() -> ToolConfig {
    ToolConfig {
        git_bin: String::from("git"),
        tar_bin: String::from("tar"),
        ssh_bin: String::from("ssh"),
        scp_bin: String::from("scp"),
        ping_bin: String::from("ping"),
        ssh_port: 22,
        ssh_probe_timeout_secs: 5,
        ssh_connect_timeout_secs: 30,
        ssh_host_key_policy: DEFAULT_HOST_KEY_POLICY.to_owned(),
        ssh_known_hosts_file: None,
        reclone_foreign_directories: true,
    }
}

/// Deployment inputs for `https://example.com/app.git` on branch `main`,
/// port 8080, with working copies under `workspace`.
///
/// The key path is not checked; runners are scripted.
///
/// # Panics
///
/// Never in practice: `app` is a valid project name.
#[must_use]
pub fn sample_deployment_config(workspace: &Utf8Path) -> DeploymentConfig {
    let Ok(project) = ProjectName::parse("app") else {
        panic!("static project name must be valid");
    };
    DeploymentConfig {
        repository_url: String::from("https://example.com/app.git"),
        access_token: SecretString::from(String::from("s3cr3t-token")),
        branch: String::from("main"),
        ssh_user: String::from("ubuntu"),
        ssh_host: String::from("203.0.113.10"),
        ssh_key_path: workspace.join("id_test"),
        app_port: 8080,
        workspace_dir: workspace.to_path_buf(),
        project,
    }
}
