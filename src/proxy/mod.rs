//! Reverse proxy site generation and activation.

use thiserror::Error;
use tracing::info;

use crate::command::CommandRunner;
use crate::remote::{RemoteError, RemoteExecutor, RemoteScript};

/// Location of the generated site.
pub const SITE_PATH: &str = "/etc/nginx/sites-available/berth";

/// Directory nginx loads enabled sites from.
pub const SITES_ENABLED_DIR: &str = "/etc/nginx/sites-enabled";

const SITE_NAME: &str = "berth";
const HEREDOC_MARKER: &str = "BERTH_SITE";

/// Proxy mapping from the public HTTP port to the application.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProxyRule {
    /// Public port nginx listens on.
    pub listen_port: u16,
    /// Local port the application listens on.
    pub upstream_port: u16,
    /// `server_name` directive value.
    pub server_name: String,
}

impl ProxyRule {
    /// Catch-all rule on port 80 forwarding to `app_port`.
    #[must_use]
    pub fn for_app_port(app_port: u16) -> Self {
        Self {
            listen_port: 80,
            upstream_port: app_port,
            server_name: String::from("_"),
        }
    }

    /// Renders the nginx server block.
    #[must_use]
    pub fn render(&self) -> String {
        let Self {
            listen_port,
            upstream_port,
            server_name,
        } = self;
        format!(
            "server {{
    listen {listen_port} default_server;
    listen [::]:{listen_port} default_server;
    server_name {server_name};

    location / {{
        proxy_pass http://127.0.0.1:{upstream_port};
        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header X-Forwarded-Proto $scheme;
    }}
}}
"
        )
    }
}

/// Errors raised while configuring the proxy.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ProxyError {
    /// `nginx -t` rejected the configuration. nginx was not reloaded.
    #[error("nginx rejected the configuration: {output}")]
    ConfigInvalid {
        /// Combined nginx diagnostics.
        output: String,
    },
    /// Installing or reloading the site failed.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Installs, validates and activates the proxy site.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReverseProxyConfigurer;

impl ReverseProxyConfigurer {
    /// Batch writing the site, disabling every other site and enabling ours.
    #[must_use]
    pub fn install_script(rule: &ProxyRule) -> RemoteScript {
        RemoteScript::new("install proxy site")
            .command(format!(
                "sudo -n tee {SITE_PATH} >/dev/null <<'{HEREDOC_MARKER}'\n{}{HEREDOC_MARKER}",
                rule.render()
            ))
            .command(format!(
                "sudo -n find {SITES_ENABLED_DIR} -mindepth 1 -maxdepth 1 ! -name {SITE_NAME} -exec rm -f {{}} +"
            ))
            .command(format!(
                "sudo -n ln -sfn {SITE_PATH} {SITES_ENABLED_DIR}/{SITE_NAME}"
            ))
    }

    /// Unchecked batch running the nginx configuration test.
    #[must_use]
    pub fn validate_script() -> RemoteScript {
        RemoteScript::new("validate proxy configuration").command("sudo -n nginx -t 2>&1")
    }

    /// Batch reloading nginx.
    #[must_use]
    pub fn reload_script() -> RemoteScript {
        RemoteScript::new("reload proxy").command("sudo -n systemctl reload nginx")
    }

    /// Installs `rule`, validates it and reloads nginx.
    ///
    /// # Errors
    ///
    /// Returns [`ProxyError::ConfigInvalid`] when `nginx -t` fails, in which
    /// case no reload is attempted, or [`ProxyError::Remote`] when a batch
    /// fails.
    pub fn configure<R: CommandRunner>(
        self,
        remote: &RemoteExecutor<R>,
        rule: &ProxyRule,
    ) -> Result<(), ProxyError> {
        remote.run(&Self::install_script(rule))?;

        let check = remote.run_unchecked(&Self::validate_script())?;
        if !check.is_success() {
            let combined = format!("{}\n{}", check.stdout.trim(), check.stderr.trim());
            return Err(ProxyError::ConfigInvalid {
                output: combined.trim().to_owned(),
            });
        }

        remote.run(&Self::reload_script())?;
        info!(
            listen = rule.listen_port,
            upstream = rule.upstream_port,
            "reverse proxy configured"
        );
        Ok(())
    }
}
