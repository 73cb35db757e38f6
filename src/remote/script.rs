//! Structured remote command batches.

use std::fmt;

/// Labelled, ordered list of shell commands sent as one SSH invocation.
///
/// Rendering prefixes the batch with `set -e`, so the first failing command
/// ends it. Batches that must always run to completion guard their own
/// commands (`|| true`, `if ...; then ...; fi`).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RemoteScript {
    label: String,
    commands: Vec<String>,
}

impl RemoteScript {
    /// Starts an empty batch named `label` for logs and errors.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            commands: Vec::new(),
        }
    }

    /// Appends one command line.
    #[must_use]
    pub fn command(mut self, line: impl Into<String>) -> Self {
        self.commands.push(line.into());
        self
    }

    /// Appends several command lines in order.
    #[must_use]
    pub fn commands_from<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands.extend(lines.into_iter().map(Into::into));
        self
    }

    /// Label used in logs and error messages.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The command lines, in execution order.
    #[must_use]
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Renders the batch as a single shell program.
    #[must_use]
    pub fn render(&self) -> String {
        let mut rendered = String::from("set -e");
        for line in &self.commands {
            rendered.push('\n');
            rendered.push_str(line);
        }
        rendered
    }
}

impl fmt::Display for RemoteScript {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.label)
    }
}
