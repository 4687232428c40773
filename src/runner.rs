//! External process execution.
//!
//! The orchestrators never spawn processes directly; they describe the
//! command with a [`CommandSpec`] and hand it to a [`CommandRunner`]. The
//! default [`SystemRunner`] blocks the calling task until the process exits
//! and captures both output streams in full.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::{debug, info};

/// A command line to execute, with an optional working directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl CommandSpec {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append a path argument, lossily converted to UTF-8.
    #[must_use]
    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy())
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }
}

impl Display for CommandSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(' ') {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Captured output of a successful command.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// A command that could not be started or exited with a non-zero status.
///
/// Both streams are kept verbatim so they can be shown to the operator.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("Command `{command}` failed ({})", describe_exit(.exit_code))]
pub struct ExecutionError {
    pub command: String,
    /// `None` when the process could not be spawned or was killed by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

#[allow(clippy::ref_option)]
fn describe_exit(code: &Option<i32>) -> String {
    code.map_or_else(
        || "no exit code".to_string(),
        |code| format!("exit code {code}"),
    )
}

/// Executes external commands on behalf of the orchestrators.
///
/// Implementations must be shareable across the worker pool.
pub trait CommandRunner: Sync {
    /// Run `command` to completion.
    ///
    /// # Errors
    ///
    /// Returns an [`ExecutionError`] if the process cannot be spawned or
    /// exits with a non-zero status.
    fn run(&self, command: &CommandSpec) -> Result<CommandOutput, ExecutionError>;
}

/// Runs commands as real child processes.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &CommandSpec) -> Result<CommandOutput, ExecutionError> {
        info!(command = %command, "running command");

        let mut process = Command::new(&command.program);
        process.args(&command.args);
        if let Some(cwd) = &command.cwd {
            debug!(cwd = %cwd.display(), "working directory");
            process.current_dir(cwd);
        }

        // `output` drains stdout and stderr concurrently, so a chatty child
        // cannot block on a full pipe.
        let output = process.output().map_err(|e| ExecutionError {
            command: command.to_string(),
            exit_code: None,
            stdout: String::new(),
            stderr: format!("failed to start `{}`: {e}", command.program),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            debug!(command = %command, stderr = %stderr, "command failed");
            return Err(ExecutionError {
                command: command.to_string(),
                exit_code: output.status.code(),
                stdout,
                stderr,
            });
        }

        Ok(CommandOutput { stdout, stderr })
    }
}
