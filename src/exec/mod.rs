//! External process capability.
//!
//! The worker and the sync tool are opaque subprocesses. Everything that
//! spawns one goes through [`ProcessExecutor`] so tests can substitute a
//! recording fake instead of launching real programs.

use std::process::{Command, Stdio};

use crate::error::{OrchestrateError, Result};

/// Exit code of a finished external process. A process terminated by a
/// signal has no code and is reported as `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);

    pub fn success(self) -> bool {
        self.0 == 0
    }

    pub fn code(self) -> i32 {
        self.0
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<std::process::ExitStatus> for ExitCode {
    fn from(status: std::process::ExitStatus) -> Self {
        ExitCode(status.code().unwrap_or(-1))
    }
}

/// Output of a captured invocation (stdout only; stderr is inherited).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captured {
    pub code: ExitCode,
    pub stdout: String,
}

/// Trait for anything able to run an external program synchronously.
#[cfg_attr(test, mockall::automock)]
pub trait ProcessExecutor {
    /// Run `program` with `args`, inheriting stdio, and block until it exits.
    fn execute(&self, program: &str, args: &[String]) -> Result<ExitCode>;

    /// Run `program` with `args` and collect its stdout.
    fn capture(&self, program: &str, args: &[String]) -> Result<Captured>;

    /// Check whether `program` can be launched at all.
    fn is_available(&self, program: &str) -> bool;
}

/// Executor backed by `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl ProcessExecutor for SystemExecutor {
    fn execute(&self, program: &str, args: &[String]) -> Result<ExitCode> {
        let status = Command::new(program)
            .args(args)
            .status()
            .map_err(|source| OrchestrateError::Spawn {
                program: program.to_string(),
                source,
            })?;
        Ok(status.into())
    }

    fn capture(&self, program: &str, args: &[String]) -> Result<Captured> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|source| OrchestrateError::Spawn {
                program: program.to_string(),
                source,
            })?;
        Ok(Captured {
            code: output.status.into(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }

    fn is_available(&self, program: &str) -> bool {
        // Spawning `--version` resolves the program through PATH.
        Command::new(program)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok()
    }
}

/// Render a command line for logs, quoting tokens that need it.
pub fn render_command(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .map(quote)
        .collect::<Vec<_>>()
        .join(" ")
}

fn quote(token: &str) -> String {
    let plain = !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=,@%+*".contains(c));
    if plain {
        token.to_string()
    } else {
        format!("'{}'", token.replace('\'', r"'\''"))
    }
}
