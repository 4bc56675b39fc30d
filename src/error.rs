//! Error kinds shared by the argument builder, sync gate and runner.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestrateError {
    #[error("invalid configuration: {reason}")]
    InvalidConfiguration { reason: String },

    #[error("sync tool '{tool}' not found (is it installed and on PATH?)")]
    RemoteToolUnavailable { tool: String },

    #[error("local path {path} does not exist")]
    LocalPathMissing { path: String },

    #[error("{program} exited with code {code}")]
    ExternalProcessFailure { program: String, code: i32 },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl OrchestrateError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    /// Process exit code the CLI should leave with for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ExternalProcessFailure { code, .. } if *code != 0 => *code,
            Self::InvalidConfiguration { .. } => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestrateError>;
