//! Per-invocation records kept for logging and the end-of-run report.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::exec::ExitCode;

/// One worker invocation.
#[derive(Debug, Clone, Serialize)]
pub struct RunAttempt {
    pub id: uuid::Uuid,
    pub started_at: DateTime<Utc>,
    pub args: Vec<String>,
    /// `None` when the process could not be spawned at all.
    pub exit_code: Option<ExitCode>,
    pub error: Option<String>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunAttempt {
    pub fn begin(args: Vec<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            started_at: now,
            args,
            exit_code: None,
            error: None,
            finished_at: None,
        }
    }

    pub fn finish(&mut self, code: ExitCode, now: DateTime<Utc>) {
        self.exit_code = Some(code);
        self.finished_at = Some(now);
    }

    pub fn fail_to_spawn(&mut self, error: String, now: DateTime<Utc>) {
        self.error = Some(error);
        self.finished_at = Some(now);
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code.map(ExitCode::success).unwrap_or(false)
    }

    pub fn elapsed(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }
}
