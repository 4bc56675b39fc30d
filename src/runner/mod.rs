//! Time-boxed repeated invocation of the worker.
//!
//! States: `Idle -> Running -> (Sleeping <-> Running) -> Done`.
//!
//! The runner is a sequential driver: one worker at a time, each run to
//! completion. A failing worker is logged and the loop carries on; the
//! deadline check on entering `Sleeping` is the only way out.

pub mod history;

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::clock::Clock;
use crate::error::{OrchestrateError, Result};
use crate::exec::{render_command, ProcessExecutor};
use crate::worker::{RunConfiguration, WorkerCommand};

pub use history::RunAttempt;

/// Fixed pause between two invocations.
pub const DEFAULT_PAUSE: std::time::Duration = std::time::Duration::from_secs(2);
/// Attempts kept in memory; older ones survive only in the log.
pub const DEFAULT_HISTORY: usize = 32;

/// `[start, start + duration]`, fixed once the runner starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn starting_at(start: DateTime<Utc>, duration: chrono::Duration) -> Result<Self> {
        if duration <= chrono::Duration::zero() {
            return Err(OrchestrateError::invalid(format!(
                "run duration must be positive, got {}s",
                duration.num_seconds()
            )));
        }
        let end = start.checked_add_signed(duration).ok_or_else(|| {
            OrchestrateError::invalid("run duration overflows the clock")
        })?;
        Ok(Self { start, end })
    }

    pub fn is_over(&self, now: DateTime<Utc>) -> bool {
        now >= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunnerState {
    Idle,
    Running,
    Sleeping,
    Done,
}

/// Outcome of a finished loop.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub window: TimeWindow,
    pub runs: usize,
    pub failures: usize,
    /// The most recent attempts, oldest first.
    pub recent: Vec<RunAttempt>,
}

pub struct TimeBoxedRunner<'a> {
    executor: &'a dyn ProcessExecutor,
    clock: &'a dyn Clock,
    worker: WorkerCommand,
    config: RunConfiguration,
    duration: chrono::Duration,
    pause: std::time::Duration,
    state: RunnerState,
    window: Option<TimeWindow>,
    recent: VecDeque<RunAttempt>,
    history: usize,
    runs: usize,
    failures: usize,
    consecutive_failures: u32,
}

impl<'a> TimeBoxedRunner<'a> {
    /// Rejects a non-positive duration or an invalid run configuration
    /// before anything is spawned.
    pub fn new(
        executor: &'a dyn ProcessExecutor,
        clock: &'a dyn Clock,
        worker: WorkerCommand,
        config: RunConfiguration,
        duration: chrono::Duration,
    ) -> Result<Self> {
        if duration <= chrono::Duration::zero() {
            return Err(OrchestrateError::invalid(format!(
                "run duration must be positive, got {}s",
                duration.num_seconds()
            )));
        }
        config.validate()?;
        Ok(Self {
            executor,
            clock,
            worker,
            config,
            duration,
            pause: DEFAULT_PAUSE,
            state: RunnerState::Idle,
            window: None,
            recent: VecDeque::new(),
            history: DEFAULT_HISTORY,
            runs: 0,
            failures: 0,
            consecutive_failures: 0,
        })
    }

    pub fn with_pause(mut self, pause: std::time::Duration) -> Self {
        self.pause = pause;
        self
    }

    /// How many attempts to keep for the report. At least one is kept.
    pub fn with_history(mut self, history: usize) -> Self {
        self.history = history.max(1);
        self
    }

    pub fn state(&self) -> RunnerState {
        self.state
    }

    pub fn window(&self) -> Option<TimeWindow> {
        self.window
    }

    pub fn runs(&self) -> usize {
        self.runs
    }

    pub fn recent(&self) -> impl Iterator<Item = &RunAttempt> {
        self.recent.iter()
    }

    /// `Idle -> Running`: fix the time window.
    pub fn start(&mut self) -> Result<TimeWindow> {
        if self.state != RunnerState::Idle {
            return Err(OrchestrateError::invalid("runner already started"));
        }
        let window = TimeWindow::starting_at(self.clock.now(), self.duration)?;
        info!(
            start = %window.start.to_rfc3339(),
            end = %window.end.to_rfc3339(),
            "[info] loop window"
        );
        self.window = Some(window);
        self.state = RunnerState::Running;
        Ok(window)
    }

    /// Perform one transition. Returns the state entered.
    pub fn step(&mut self) -> Result<RunnerState> {
        let current = self.state;
        self.state = match current {
            RunnerState::Running => {
                self.invoke_once()?;
                RunnerState::Sleeping
            }
            RunnerState::Sleeping => {
                let now = self.clock.now();
                let over = self.window.map(|w| w.is_over(now)).unwrap_or(true);
                if over {
                    info!(
                        runs = self.runs,
                        failures = self.failures,
                        "[done] time window elapsed"
                    );
                    RunnerState::Done
                } else {
                    self.clock.sleep(self.pause);
                    RunnerState::Running
                }
            }
            state @ (RunnerState::Idle | RunnerState::Done) => state,
        };
        Ok(self.state)
    }

    /// Start and drive the loop until the window closes.
    pub fn run(mut self) -> Result<RunReport> {
        let window = self.start()?;
        while self.step()? != RunnerState::Done {}
        Ok(RunReport {
            window,
            runs: self.runs,
            failures: self.failures,
            recent: self.recent.into(),
        })
    }

    fn invoke_once(&mut self) -> Result<()> {
        let args = self.worker.argv(&self.config)?;
        let program = self.worker.program.as_str();
        info!("[info] run: {}", render_command(program, &args));

        let mut attempt = RunAttempt::begin(args, self.clock.now());
        match self.executor.execute(program, &attempt.args) {
            Ok(code) => {
                attempt.finish(code, self.clock.now());
                info!("[done] exit={}", code);
            }
            Err(e) => {
                error!(error = %e, "worker could not be started");
                attempt.fail_to_spawn(e.to_string(), self.clock.now());
            }
        }

        self.runs += 1;
        if attempt.succeeded() {
            self.consecutive_failures = 0;
        } else {
            self.failures += 1;
            self.consecutive_failures += 1;
            warn!(
                consecutive_failures = self.consecutive_failures,
                "worker run failed, continuing until the window closes"
            );
        }
        if self.recent.len() == self.history {
            self.recent.pop_front();
        }
        self.recent.push_back(attempt);
        Ok(())
    }
}
