//! One-shot cycle: push what is already local, run the worker once, push
//! what it produced. Every push skips objects that already exist remotely.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::clock::Clock;
use crate::error::{OrchestrateError, Result};
use crate::exec::{render_command, ProcessExecutor};
use crate::runner::RunAttempt;
use crate::sync::{SyncGate, SyncSpec, SyncSummary};
use crate::worker::{RunConfiguration, WorkerCommand};

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub pre_push: SyncSummary,
    pub worker: RunAttempt,
    pub post_push: SyncSummary,
}

pub struct Cycle<'a> {
    executor: &'a dyn ProcessExecutor,
    clock: &'a dyn Clock,
    gate: SyncGate<'a>,
    worker: WorkerCommand,
}

impl<'a> Cycle<'a> {
    pub fn new(
        executor: &'a dyn ProcessExecutor,
        clock: &'a dyn Clock,
        gate: SyncGate<'a>,
        worker: WorkerCommand,
    ) -> Self {
        Self {
            executor,
            clock,
            gate,
            worker,
        }
    }

    /// Run the cycle for `wells`, writing worker output under `out_base`
    /// and pushing it to `remote`. A failing worker aborts before the
    /// post-push with its exit code.
    pub fn run(
        &self,
        config: &RunConfiguration,
        wells: &Path,
        out_base: &Path,
        remote: &str,
    ) -> Result<CycleReport> {
        let config = RunConfiguration {
            wells: wells.to_path_buf(),
            ..config.clone()
        };
        config.validate()?;
        self.gate.ensure_available()?;
        if !self.executor.is_available(&self.worker.program) {
            return Err(OrchestrateError::invalid(format!(
                "worker program not found: {}",
                self.worker.program
            )));
        }
        if let Some(script) = self.worker.script() {
            if !script.is_file() {
                return Err(OrchestrateError::invalid(format!(
                    "worker script not found: {}",
                    script.display()
                )));
            }
        }
        if !wells.is_file() {
            return Err(OrchestrateError::invalid(format!(
                "wells file not found: {}",
                wells.display()
            )));
        }

        std::fs::create_dir_all(out_base)?;
        let out_base = absolute(out_base)?;
        let push = SyncSpec::push(&out_base, remote);

        info!("[info] pre-push {} -> {}", out_base.display(), remote);
        let pre_push = self.gate.run_stage(&push, Some("pre"))?;

        let mut args = self.worker.argv(&config)?;
        args.push("--out-base".to_string());
        args.push(out_base.display().to_string());
        info!("[info] run: {}", render_command(&self.worker.program, &args));

        let mut attempt = RunAttempt::begin(args, self.clock.now());
        let code = self.executor.execute(&self.worker.program, &attempt.args)?;
        attempt.finish(code, self.clock.now());
        info!("[done] exit={}", code);
        if !code.success() {
            return Err(OrchestrateError::ExternalProcessFailure {
                program: self.worker.program.clone(),
                code: code.code(),
            });
        }

        info!("[info] post-push {} -> {}", out_base.display(), remote);
        let post_push = self.gate.run_stage(&push, Some("post"))?;

        info!("[done] complete.");
        Ok(CycleReport {
            pre_push,
            worker: attempt,
            post_push,
        })
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    })
}
