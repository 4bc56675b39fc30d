//! Worker invocation: typed run configuration and argument assembly.
//!
//! The worker (the scraper) is an opaque program. This module owns the
//! argument contract it is called with:
//!
//! `--workers N --wells P --dashboards S --sheets S --timeout N --delay D [flags...]`
//!
//! Flags are emitted in the fixed order of [`Flag::ALL`], never by iterating
//! an unordered collection, so identical input always yields identical argv.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{OrchestrateError, Result};

/// Boolean switches passed through to the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Headless,
    Force,
    PushToRemote,
    PurgeLocal,
    PurgeWell,
    CheckRemote,
}

impl Flag {
    /// Emission order. Changing it changes every logged command line.
    pub const ALL: [Flag; 6] = [
        Flag::Headless,
        Flag::Force,
        Flag::PushToRemote,
        Flag::PurgeLocal,
        Flag::PurgeWell,
        Flag::CheckRemote,
    ];

    pub fn token(self) -> &'static str {
        match self {
            Flag::Headless => "--headless",
            Flag::Force => "--force",
            Flag::PushToRemote => "--push-to-s3",
            Flag::PurgeLocal => "--purge-local",
            Flag::PurgeWell => "--purge-well",
            Flag::CheckRemote => "--check-remote",
        }
    }
}

impl std::fmt::Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token().trim_start_matches('-'))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub headless: bool,
    pub force: bool,
    pub push_to_remote: bool,
    pub purge_local: bool,
    pub purge_well: bool,
    pub check_remote: bool,
}

impl FeatureFlags {
    pub fn is_enabled(&self, flag: Flag) -> bool {
        match flag {
            Flag::Headless => self.headless,
            Flag::Force => self.force,
            Flag::PushToRemote => self.push_to_remote,
            Flag::PurgeLocal => self.purge_local,
            Flag::PurgeWell => self.purge_well,
            Flag::CheckRemote => self.check_remote,
        }
    }

    pub fn enabled(&self) -> impl Iterator<Item = Flag> + '_ {
        Flag::ALL.into_iter().filter(|f| self.is_enabled(*f))
    }
}

/// Everything the worker needs for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfiguration {
    /// Parallel browser workers inside the scraper (>= 1).
    pub workers: i64,
    /// Path to the wells list (one identifier per line).
    pub wells: PathBuf,
    /// Comma-separated dashboard names or `all`.
    pub dashboards: String,
    /// Comma-separated sheet names or `all`.
    pub sheets: String,
    /// Per-operation wait timeout in seconds (> 0).
    pub timeout_secs: i64,
    /// Delay between UI actions in seconds (>= 0).
    pub delay_secs: f64,
    #[serde(flatten)]
    pub flags: FeatureFlags,
}

impl Default for RunConfiguration {
    fn default() -> Self {
        Self {
            workers: 2,
            wells: PathBuf::from("wells.txt"),
            dashboards: "all".to_string(),
            sheets: "all".to_string(),
            timeout_secs: 40,
            delay_secs: 0.2,
            flags: FeatureFlags::default(),
        }
    }
}

impl RunConfiguration {
    pub fn validate(&self) -> Result<()> {
        if self.workers < 1 {
            return Err(OrchestrateError::invalid(format!(
                "worker count must be >= 1, got {}",
                self.workers
            )));
        }
        if self.timeout_secs <= 0 {
            return Err(OrchestrateError::invalid(format!(
                "timeout must be > 0 seconds, got {}",
                self.timeout_secs
            )));
        }
        if !self.delay_secs.is_finite() || self.delay_secs < 0.0 {
            return Err(OrchestrateError::invalid(format!(
                "delay must be a non-negative number of seconds, got {}",
                self.delay_secs
            )));
        }
        Ok(())
    }
}

/// Map a configuration to the worker's argument list. Pure.
pub fn build_args(config: &RunConfiguration) -> Result<Vec<String>> {
    config.validate()?;

    let mut args = vec![
        "--workers".to_string(),
        config.workers.to_string(),
        "--wells".to_string(),
        config.wells.display().to_string(),
        "--dashboards".to_string(),
        config.dashboards.clone(),
        "--sheets".to_string(),
        config.sheets.clone(),
        "--timeout".to_string(),
        config.timeout_secs.to_string(),
        "--delay".to_string(),
        config.delay_secs.to_string(),
    ];
    args.extend(config.flags.enabled().map(|f| f.token().to_string()));
    Ok(args)
}

/// How the worker program is launched: the program itself plus any fixed
/// leading tokens (an interpreter's script path, for instance).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerCommand {
    pub program: String,
    pub prefix_args: Vec<String>,
}

impl Default for WorkerCommand {
    fn default() -> Self {
        Self {
            program: "python3".to_string(),
            prefix_args: vec!["aer_multi_dash_mp.py".to_string()],
        }
    }
}

impl WorkerCommand {
    /// Full argv after the program: prefix tokens, then the contract args.
    pub fn argv(&self, config: &RunConfiguration) -> Result<Vec<String>> {
        let mut argv = self.prefix_args.clone();
        argv.extend(build_args(config)?);
        Ok(argv)
    }

    /// The script the program runs, when the first prefix token names a
    /// file (`scraping.py`, `./bin/worker`) rather than an option.
    pub fn script(&self) -> Option<&Path> {
        let first = self.prefix_args.first()?;
        let path = Path::new(first);
        let looks_like_file = !first.starts_with('-')
            && (first.contains('/') || path.extension().is_some());
        looks_like_file.then_some(path)
    }
}
