//! TOML configuration.
//!
//! Every field has a default, so an empty file (or no file) is valid.
//! Lookup order: explicit path, `WELLRUN_CONFIG`, `./wellrun.toml`,
//! compiled-in defaults. Command-line flags are applied on top by the binary.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::worker::{RunConfiguration, WorkerCommand};

pub const CONFIG_ENV: &str = "WELLRUN_CONFIG";
pub const LOCAL_CONFIG: &str = "wellrun.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WellrunConfig {
    #[serde(default)]
    pub worker: WorkerCommand,
    #[serde(default)]
    pub run: RunConfiguration,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default, rename = "loop")]
    pub runner: LoopConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl WellrunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// An explicit path must load; the fallbacks only warn.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(&env_path);
            match Self::load(&path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "WELLRUN_CONFIG set but file could not be loaded, trying fallback"
                ),
            }
        }

        let local = Path::new(LOCAL_CONFIG);
        if local.exists() {
            match Self::load(local) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => warn!(
                    path = %local.display(),
                    error = %e,
                    "config file exists but could not be loaded, using defaults"
                ),
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Ok(Self::default())
    }
}

/// Sync tool and remote location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// rclone-compatible binary.
    pub tool: String,
    /// Configured rclone remote name.
    pub remote: String,
    pub bucket: Option<String>,
    pub prefix: String,
    /// Local directory the worker writes into.
    pub local_dir: PathBuf,
    /// Extra arguments appended to push invocations.
    pub push_tuning: Option<Vec<String>>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tool: "rclone".to_string(),
            remote: "s3aer".to_string(),
            bucket: None,
            prefix: "Data".to_string(),
            local_dir: PathBuf::from("Data"),
            push_tuning: None,
        }
    }
}

impl SyncConfig {
    /// `<remote>:<bucket>/<prefix>`, or `<remote>:<prefix>` without a bucket.
    pub fn remote_uri(&self) -> String {
        let prefix = self.prefix.trim_matches('/');
        match self.bucket.as_deref().map(|b| b.trim_matches('/')) {
            Some(bucket) if !bucket.is_empty() && !prefix.is_empty() => {
                format!("{}:{}/{}", self.remote, bucket, prefix)
            }
            Some(bucket) if !bucket.is_empty() => format!("{}:{}", self.remote, bucket),
            _ => format!("{}:{}", self.remote, prefix),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub minutes: Option<i64>,
    pub pause_secs: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            minutes: None,
            pause_secs: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
