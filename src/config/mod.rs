//! Orchestrator configuration.
//!
//! Stored as TOML, by default at `/etc/stacksnap/config.toml`. Every section
//! has defaults except the backup root and, for backup runs, the snapshot
//! repository.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::{
    lifecycle::{LifecycleTiming, RetryPolicy},
    logging::{LogFormat, LogSink, LoggingConfig},
    snapshot::RetentionPolicy,
    units::DEFAULT_MANIFESTS,
    Error, Result,
};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/stacksnap/config.toml";
/// State directory created under the backup root when no explicit paths are set.
pub const STATE_DIR: &str = ".stacksnap";
pub const DEFAULT_SELECTION_FILE: &str = "selection.conf";
pub const DEFAULT_LOCK_FILE: &str = "run.pid";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub runtime: RuntimeConfig,
    pub snapshot: SnapshotConfig,
    pub retention: RetentionConfig,
    pub logging: LogConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory whose subdirectories are the backup units.
    pub root: Option<PathBuf>,
    /// Defaults to `<root>/.stacksnap/selection.conf`.
    pub selection_file: Option<PathBuf>,
    /// Defaults to `<root>/.stacksnap/run.pid`.
    pub lock_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Container runtime executable (`docker compose` plugin syntax).
    pub program: String,
    /// Manifest names marking a unit directory, checked in order.
    pub manifests: Vec<String>,
    pub stop_timeout_secs: u64,
    pub start_timeout_secs: u64,
    pub verify_attempts: u32,
    pub verify_delay_secs: u64,
    /// Wait before the first stop verification when the stop request itself failed.
    pub forced_stop_wait_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            program: "docker".into(),
            manifests: DEFAULT_MANIFESTS.iter().map(|m| m.to_string()).collect(),
            stop_timeout_secs: 60,
            start_timeout_secs: 120,
            verify_attempts: 3,
            verify_delay_secs: 2,
            forced_stop_wait_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub program: String,
    pub repository: Option<String>,
    pub password_file: Option<PathBuf>,
    pub timeout_secs: u64,
    pub extra_tags: Vec<String>,
    pub exclude: Vec<String>,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            program: "restic".into(),
            repository: None,
            password_file: None,
            timeout_secs: 3600,
            extra_tags: Vec::new(),
            exclude: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub enabled: bool,
    pub keep_last: Option<u32>,
    pub keep_daily: Option<u32>,
    pub keep_weekly: Option<u32>,
    pub keep_monthly: Option<u32>,
    pub keep_yearly: Option<u32>,
    /// Remove unreferenced data after forgetting snapshots.
    pub prune: bool,
    pub timeout_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            keep_last: None,
            keep_daily: None,
            keep_weekly: None,
            keep_monthly: None,
            keep_yearly: None,
            prune: true,
            timeout_secs: 1800,
        }
    }
}

impl RetentionConfig {
    pub fn to_policy(&self) -> RetentionPolicy {
        RetentionPolicy {
            keep_last: self.keep_last,
            keep_daily: self.keep_daily,
            keep_weekly: self.keep_weekly,
            keep_monthly: self.keep_monthly,
            keep_yearly: self.keep_yearly,
            prune: self.prune,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
    pub file: Option<PathBuf>,
}

impl LogConfig {
    pub fn to_logging_config(&self, debug: bool) -> LoggingConfig {
        LoggingConfig {
            format: self.format,
            sink: self
                .file
                .clone()
                .map(LogSink::File)
                .unwrap_or(LogSink::Console),
            debug,
        }
    }
}

impl Config {
    /// Read and validate the configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|err| {
            Error::Config(format!("cannot read {}: {err}", path.display()))
        })?;
        let config = Self::from_toml_str(&raw)?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Config = toml::from_str(raw).map_err(|err| Error::Config(err.to_string()))?;
        Ok(config)
    }

    /// Apply command-line overrides on top of the file contents.
    pub fn with_root_override(mut self, root: Option<PathBuf>) -> Self {
        if root.is_some() {
            self.paths.root = root;
        }
        self
    }

    /// Check required settings. Runs before any side effect.
    pub fn validate(&self) -> Result<()> {
        if self.paths.root.is_none() {
            return Err(Error::Config("paths.root is required".into()).into());
        }
        if self.runtime.manifests.is_empty() {
            return Err(Error::Config("runtime.manifests must not be empty".into()).into());
        }
        if self.runtime.verify_attempts == 0 {
            return Err(Error::Config("runtime.verify_attempts must be at least 1".into()).into());
        }
        Ok(())
    }

    /// Snapshot repository. Only the backup run needs one.
    pub fn repository(&self) -> Result<&str> {
        match self.snapshot.repository.as_deref().map(str::trim) {
            Some(repo) if !repo.is_empty() => Ok(repo),
            _ => Err(Error::Config("snapshot.repository is required".into()).into()),
        }
    }

    /// Backup root, verified to be an existing directory.
    pub fn root(&self) -> Result<PathBuf> {
        let root = self
            .paths
            .root
            .clone()
            .ok_or_else(|| Error::Config("paths.root is required".into()))?;
        if !root.is_dir() {
            return Err(Error::InvalidRoot(root.display().to_string()).into());
        }
        if let Err(err) = fs::read_dir(&root) {
            return Err(Error::InvalidRoot(format!("{}: {err}", root.display())).into());
        }
        Ok(root)
    }

    pub fn selection_path(&self, root: &Path) -> PathBuf {
        self.paths
            .selection_file
            .clone()
            .unwrap_or_else(|| root.join(STATE_DIR).join(DEFAULT_SELECTION_FILE))
    }

    pub fn lock_path(&self, root: &Path) -> PathBuf {
        self.paths
            .lock_file
            .clone()
            .unwrap_or_else(|| root.join(STATE_DIR).join(DEFAULT_LOCK_FILE))
    }

    pub fn lifecycle_timing(&self) -> LifecycleTiming {
        let verify = RetryPolicy::new(
            self.runtime.verify_attempts,
            Duration::from_secs(self.runtime.verify_delay_secs),
        );
        LifecycleTiming {
            stop_timeout: Duration::from_secs(self.runtime.stop_timeout_secs),
            start_timeout: Duration::from_secs(self.runtime.start_timeout_secs),
            post_stop_wait: Duration::from_secs(self.runtime.verify_delay_secs),
            forced_stop_wait: Duration::from_secs(self.runtime.forced_stop_wait_secs),
            stop_verify: verify,
            start_verify: verify,
        }
    }
}
