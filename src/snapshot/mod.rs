//! Snapshot engine seam and the per-unit adapter around it.
//!
//! Every snapshot is tagged with the unit name and the date, so retention can
//! be scoped to one unit's history.

use std::{path::Path, time::Duration};

use chrono::{Local, NaiveDate};
use serde::Serialize;
use tracing::{info, warn};

use crate::{exec::ActionStatus, units::BackupUnit, Error, Result};

pub mod restic;

pub use restic::ResticTool;

pub const DATE_TAG_FORMAT: &str = "%Y-%m-%d";

/// Keep-thresholds passed to the tool's forget/prune operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RetentionPolicy {
    pub keep_last: Option<u32>,
    pub keep_daily: Option<u32>,
    pub keep_weekly: Option<u32>,
    pub keep_monthly: Option<u32>,
    pub keep_yearly: Option<u32>,
    pub prune: bool,
}

impl RetentionPolicy {
    pub fn has_threshold(&self) -> bool {
        [
            self.keep_last,
            self.keep_daily,
            self.keep_weekly,
            self.keep_monthly,
            self.keep_yearly,
        ]
        .iter()
        .any(Option::is_some)
    }
}

pub trait SnapshotTool {
    /// Create one snapshot of `path` carrying `tags`.
    fn create(&self, path: &Path, tags: &[String], timeout: Duration) -> Result<ActionStatus>;

    /// Forget (and optionally prune) snapshots carrying `tag` per `policy`.
    fn prune(&self, tag: &str, policy: &RetentionPolicy, timeout: Duration)
        -> Result<ActionStatus>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionOutcome {
    Applied,
    /// Retention enabled but no keep-threshold configured.
    NoThreshold,
}

#[derive(Debug, Clone)]
pub struct RetentionSettings {
    pub policy: RetentionPolicy,
    pub timeout: Duration,
}

pub struct SnapshotAdapter {
    tool: Box<dyn SnapshotTool>,
    timeout: Duration,
    extra_tags: Vec<String>,
    retention: Option<RetentionSettings>,
}

impl SnapshotAdapter {
    pub fn new(tool: Box<dyn SnapshotTool>, timeout: Duration) -> Self {
        Self {
            tool,
            timeout,
            extra_tags: Vec::new(),
            retention: None,
        }
    }

    pub fn with_extra_tags(mut self, tags: Vec<String>) -> Self {
        self.extra_tags = tags;
        self
    }

    /// Enable retention after each successful snapshot.
    pub fn with_retention(mut self, settings: RetentionSettings) -> Self {
        self.retention = Some(settings);
        self
    }

    pub fn retention_enabled(&self) -> bool {
        self.retention.is_some()
    }

    /// Tags for a snapshot of `unit` taken on `date`; the unit name comes first.
    pub fn snapshot_tags(&self, unit: &BackupUnit, date: NaiveDate) -> Vec<String> {
        let mut tags = vec![unit.name.clone(), date.format(DATE_TAG_FORMAT).to_string()];
        tags.extend(self.extra_tags.iter().cloned());
        tags
    }

    pub fn snapshot(&self, unit: &BackupUnit) -> Result<()> {
        self.snapshot_on(unit, Local::now().date_naive())
    }

    pub fn snapshot_on(&self, unit: &BackupUnit, date: NaiveDate) -> Result<()> {
        let tags = self.snapshot_tags(unit, date);
        info!(unit = %unit.name, path = %unit.path.display(), tags = ?tags, "creating snapshot");

        let status = self
            .tool
            .create(&unit.path, &tags, self.timeout)
            .map_err(|err| Error::Snapshot {
                unit: unit.name.clone(),
                reason: format!("{err:#}"),
            })?;

        if !status.is_success() {
            return Err(Error::Snapshot {
                unit: unit.name.clone(),
                reason: status.describe(),
            }
            .into());
        }
        info!(unit = %unit.name, "snapshot created");
        Ok(())
    }

    /// Apply the configured retention to `unit`'s snapshots only.
    pub fn apply_retention(&self, unit: &BackupUnit) -> Result<RetentionOutcome> {
        let Some(settings) = &self.retention else {
            return Ok(RetentionOutcome::NoThreshold);
        };
        if !settings.policy.has_threshold() {
            warn!(unit = %unit.name, "retention enabled without any keep threshold; skipping");
            return Ok(RetentionOutcome::NoThreshold);
        }

        info!(unit = %unit.name, policy = ?settings.policy, "applying retention");
        let status = self
            .tool
            .prune(&unit.name, &settings.policy, settings.timeout)
            .map_err(|err| Error::Snapshot {
                unit: unit.name.clone(),
                reason: format!("retention: {err:#}"),
            })?;
        if !status.is_success() {
            return Err(Error::Snapshot {
                unit: unit.name.clone(),
                reason: format!("retention: {}", status.describe()),
            }
            .into());
        }
        Ok(RetentionOutcome::Applied)
    }
}
