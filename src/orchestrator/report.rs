//! Machine-readable run summary handed to schedulers and front-ends.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    lifecycle::InitialState, selection::SyncChanges, snapshot::RetentionOutcome, EXIT_OK,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitOutcome {
    Succeeded,
    StopFailed,
    SnapshotFailed,
    RestartFailed,
    /// Not processed because the run was interrupted.
    Skipped,
    /// Dry run: actions were logged, nothing was executed.
    Planned,
}

impl UnitOutcome {
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            UnitOutcome::StopFailed | UnitOutcome::SnapshotFailed | UnitOutcome::RestartFailed
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetentionStatus {
    Applied,
    NoThreshold,
    Failed,
}

impl From<RetentionOutcome> for RetentionStatus {
    fn from(outcome: RetentionOutcome) -> Self {
        match outcome {
            RetentionOutcome::Applied => RetentionStatus::Applied,
            RetentionOutcome::NoThreshold => RetentionStatus::NoThreshold,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub unit: String,
    pub initial_state: InitialState,
    pub outcome: UnitOutcome,
    pub stop_attempted: bool,
    pub snapshot_taken: bool,
    pub restart_attempted: bool,
    pub restarted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention: Option<RetentionStatus>,
    /// Cause of the failure that decided `outcome`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Restart failure that did not decide `outcome` (snapshot or stop failed first).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart_error: Option<String>,
    pub exit_code: i32,
}

impl UnitReport {
    pub fn new(unit: impl Into<String>, initial_state: InitialState) -> Self {
        Self {
            unit: unit.into(),
            initial_state,
            outcome: UnitOutcome::Succeeded,
            stop_attempted: false,
            snapshot_taken: false,
            restart_attempted: false,
            restarted: false,
            retention: None,
            error: None,
            restart_error: None,
            exit_code: EXIT_OK,
        }
    }

    pub fn skipped(unit: impl Into<String>, initial_state: InitialState) -> Self {
        let mut report = Self::new(unit, initial_state);
        report.outcome = UnitOutcome::Skipped;
        report
    }

    /// Record the first failure; later ones never overwrite it.
    pub fn fail(&mut self, outcome: UnitOutcome, err: &anyhow::Error) {
        if self.outcome.is_failure() {
            return;
        }
        self.outcome = outcome;
        self.error = Some(format!("{err:#}"));
        self.exit_code = crate::exit_code_for(err);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub interrupted: bool,
    pub discovered: usize,
    pub enabled: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub exit_code: i32,
    pub sync: SyncChanges,
    pub units: Vec<UnitReport>,
}

impl RunReport {
    pub fn new(dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            dry_run,
            interrupted: false,
            discovered: 0,
            enabled: 0,
            processed: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            exit_code: EXIT_OK,
            sync: SyncChanges::default(),
            units: Vec::new(),
        }
    }

    /// Fold one unit into the counters. The first failing unit decides the exit code.
    pub fn record(&mut self, unit: UnitReport) {
        match unit.outcome {
            UnitOutcome::Skipped => self.skipped += 1,
            outcome => {
                self.processed += 1;
                if outcome.is_failure() {
                    self.failed += 1;
                    if self.exit_code == EXIT_OK {
                        self.exit_code = unit.exit_code;
                    }
                } else {
                    self.succeeded += 1;
                }
            }
        }
        self.units.push(unit);
    }

    pub fn unit(&self, name: &str) -> Option<&UnitReport> {
        self.units.iter().find(|u| u.unit == name)
    }

    pub fn finish(&mut self) {
        if self.interrupted {
            self.exit_code = crate::EXIT_INTERRUPTED;
        }
        self.finished_at = Utc::now();
    }
}
