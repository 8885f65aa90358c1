//! Sequential backup pipeline.
//!
//! discover → synchronize the selection list → capture the initial state of
//! every enabled unit → per unit: stop, snapshot, restart, retention.
//! A unit failure is recorded and the batch moves on.

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use tracing::{error, info, instrument, warn};

use crate::{
    config::Config,
    lifecycle::{InitialState, LifecycleController, ThreadSleeper},
    runtime::ComposeRuntime,
    selection::{SelectionStore, SyncChanges},
    snapshot::{ResticTool, RetentionSettings, SnapshotAdapter},
    units::{discover_units, BackupUnit},
    Error, Result,
};

pub mod report;

pub use report::{RetentionStatus, RunReport, UnitOutcome, UnitReport};

/// Discover units under `root` and persist the reconciled selection list.
/// The file is only rewritten when something changed.
pub fn synchronize_selection(
    root: &Path,
    manifests: &[String],
    selection_path: &Path,
) -> Result<(Vec<BackupUnit>, SyncChanges)> {
    let units = discover_units(root, manifests)?;
    info!(root = %root.display(), count = units.len(), "units discovered");

    let mut store = SelectionStore::load_or_empty(selection_path)?;
    let changes = store.synchronize(units.iter().map(|u| u.name.as_str()));
    if !changes.is_empty() {
        store.save()?;
        info!(
            added = changes.added.len(),
            removed = changes.removed.len(),
            path = %selection_path.display(),
            "selection list updated"
        );
    }
    Ok((units, changes))
}

pub struct Orchestrator {
    root: PathBuf,
    selection_path: PathBuf,
    manifests: Vec<String>,
    lifecycle: LifecycleController,
    snapshots: SnapshotAdapter,
    interrupt: Arc<AtomicBool>,
    dry_run: bool,
}

impl Orchestrator {
    pub fn new(
        root: impl Into<PathBuf>,
        selection_path: impl Into<PathBuf>,
        manifests: Vec<String>,
        lifecycle: LifecycleController,
        snapshots: SnapshotAdapter,
    ) -> Self {
        Self {
            root: root.into(),
            selection_path: selection_path.into(),
            manifests,
            lifecycle,
            snapshots,
            interrupt: Arc::new(AtomicBool::new(false)),
            dry_run: false,
        }
    }

    /// Wire the docker compose runtime and restic from configuration.
    pub fn from_config(config: &Config, root: &Path) -> Result<Self> {
        let repository = config.repository()?;

        let runtime = ComposeRuntime::new(
            config.runtime.program.clone(),
            config.runtime.manifests.clone(),
        );
        let lifecycle = LifecycleController::new(
            Box::new(runtime),
            Box::new(ThreadSleeper),
            config.lifecycle_timing(),
        );

        let tool = ResticTool::new(config.snapshot.program.clone(), repository)
            .with_password_file(config.snapshot.password_file.clone())
            .with_exclude(config.snapshot.exclude.clone());
        let mut snapshots = SnapshotAdapter::new(
            Box::new(tool),
            Duration::from_secs(config.snapshot.timeout_secs),
        )
        .with_extra_tags(config.snapshot.extra_tags.clone());
        if config.retention.enabled {
            snapshots = snapshots.with_retention(RetentionSettings {
                policy: config.retention.to_policy(),
                timeout: Duration::from_secs(config.retention.timeout_secs),
            });
        }

        Ok(Self::new(
            root,
            config.selection_path(root),
            config.runtime.manifests.clone(),
            lifecycle,
            snapshots,
        ))
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Share a flag that a signal handler sets to request a stop between steps.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = flag;
        self
    }

    pub fn selection_path(&self) -> &Path {
        &self.selection_path
    }

    fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }

    /// Discover units and bring the persisted selection list in line with them.
    pub fn synchronize(&self) -> Result<(Vec<BackupUnit>, SyncChanges)> {
        synchronize_selection(&self.root, &self.manifests, &self.selection_path)
    }

    /// Execute one full backup run.
    pub fn run(&self) -> Result<RunReport> {
        let mut report = RunReport::new(self.dry_run);

        let (units, changes) = self.synchronize()?;
        report.discovered = units.len();
        report.sync = changes;

        let store = SelectionStore::load_or_empty(&self.selection_path)?;
        let enabled = store.enabled_units();
        report.enabled = enabled.len();
        if enabled.is_empty() {
            info!("no units enabled; nothing to back up");
            report.finish();
            return Ok(report);
        }

        // Capture every initial state before the first stop is issued.
        let working_set: Vec<(BackupUnit, InitialState)> = enabled
            .iter()
            .map(|name| {
                let unit = BackupUnit::under_root(&self.root, name);
                let initial = self.initial_state(&unit);
                info!(unit = %unit.name, ?initial, "initial state captured");
                (unit, initial)
            })
            .collect();

        for (unit, initial) in &working_set {
            if self.interrupted() {
                report.interrupted = true;
                warn!(unit = %unit.name, "run interrupted; skipping unit");
                report.record(UnitReport::skipped(&unit.name, *initial));
                continue;
            }
            let unit_report = self.process_unit(unit, *initial);
            if self.interrupted() {
                report.interrupted = true;
            }
            report.record(unit_report);
        }

        report.finish();
        Ok(report)
    }

    fn initial_state(&self, unit: &BackupUnit) -> InitialState {
        if self.dry_run {
            // Dry runs never touch the runtime.
            return if unit.exists() {
                InitialState::Unknown
            } else {
                InitialState::NotFound
            };
        }
        self.lifecycle.capture_initial_state(unit)
    }

    #[instrument(skip(self, unit), fields(unit = %unit.name))]
    fn process_unit(&self, unit: &BackupUnit, initial: InitialState) -> UnitReport {
        if self.dry_run {
            return self.plan_unit(unit, initial);
        }

        let mut report = UnitReport::new(&unit.name, initial);
        report.stop_attempted = initial.requires_stop();

        if let Err(err) = self.lifecycle.stop(unit, initial) {
            error!(unit = %unit.name, error = %format!("{err:#}"), "stop failed; skipping snapshot");
            report.fail(UnitOutcome::StopFailed, &err);
            self.restart(unit, initial, &mut report);
            return report;
        }

        if self.interrupted() {
            warn!(unit = %unit.name, "interrupted before snapshot; restarting unit");
            report.outcome = UnitOutcome::Skipped;
            report.error = Some(Error::Interrupted.to_string());
            self.restart(unit, initial, &mut report);
            return report;
        }

        match self.snapshots.snapshot(unit) {
            Ok(()) => report.snapshot_taken = true,
            Err(err) => {
                error!(unit = %unit.name, error = %format!("{err:#}"), "snapshot failed");
                report.fail(UnitOutcome::SnapshotFailed, &err);
            }
        }

        self.restart(unit, initial, &mut report);

        if report.snapshot_taken && self.snapshots.retention_enabled() {
            // Prune failures leave the fresh snapshot valid; they are reported, not fatal.
            report.retention = Some(match self.snapshots.apply_retention(unit) {
                Ok(outcome) => outcome.into(),
                Err(err) => {
                    warn!(unit = %unit.name, error = %format!("{err:#}"), "retention failed");
                    RetentionStatus::Failed
                }
            });
        }

        if report.outcome == UnitOutcome::Succeeded {
            info!(unit = %unit.name, "unit backed up");
        }
        report
    }

    /// Start `unit` again when it was running before the backup.
    fn restart(&self, unit: &BackupUnit, initial: InitialState, report: &mut UnitReport) {
        report.restart_attempted = initial.requires_start();
        match self.lifecycle.start(unit, initial) {
            Ok(()) => report.restarted = initial.requires_start(),
            Err(err) => {
                error!(unit = %unit.name, error = %format!("{err:#}"), "restart failed");
                if report.outcome.is_failure() || report.outcome == UnitOutcome::Skipped {
                    report.restart_error = Some(format!("{err:#}"));
                } else {
                    report.fail(UnitOutcome::RestartFailed, &err);
                }
            }
        }
    }

    fn plan_unit(&self, unit: &BackupUnit, initial: InitialState) -> UnitReport {
        let mut report = UnitReport::new(&unit.name, initial);
        report.outcome = UnitOutcome::Planned;

        if initial == InitialState::NotFound {
            info!(unit = %unit.name, "dry run: unit directory missing; would skip stop and start");
        } else {
            info!(unit = %unit.name, "dry run: would stop services if running");
        }
        let tags = self
            .snapshots
            .snapshot_tags(unit, chrono::Local::now().date_naive());
        info!(unit = %unit.name, path = %unit.path.display(), tags = ?tags, "dry run: would create snapshot");
        info!(unit = %unit.name, "dry run: would start services that were running");
        if self.snapshots.retention_enabled() {
            info!(unit = %unit.name, "dry run: would apply retention");
        }
        report
    }
}
