//! Stop/start control of a unit's services with verified, bounded retries.
//!
//! The restart decision is driven only by the [`InitialState`] captured before
//! anything was stopped, never by what the runtime reports afterwards.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    exec::ActionStatus,
    runtime::ContainerRuntime,
    units::BackupUnit,
    Error, Result,
};

pub mod retry;

pub use retry::{RetryPolicy, Sleeper, ThreadSleeper};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialState {
    Running,
    Stopped,
    NotFound,
    Unknown,
}

impl InitialState {
    /// Running and Unknown units are stopped before the snapshot.
    pub fn requires_stop(self) -> bool {
        matches!(self, InitialState::Running | InitialState::Unknown)
    }

    /// Only units observed running before the backup are started again.
    pub fn requires_start(self) -> bool {
        matches!(self, InitialState::Running)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleTiming {
    pub stop_timeout: Duration,
    pub start_timeout: Duration,
    /// Wait after a clean stop request, before the first verification poll.
    pub post_stop_wait: Duration,
    /// Wait used instead of `post_stop_wait` when the stop request failed or timed out.
    pub forced_stop_wait: Duration,
    pub stop_verify: RetryPolicy,
    pub start_verify: RetryPolicy,
}

impl Default for LifecycleTiming {
    fn default() -> Self {
        let verify = RetryPolicy::new(3, Duration::from_secs(2));
        Self {
            stop_timeout: Duration::from_secs(60),
            start_timeout: Duration::from_secs(120),
            post_stop_wait: Duration::from_secs(2),
            forced_stop_wait: Duration::from_secs(10),
            stop_verify: verify,
            start_verify: verify,
        }
    }
}

pub struct LifecycleController {
    runtime: Box<dyn ContainerRuntime>,
    sleeper: Box<dyn Sleeper>,
    timing: LifecycleTiming,
}

impl LifecycleController {
    pub fn new(
        runtime: Box<dyn ContainerRuntime>,
        sleeper: Box<dyn Sleeper>,
        timing: LifecycleTiming,
    ) -> Self {
        Self {
            runtime,
            sleeper,
            timing,
        }
    }

    /// Observe whether `unit` is running. Query failures yield `Unknown`.
    pub fn capture_initial_state(&self, unit: &BackupUnit) -> InitialState {
        if !unit.exists() {
            return InitialState::NotFound;
        }
        match self.runtime.running_services(unit) {
            Ok(0) => InitialState::Stopped,
            Ok(_) => InitialState::Running,
            Err(err) => {
                warn!(unit = %unit.name, error = %format!("{err:#}"), "could not query runtime state");
                InitialState::Unknown
            }
        }
    }

    /// Stop `unit` and verify that no service is left running.
    pub fn stop(&self, unit: &BackupUnit, initial: InitialState) -> Result<()> {
        if !initial.requires_stop() {
            debug!(unit = %unit.name, ?initial, "not running; nothing to stop");
            return Ok(());
        }

        info!(unit = %unit.name, timeout_secs = self.timing.stop_timeout.as_secs(), "stopping services");
        let status = self
            .runtime
            .stop(unit, self.timing.stop_timeout)
            .unwrap_or_else(|err| ActionStatus::Failed {
                code: None,
                stderr: format!("{err:#}"),
            });

        let wait = if status.is_success() {
            self.timing.post_stop_wait
        } else {
            warn!(
                unit = %unit.name,
                status = %status.describe(),
                wait_secs = self.timing.forced_stop_wait.as_secs(),
                "stop request did not complete cleanly; allowing extra time before verification"
            );
            self.timing.forced_stop_wait
        };
        self.sleeper.sleep(wait);

        let verified = self
            .timing
            .stop_verify
            .poll(self.sleeper.as_ref(), |attempt| {
                match self.runtime.running_services(unit) {
                    Ok(0) => true,
                    Ok(remaining) => {
                        debug!(unit = %unit.name, attempt, remaining, "services still running");
                        false
                    }
                    Err(err) => {
                        debug!(unit = %unit.name, attempt, error = %format!("{err:#}"), "stop verification query failed");
                        false
                    }
                }
            });

        match verified {
            Some(attempt) => {
                info!(unit = %unit.name, attempt, "services stopped");
                Ok(())
            }
            None => Err(Error::Lifecycle {
                unit: unit.name.clone(),
                reason: format!(
                    "services still running after {} verification attempts (stop request {})",
                    self.timing.stop_verify.attempts,
                    status.describe()
                ),
            }
            .into()),
        }
    }

    /// Start `unit` again if it was running before the backup.
    pub fn start(&self, unit: &BackupUnit, initial: InitialState) -> Result<()> {
        if !initial.requires_start() {
            debug!(unit = %unit.name, ?initial, "was not running before backup; leaving stopped");
            return Ok(());
        }

        info!(unit = %unit.name, "starting services");
        let status = self
            .runtime
            .start(unit, self.timing.start_timeout)
            .unwrap_or_else(|err| ActionStatus::Failed {
                code: None,
                stderr: format!("{err:#}"),
            });
        if !status.is_success() {
            warn!(unit = %unit.name, status = %status.describe(), "start request reported failure; verifying anyway");
        }

        let verified = self
            .timing
            .start_verify
            .poll(self.sleeper.as_ref(), |attempt| {
                match self.runtime.running_services(unit) {
                    Ok(0) => {
                        debug!(unit = %unit.name, attempt, "no service running yet");
                        false
                    }
                    Ok(_) => true,
                    Err(err) => {
                        debug!(unit = %unit.name, attempt, error = %format!("{err:#}"), "start verification query failed");
                        false
                    }
                }
            });

        match verified {
            Some(attempt) => {
                info!(unit = %unit.name, attempt, "services running");
                Ok(())
            }
            None => Err(Error::Lifecycle {
                unit: unit.name.clone(),
                reason: format!(
                    "no service running after {} verification attempts (start request {})",
                    self.timing.start_verify.attempts,
                    status.describe()
                ),
            }
            .into()),
        }
    }
}
