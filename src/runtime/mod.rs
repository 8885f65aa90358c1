//! Container runtime seam used by the lifecycle controller.

use std::time::Duration;

use crate::{exec::ActionStatus, units::BackupUnit, Result};

pub mod compose;

pub use compose::{count_running, ComposeRuntime};

/// Narrow view of the container runtime: count, stop and start the services
/// of one unit. Implementations must not retry; verification is the caller's job.
pub trait ContainerRuntime {
    /// Number of services of `unit` currently running.
    fn running_services(&self, unit: &BackupUnit) -> Result<usize>;

    /// Issue one stop request bounded by `timeout`.
    fn stop(&self, unit: &BackupUnit, timeout: Duration) -> Result<ActionStatus>;

    /// Issue one start request bounded by `timeout`.
    fn start(&self, unit: &BackupUnit, timeout: Duration) -> Result<ActionStatus>;
}
