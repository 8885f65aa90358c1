//! `docker compose` implementation of [`ContainerRuntime`].

use std::{process::Command, time::Duration};

use tracing::debug;

use crate::{
    exec::{run_with_timeout, ActionStatus},
    runtime::ContainerRuntime,
    units::{find_manifest, BackupUnit},
    Error, Result,
};

/// Deadline for `ps` queries; they never wait on containers.
const QUERY_TIMEOUT: Duration = Duration::from_secs(30);
/// Extra time granted beyond the compose-level stop timeout before the
/// invocation itself is killed.
const STOP_GRACE: Duration = Duration::from_secs(30);

/// Count service ids in `ps --quiet` output. Blank output means zero.
pub fn count_running(stdout: &str) -> usize {
    stdout.lines().filter(|line| !line.trim().is_empty()).count()
}

#[derive(Debug, Clone)]
pub struct ComposeRuntime {
    program: String,
    manifests: Vec<String>,
}

impl ComposeRuntime {
    pub fn new(program: impl Into<String>, manifests: Vec<String>) -> Self {
        Self {
            program: program.into(),
            manifests,
        }
    }

    fn compose(&self, unit: &BackupUnit) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("compose").arg("--project-directory").arg(&unit.path);
        if let Some(manifest) = find_manifest(&unit.path, &self.manifests) {
            cmd.arg("-f").arg(manifest);
        }
        cmd.current_dir(&unit.path);
        cmd
    }
}

impl ContainerRuntime for ComposeRuntime {
    fn running_services(&self, unit: &BackupUnit) -> Result<usize> {
        let mut cmd = self.compose(unit);
        cmd.args(["ps", "--status", "running", "--quiet"]);
        let output = run_with_timeout(cmd, QUERY_TIMEOUT)?;
        if !output.success() {
            return Err(Error::Lifecycle {
                unit: unit.name.clone(),
                reason: format!("ps failed: {}", output.action_status().describe()),
            }
            .into());
        }
        let count = count_running(&output.stdout);
        debug!(unit = %unit.name, count, "running services");
        Ok(count)
    }

    fn stop(&self, unit: &BackupUnit, timeout: Duration) -> Result<ActionStatus> {
        let mut cmd = self.compose(unit);
        cmd.arg("stop")
            .arg("--timeout")
            .arg(timeout.as_secs().to_string());
        let output = run_with_timeout(cmd, timeout + STOP_GRACE)?;
        Ok(output.action_status())
    }

    fn start(&self, unit: &BackupUnit, timeout: Duration) -> Result<ActionStatus> {
        let mut cmd = self.compose(unit);
        cmd.args(["up", "--detach"]);
        let output = run_with_timeout(cmd, timeout)?;
        Ok(output.action_status())
    }
}
