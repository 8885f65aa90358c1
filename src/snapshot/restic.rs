//! `restic` implementation of [`SnapshotTool`].

use std::{
    path::{Path, PathBuf},
    process::Command,
    time::Duration,
};

use tracing::debug;

use crate::{
    exec::{run_with_timeout, ActionStatus},
    snapshot::{RetentionPolicy, SnapshotTool},
    Result,
};

#[derive(Debug, Clone)]
pub struct ResticTool {
    program: String,
    repository: String,
    password_file: Option<PathBuf>,
    exclude: Vec<String>,
}

impl ResticTool {
    pub fn new(program: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            repository: repository.into(),
            password_file: None,
            exclude: Vec::new(),
        }
    }

    pub fn with_password_file(mut self, path: Option<PathBuf>) -> Self {
        self.password_file = path;
        self
    }

    pub fn with_exclude(mut self, patterns: Vec<String>) -> Self {
        self.exclude = patterns;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.env("RESTIC_REPOSITORY", &self.repository);
        if let Some(password_file) = &self.password_file {
            cmd.env("RESTIC_PASSWORD_FILE", password_file);
        }
        cmd
    }

    /// Arguments for `restic backup`, without the program name.
    pub fn backup_args(&self, path: &Path, tags: &[String]) -> Vec<String> {
        let mut args = vec!["backup".to_string(), path.display().to_string()];
        for tag in tags {
            args.push("--tag".into());
            args.push(tag.clone());
        }
        for pattern in &self.exclude {
            args.push("--exclude".into());
            args.push(pattern.clone());
        }
        args
    }

    /// Arguments for `restic forget`, scoped to snapshots carrying `tag`.
    pub fn forget_args(tag: &str, policy: &RetentionPolicy) -> Vec<String> {
        let mut args = vec!["forget".to_string(), "--tag".into(), tag.to_string()];
        let thresholds = [
            ("--keep-last", policy.keep_last),
            ("--keep-daily", policy.keep_daily),
            ("--keep-weekly", policy.keep_weekly),
            ("--keep-monthly", policy.keep_monthly),
            ("--keep-yearly", policy.keep_yearly),
        ];
        for (flag, value) in thresholds {
            if let Some(value) = value {
                args.push(flag.into());
                args.push(value.to_string());
            }
        }
        if policy.prune {
            args.push("--prune".into());
        }
        args
    }
}

impl SnapshotTool for ResticTool {
    fn create(&self, path: &Path, tags: &[String], timeout: Duration) -> Result<ActionStatus> {
        let args = self.backup_args(path, tags);
        debug!(program = %self.program, args = ?args, "invoking snapshot tool");
        let mut cmd = self.command();
        cmd.args(&args);
        let output = run_with_timeout(cmd, timeout)?;
        Ok(output.action_status())
    }

    fn prune(
        &self,
        tag: &str,
        policy: &RetentionPolicy,
        timeout: Duration,
    ) -> Result<ActionStatus> {
        let args = Self::forget_args(tag, policy);
        debug!(program = %self.program, args = ?args, "invoking retention");
        let mut cmd = self.command();
        cmd.args(&args);
        let output = run_with_timeout(cmd, timeout)?;
        Ok(output.action_status())
    }
}
