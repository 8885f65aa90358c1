//! Blocking invocation of external tools with a hard deadline.

use std::{
    io::Read,
    os::unix::process::CommandExt,
    process::{Command, ExitStatus, Stdio},
    thread,
    time::{Duration, Instant},
};

use serde::Serialize;
use tracing::{debug, warn};

use crate::{Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Structured result of a stop/start/snapshot style request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionStatus {
    Completed,
    Failed { code: Option<i32>, stderr: String },
    TimedOut,
}

impl ActionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ActionStatus::Completed)
    }

    pub fn describe(&self) -> String {
        match self {
            ActionStatus::Completed => "completed".into(),
            ActionStatus::Failed { code, stderr } => match code {
                Some(code) if stderr.is_empty() => format!("exit code {code}"),
                Some(code) => format!("exit code {code}: {stderr}"),
                None if stderr.is_empty() => "terminated by signal".into(),
                None => format!("terminated by signal: {stderr}"),
            },
            ActionStatus::TimedOut => "timed out".into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: Option<ExitStatus>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.status.map_or(false, |s| s.success())
    }

    pub fn action_status(&self) -> ActionStatus {
        if self.timed_out {
            return ActionStatus::TimedOut;
        }
        if self.success() {
            return ActionStatus::Completed;
        }
        ActionStatus::Failed {
            code: self.status.and_then(|s| s.code()),
            stderr: self.stderr.trim().to_string(),
        }
    }
}

/// Run `cmd` to completion, killing it once `timeout` elapses.
///
/// Output is drained on helper threads so a chatty child cannot block on a
/// full pipe while we poll for its exit. The child leads its own process
/// group: a terminal Ctrl-C does not reach it, and a timeout kills the whole
/// group so grandchildren cannot hold the pipes open.
pub fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Result<CommandOutput> {
    let program = format!("{:?}", cmd.get_program());
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0);

    let mut child = cmd.spawn().map_err(|err| {
        if err.kind() == std::io::ErrorKind::NotFound {
            Error::Cli(format!("{program} not found in PATH"))
        } else {
            Error::Io(err)
        }
    })?;

    let stdout_reader = child.stdout.take().map(drain);
    let stderr_reader = child.stderr.take().map(drain);

    let deadline = Instant::now() + timeout;
    let mut timed_out = false;
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break Some(status);
        }
        if Instant::now() >= deadline {
            warn!(program = %program, timeout_secs = timeout.as_secs(), "command timed out; killing");
            timed_out = true;
            unsafe {
                libc::kill(-(child.id() as i32), libc::SIGKILL);
            }
            let _ = child.kill();
            break child.wait().ok();
        }
        thread::sleep(POLL_INTERVAL);
    };

    let stdout = stdout_reader.map(join_output).unwrap_or_default();
    let stderr = stderr_reader.map(join_output).unwrap_or_default();

    if !stdout.trim().is_empty() {
        debug!(program = %program, stdout = %stdout.trim_end(), "command stdout");
    }
    if !stderr.trim().is_empty() {
        debug!(program = %program, stderr = %stderr.trim_end(), "command stderr");
    }

    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).to_string()
    })
}

fn join_output(handle: thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}
