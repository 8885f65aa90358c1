//! Single-instance run guard backed by a PID file.
//!
//! The file is created with `O_EXCL`; an existing file only blocks a new run
//! while the process it names is alive.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PidRecord {
    pub pid: i32,
    pub started_at: String,
    pub root: PathBuf,
}

pub fn pid_alive(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    if unsafe { libc::kill(pid, 0) } == 0 {
        return true;
    }
    // EPERM: the process exists but belongs to someone else.
    std::io::Error::last_os_error().raw_os_error() != Some(libc::ESRCH)
}

pub fn read_pid_record(path: &Path) -> Result<PidRecord> {
    let bytes = fs::read(path)?;
    let record: PidRecord = serde_json::from_slice(&bytes)?;
    Ok(record)
}

const ACQUIRE_ATTEMPTS: usize = 3;

/// Remove the guard file at `path` only if it still holds `seen`.
///
/// The file is first renamed to a name private to this process, so a record
/// written by a competing run after `seen` was read is never unlinked; such a
/// record is linked back into place. Returns whether `seen` was removed.
pub fn remove_if_unchanged(path: &Path, seen: &[u8]) -> Result<bool> {
    let aside = path.with_extension(format!("stale.{}", std::process::id()));
    match fs::rename(path, &aside) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(Error::Io(err).into()),
    }

    let current = fs::read(&aside)?;
    if current == seen {
        fs::remove_file(&aside)?;
        return Ok(true);
    }

    debug!(path = %path.display(), "run guard changed while clearing it; restoring");
    if let Err(err) = fs::hard_link(&aside, path) {
        warn!(path = %path.display(), error = %err, "could not restore replaced run guard");
    }
    fs::remove_file(&aside)?;
    Ok(false)
}

#[derive(Debug)]
pub struct RunGuard {
    path: PathBuf,
    pid: i32,
}

impl RunGuard {
    /// Claim the guard at `path` for the current process.
    pub fn acquire(path: &Path, root: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let pid = std::process::id() as i32;

        // Later passes only happen after a stale record was cleared or
        // another process raced us to it.
        for _ in 0..ACQUIRE_ATTEMPTS {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    let record = PidRecord {
                        pid,
                        started_at: chrono::Utc::now().to_rfc3339(),
                        root: root.to_path_buf(),
                    };
                    file.write_all(&serde_json::to_vec_pretty(&record)?)?;
                    file.sync_all()?;
                    info!(path = %path.display(), pid, "run guard acquired");
                    return Ok(Self {
                        path: path.to_path_buf(),
                        pid,
                    });
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    let seen = match fs::read(path) {
                        Ok(bytes) => bytes,
                        Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                        Err(err) => return Err(Error::Io(err).into()),
                    };
                    match serde_json::from_slice::<PidRecord>(&seen) {
                        Ok(existing) if pid_alive(existing.pid) => {
                            warn!(path = %path.display(), owner = existing.pid, "another run holds the guard");
                            return Err(Error::AlreadyRunning(existing.pid).into());
                        }
                        Ok(existing) => {
                            warn!(path = %path.display(), stale_pid = existing.pid, "removing stale run guard");
                        }
                        Err(err) => {
                            warn!(path = %path.display(), error = %err, "removing unreadable run guard");
                        }
                    }
                    remove_if_unchanged(path, &seen)?;
                }
                Err(err) => return Err(Error::Io(err).into()),
            }
        }

        Err(Error::Cli(format!("could not acquire run guard {}", path.display())).into())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release explicitly; dropping the guard does the same.
    pub fn release(self) -> Result<()> {
        drop(self);
        Ok(())
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        // Never delete a record another process took over.
        match read_pid_record(&self.path) {
            Ok(record) if record.pid == self.pid => {
                let _ = fs::remove_file(&self.path);
                debug!(path = %self.path.display(), "run guard released");
            }
            _ => {}
        }
    }
}
