//! Exclusive lock held for the duration of a sync run.
//!
//! Two runs sharing the data directory would read and write the same ledger
//! snapshot, so a second run is refused while the lock's owner is alive. A
//! lock left behind by a killed process is taken over.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use sysinfo::{Pid, System};

use crate::domain::{AppError, Result};

/// Lock file guard; the file is removed on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Take the lock at `path`, replacing it if its owner has exited.
    ///
    /// # Errors
    /// Returns `Config` if a live run holds the lock, `Io` on other failures.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::io("Failed to create data directory", e))?;
        }

        let mut file = match create_lock_file(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let holder = fs::read_to_string(path).unwrap_or_default();

                match holder_pid(&holder) {
                    Some(pid) if !process_alive(pid) => {
                        tracing::warn!(pid, path = %path.display(), "Taking over stale run lock");
                        fs::remove_file(path)
                            .map_err(|e| AppError::io("Failed to remove stale lock file", e))?;
                        create_lock_file(path)
                            .map_err(|e| AppError::io("Failed to create lock file", e))?
                    }
                    _ => {
                        return Err(AppError::Config {
                            message: format!(
                                "A sync is already running ({}). Remove {} if it is stale.",
                                holder.trim(),
                                path.display()
                            ),
                        });
                    }
                }
            }
            Err(e) => return Err(AppError::io("Failed to create lock file", e)),
        };

        writeln!(file, "pid {} since {}", std::process::id(), Utc::now().to_rfc3339())
            .map_err(|e| AppError::io("Failed to write lock file", e))?;

        tracing::debug!(path = %path.display(), "Run lock acquired");

        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

fn create_lock_file(path: &Path) -> std::io::Result<fs::File> {
    OpenOptions::new().write(true).create_new(true).open(path)
}

/// Pid recorded in a lock file written by [`RunLock::acquire`].
fn holder_pid(contents: &str) -> Option<u32> {
    let mut words = contents.split_whitespace();
    match (words.next(), words.next()) {
        (Some("pid"), Some(pid)) => pid.parse().ok(),
        _ => None,
    }
}

fn process_alive(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_process(pid);
    system.process(pid).is_some()
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), "Failed to remove lock file: {}", e);
        }
    }
}
