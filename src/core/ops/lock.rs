//! core::ops::lock
//!
//! The repository-wide exclusive operation lock, `.pancake/lock`. Grounded
//! in the teacher's `RepoLock` RAII guard: an `fs2` advisory exclusive lock
//! on a file handle, released automatically on `Drop`. Extended with a
//! pid+timestamp payload so a lock left behind by a crashed process can be
//! recognized as stale and broken instead of wedging the repository forever.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::UtcTimestamp;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("repository is locked by another pancake process (pid {pid})")]
    AlreadyLocked { pid: u32 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockPayload {
    pid: u32,
    acquired_at: String,
}

/// An exclusive, RAII-scoped lock over `.pancake/lock`. Held for the
/// duration of a single Operation Engine invocation (spec §5: the lock
/// serializes whole operations, not individual steps).
pub struct RepoLock {
    path: PathBuf,
    file: Option<File>,
}

impl RepoLock {
    /// Attempt to acquire the lock. Fails fast (does not block) if another
    /// live process holds it; a lock left by a dead pid is broken and
    /// re-acquired automatically.
    pub fn acquire(pancake_dir: impl Into<PathBuf>) -> Result<Self, LockError> {
        let dir: PathBuf = pancake_dir.into();
        std::fs::create_dir_all(&dir)?;
        let path = dir.join("lock");

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)?;

        if file.try_lock_exclusive().is_err() {
            if let Some(payload) = Self::read_payload(&path) {
                if !pid_is_alive(payload.pid) {
                    tracing::warn!(stale_pid = payload.pid, "breaking stale pancake lock");
                    file.unlock().ok();
                    file.try_lock_exclusive().map_err(|_| LockError::AlreadyLocked {
                        pid: payload.pid,
                    })?;
                } else {
                    return Err(LockError::AlreadyLocked { pid: payload.pid });
                }
            } else {
                return Err(LockError::AlreadyLocked { pid: 0 });
            }
        }

        let mut guard = Self {
            path,
            file: Some(file),
        };
        guard.write_payload()?;
        Ok(guard)
    }

    fn write_payload(&mut self) -> Result<(), LockError> {
        let payload = LockPayload {
            pid: std::process::id(),
            acquired_at: UtcTimestamp::now().to_string(),
        };
        let json = serde_json::to_string(&payload).expect("lock payload always serializes");
        if let Some(file) = self.file.as_mut() {
            use std::io::Seek;
            file.set_len(0)?;
            file.seek(std::io::SeekFrom::Start(0))?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }
        Ok(())
    }

    fn read_payload(path: &Path) -> Option<LockPayload> {
        let mut contents = String::new();
        File::open(path).ok()?.read_to_string(&mut contents).ok()?;
        serde_json::from_str(&contents).ok()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = FileExt::unlock(&file);
        }
    }
}

#[cfg(unix)]
fn pid_is_alive(pid: u32) -> bool {
    // `kill -0` checks for existence/permission without signaling the
    // target process; avoids pulling in a libc FFI binding for one syscall.
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(true)
}

#[cfg(not(unix))]
fn pid_is_alive(_pid: u32) -> bool {
    // Conservative on non-Unix: assume the holder might still be alive,
    // so the lock is only broken once it is provably gone elsewhere.
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_then_release_allows_reacquire() {
        let dir = tempfile::tempdir().unwrap();
        {
            let _lock = RepoLock::acquire(dir.path()).unwrap();
        }
        let _lock2 = RepoLock::acquire(dir.path()).unwrap();
    }

    #[test]
    fn payload_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let lock = RepoLock::acquire(dir.path()).unwrap();
        let payload = RepoLock::read_payload(lock.path()).unwrap();
        assert_eq!(payload.pid, std::process::id());
    }
}
