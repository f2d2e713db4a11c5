use std::fs;
use std::path::{Path, PathBuf};

use crate::log_warn;

/// Exclusive lock over the board files, held for the duration of one
/// mutating CLI command.
///
/// Board saves rewrite the whole document, so two concurrent writers would
/// silently lose each other's updates. An OS-level file lock serializes
/// them across processes; a sidecar PID file records the holder so a
/// contention error can name the process in the way. Dropping the guard
/// releases the lock.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct BoardLock {
    file: fslock::LockFile,
    pid_file: PathBuf,
}

impl BoardLock {
    /// Take the board lock in `runtime_dir`, creating the directory if
    /// needed. Fails immediately on contention rather than waiting —
    /// mutating commands are single-row quick, so the caller reports the
    /// holder and exits.
    pub fn acquire(runtime_dir: &Path) -> Result<Self, String> {
        fs::create_dir_all(runtime_dir)
            .map_err(|e| format!("Failed to create {}: {}", runtime_dir.display(), e))?;

        let lock_file = runtime_dir.join("board.lock");
        let pid_file = runtime_dir.join("board.pid");

        let mut file = fslock::LockFile::open(&lock_file)
            .map_err(|e| format!("Failed to open {}: {}", lock_file.display(), e))?;

        let locked = file
            .try_lock()
            .map_err(|e| format!("Failed to lock {}: {}", lock_file.display(), e))?;
        if !locked {
            return Err(holder_report(&lock_file, &pid_file));
        }

        // The PID file is diagnostics only; holding the lock does not
        // depend on it.
        if let Err(e) = fs::write(&pid_file, std::process::id().to_string()) {
            log_warn!(
                "Could not record holder PID in {}: {}",
                pid_file.display(),
                e
            );
        }

        Ok(BoardLock { file, pid_file })
    }
}

impl Drop for BoardLock {
    fn drop(&mut self) {
        // Remove the breadcrumb before unlocking, so it can never clobber
        // the PID file the next holder writes right after the release.
        if let Err(e) = fs::remove_file(&self.pid_file) {
            log_warn!("Could not remove {}: {}", self.pid_file.display(), e);
        }
        if let Err(e) = self.file.unlock() {
            log_warn!("Could not release the board lock: {}", e);
        }
    }
}

/// Contention message, naming the holding process when the PID file allows.
fn holder_report(lock_file: &Path, pid_file: &Path) -> String {
    let recorded = fs::read_to_string(pid_file)
        .ok()
        .and_then(|s| s.trim().parse::<i32>().ok());

    match recorded {
        Some(pid) if pid_is_live(pid) => format!(
            "The board is locked by another taskpilot process (PID {})",
            pid
        ),
        Some(pid) => format!(
            "The board lock is held but its recorded holder (PID {}) is gone; \
             remove {} and {} if this persists",
            pid,
            lock_file.display(),
            pid_file.display()
        ),
        None => format!(
            "The board is locked by another taskpilot process; remove {} if no \
             other instance is running",
            lock_file.display()
        ),
    }
}

/// Signal 0 probes for process existence without delivering anything.
fn pid_is_live(pid: i32) -> bool {
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_is_exclusive_until_dropped() {
        let dir = tempfile::tempdir().expect("tempdir");

        let held = BoardLock::acquire(dir.path()).expect("first acquire");
        assert!(BoardLock::acquire(dir.path()).is_err());

        drop(held);
        let _relock = BoardLock::acquire(dir.path()).expect("free again after drop");
    }

    #[test]
    fn contention_error_names_the_live_holder() {
        let dir = tempfile::tempdir().expect("tempdir");

        let _held = BoardLock::acquire(dir.path()).expect("acquire");
        let message = BoardLock::acquire(dir.path()).expect_err("contended");
        assert!(message.contains(&std::process::id().to_string()));
    }

    #[test]
    fn liveness_probe_distinguishes_real_processes() {
        assert!(pid_is_live(std::process::id() as i32));
        assert!(!pid_is_live(99_999_999));
    }
}
