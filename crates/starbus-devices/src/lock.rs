//! Advisory hardware locks.
//!
//! One piece of hardware must never be driven by two processes at once.
//! The lock is a file created with `create_new` in a shared directory;
//! whoever creates it owns the hardware, everyone else fails fast with
//! [`BusError::Locked`] instead of queueing. Within one process the lock
//! is reference-counted so that a master device and its internal slaves
//! can share a serial link.
//!
//! Locks are advisory: they protect against cooperating bus servers, not
//! against arbitrary programs opening the port.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Mutex;

use starbus_core::{BusError, Result};
use tracing::{debug, warn};

use crate::file_safe_name;

/// Per-process registry of held hardware locks.
pub struct LockManager {
    dir: PathBuf,
    held: Mutex<HashMap<String, usize>>,
}

impl LockManager {
    /// Locks live in `dir`; every cooperating process on the host must use
    /// the same directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            held: Mutex::new(HashMap::new()),
        }
    }

    /// The conventional host-wide lock directory.
    pub fn default_dir() -> PathBuf {
        std::env::temp_dir()
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("starbus_{key}.lock"))
    }

    /// Acquire the lock for `name`, or bump its count if this process
    /// already holds it. Never blocks: contention is an immediate
    /// [`BusError::Locked`].
    pub fn acquire(&self, name: &str) -> Result<()> {
        let key = file_safe_name(name);
        let mut held = self.held.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(count) = held.get_mut(&key) {
            *count += 1;
            return Ok(());
        }
        fs::create_dir_all(&self.dir)?;
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.path(&key))
        {
            Ok(mut file) => {
                // PID is informational, for operators chasing a stale lock.
                let _ = writeln!(file, "{}", std::process::id());
                held.insert(key, 1);
                debug!(lock = %name, "hardware lock acquired");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                warn!(lock = %name, "hardware lock held by another process");
                Err(BusError::Locked(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Drop one reference to the lock for `name`; the file disappears when
    /// the count reaches zero. Releasing a lock this process does not hold
    /// is a no-op.
    pub fn release(&self, name: &str) {
        let key = file_safe_name(name);
        let mut held = self.held.lock().unwrap_or_else(|p| p.into_inner());
        let Some(count) = held.get_mut(&key) else {
            return;
        };
        *count -= 1;
        if *count == 0 {
            held.remove(&key);
            if let Err(e) = fs::remove_file(self.path(&key)) {
                warn!(lock = %name, error = %e, "failed to remove lock file");
            }
            debug!(lock = %name, "hardware lock released");
        }
    }

    /// Whether this process currently holds the lock for `name`.
    pub fn is_held(&self, name: &str) -> bool {
        let key = file_safe_name(name);
        self.held
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains_key(&key)
    }
}

impl Drop for LockManager {
    fn drop(&mut self) {
        let held = self.held.lock().unwrap_or_else(|p| p.into_inner());
        for key in held.keys() {
            let _ = fs::remove_file(self.path(key));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_process_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let ours = LockManager::new(dir.path());
        let theirs = LockManager::new(dir.path());

        ours.acquire("Mount SynScan").unwrap();
        match theirs.acquire("Mount SynScan") {
            Err(BusError::Locked(name)) => assert_eq!(name, "Mount SynScan"),
            other => panic!("unexpected result {other:?}"),
        }

        ours.release("Mount SynScan");
        theirs.acquire("Mount SynScan").unwrap();
    }

    #[test]
    fn reacquire_in_process_is_counted() {
        let dir = tempfile::tempdir().unwrap();
        let locks = LockManager::new(dir.path());

        locks.acquire("Camera").unwrap();
        locks.acquire("Camera").unwrap();
        locks.release("Camera");
        assert!(locks.is_held("Camera"));
        locks.release("Camera");
        assert!(!locks.is_held("Camera"));
        assert!(!dir.path().join("starbus_Camera.lock").exists());
    }

    #[test]
    fn release_without_acquire_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        let locks = LockManager::new(dir.path());
        locks.release("Ghost");
        assert!(!locks.is_held("Ghost"));
    }
}
