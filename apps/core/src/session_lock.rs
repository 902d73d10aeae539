use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug)]
pub enum LockError {
    /// A live marker already exists for this session identifier.
    AlreadyRunning(String),
    NotHeld(String),
    Io(std::io::Error),
}

impl std::fmt::Display for LockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyRunning(id) => write!(f, "session '{id}' is already running"),
            Self::NotHeld(id) => write!(f, "session lock '{id}' is not held"),
            Self::Io(error) => write!(f, "lock io error: {error}"),
        }
    }
}

impl std::error::Error for LockError {}

impl From<std::io::Error> for LockError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Advisory single-instance marker keyed by a session identifier. An
/// empty identifier disables the lock entirely: both operations become
/// no-ops so unnamed sessions never contend.
pub trait SessionLock: Send + Sync {
    fn acquire(&self, id: &str) -> Result<(), LockError>;
    fn release(&self, id: &str) -> Result<(), LockError>;
}

/// Filesystem-visible marker files under a lock directory, one
/// `<id>.lock` per session, created with `create_new` so acquisition
/// fails fast when another process got there first.
pub struct FileSessionLock {
    dir: PathBuf,
}

impl FileSessionLock {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn marker_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.lock"))
    }
}

impl SessionLock for FileSessionLock {
    fn acquire(&self, id: &str) -> Result<(), LockError> {
        if id.is_empty() {
            return Ok(());
        }

        fs::create_dir_all(&self.dir)?;
        let path = self.marker_path(id);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(LockError::AlreadyRunning(id.to_string()));
            }
            Err(error) => return Err(LockError::Io(error)),
        };

        // The pid is informational; staleness handling is the
        // operator's business for an advisory lock.
        let _ = write!(file, "{}", std::process::id());
        Ok(())
    }

    fn release(&self, id: &str) -> Result<(), LockError> {
        if id.is_empty() {
            return Ok(());
        }

        match fs::remove_file(self.marker_path(id)) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                Err(LockError::NotHeld(id.to_string()))
            }
            Err(error) => Err(LockError::Io(error)),
        }
    }
}

/// In-memory fake for deterministic unit tests.
#[derive(Default)]
pub struct MemorySessionLock {
    held: Mutex<HashSet<String>>,
}

impl SessionLock for MemorySessionLock {
    fn acquire(&self, id: &str) -> Result<(), LockError> {
        if id.is_empty() {
            return Ok(());
        }
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if !held.insert(id.to_string()) {
            return Err(LockError::AlreadyRunning(id.to_string()));
        }
        Ok(())
    }

    fn release(&self, id: &str) -> Result<(), LockError> {
        if id.is_empty() {
            return Ok(());
        }
        let mut held = self.held.lock().unwrap_or_else(PoisonError::into_inner);
        if !held.remove(id) {
            return Err(LockError::NotHeld(id.to_string()));
        }
        Ok(())
    }
}

/// Holds the lock for the lifetime of a run. `release` reports errors
/// for the normal shutdown path; `Drop` covers panic unwinds so the
/// marker is never leaked.
pub struct SessionLockGuard {
    lock: Arc<dyn SessionLock>,
    id: String,
    released: AtomicBool,
}

impl SessionLockGuard {
    pub fn acquire(lock: Arc<dyn SessionLock>, id: &str) -> Result<Self, LockError> {
        lock.acquire(id)?;
        Ok(Self {
            lock,
            id: id.to_string(),
            released: AtomicBool::new(false),
        })
    }

    pub fn release(&self) -> Result<(), LockError> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.lock.release(&self.id)
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Drop for SessionLockGuard {
    fn drop(&mut self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            let _ = self.lock.release(&self.id);
        }
    }
}

pub fn default_lock_dir(base: &Path) -> PathBuf {
    base.join("locks")
}
