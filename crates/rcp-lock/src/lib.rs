//! Whole-process advisory locking via `flock(2)`, used to guard the trust
//! store and source cache so concurrent engine invocations in the same
//! working directory do not corrupt them (spec §5 "Shared-resource
//! policy").
//!
//! Adapted from the session lock used elsewhere in this workspace: raw
//! `libc::flock` rather than an RAII wrapper crate, so the guard only
//! needs to own the `File` (whose fd carries the lock) without any
//! self-referential borrow back into a lock owner.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct LockDiagnostic {
    pid: u32,
    reason: String,
    acquired_at: DateTime<Utc>,
}

/// Advisory lock guard. Holds the open `File` whose fd carries the
/// `flock`; `Drop` releases it explicitly via `LOCK_UN` rather than
/// relying on close-on-drop timing.
pub struct ResourceLock {
    file: File,
    lock_path: PathBuf,
}

impl std::fmt::Debug for ResourceLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceLock").field("lock_path", &self.lock_path).finish()
    }
}

impl Drop for ResourceLock {
    fn drop(&mut self) {
        let fd = self.file.as_raw_fd();
        unsafe {
            libc::flock(fd, libc::LOCK_UN);
        }
    }
}

impl ResourceLock {
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

/// Acquire a blocking exclusive lock at `lock_path` (parent directories
/// are created as needed). Blocks until available rather than failing
/// immediately — unlike the per-tool session lock this guards a resource
/// every engine invocation needs, so a short wait is preferable to an
/// immediate error.
pub fn acquire(lock_path: &Path, reason: &str) -> Result<ResourceLock> {
    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create lock directory: {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)
        .with_context(|| format!("failed to open lock file: {}", lock_path.display()))?;

    let fd = file.as_raw_fd();
    let ret = unsafe { libc::flock(fd, libc::LOCK_EX) };
    if ret != 0 {
        return Err(anyhow::anyhow!(
            "failed to acquire advisory lock at {}",
            lock_path.display()
        ));
    }

    let mut lock = ResourceLock {
        file,
        lock_path: lock_path.to_path_buf(),
    };
    let diagnostic = LockDiagnostic {
        pid: std::process::id(),
        reason: reason.to_string(),
        acquired_at: Utc::now(),
    };
    let json = serde_json::to_string(&diagnostic).context("failed to serialize lock diagnostic")?;
    lock.file.set_len(0).context("failed to truncate lock file")?;
    lock.file.write_all(json.as_bytes()).context("failed to write lock diagnostic")?;
    lock.file.flush().context("failed to flush lock file")?;

    Ok(lock)
}

/// Try to acquire without blocking; `Ok(None)` means another process holds
/// the lock.
pub fn try_acquire(lock_path: &Path, reason: &str) -> Result<Option<ResourceLock>> {
    if let Some(parent) = lock_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create lock directory: {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)
        .with_context(|| format!("failed to open lock file: {}", lock_path.display()))?;

    let fd = file.as_raw_fd();
    let ret = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
    if ret != 0 {
        return Ok(None);
    }

    let mut lock = ResourceLock {
        file,
        lock_path: lock_path.to_path_buf(),
    };
    let diagnostic = LockDiagnostic {
        pid: std::process::id(),
        reason: reason.to_string(),
        acquired_at: Utc::now(),
    };
    let json = serde_json::to_string(&diagnostic).context("failed to serialize lock diagnostic")?;
    lock.file.set_len(0).context("failed to truncate lock file")?;
    lock.file.write_all(json.as_bytes()).context("failed to write lock diagnostic")?;
    lock.file.flush().context("failed to flush lock file")?;

    Ok(Some(lock))
}

#[allow(dead_code)]
fn read_diagnostic(lock_path: &Path) -> Option<LockDiagnostic> {
    let mut file = File::open(lock_path).ok()?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    serde_json::from_str(&contents).ok()
}
