//! Cross-process exclusive write lock at `.yep-mem/sync.lock`. A lock older than 5 minutes or whose pid is no longer alive is
//! considered stale and may be replaced.

use crate::config::store_dir;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const STALE_AFTER_SECS: u64 = 5 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockFile {
    pid: u32,
    ts: u64,
}

fn lock_path(repo_root: &Path) -> PathBuf {
    store_dir(repo_root).join("sync.lock")
}

fn now_unix() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

#[cfg(unix)]
fn pid_is_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

#[cfg(not(unix))]
fn pid_is_alive(_pid: u32) -> bool {
    // No portable check; assume alive so we never steal a live lock.
    true
}

fn is_stale(lock: &LockFile) -> bool {
    let age = now_unix().saturating_sub(lock.ts);
    age > STALE_AFTER_SECS || !pid_is_alive(lock.pid)
}

/// RAII guard: released on drop, and explicitly in every early-return exit
/// path since `?` unwinds through `Drop` anyway.
pub struct SyncLock {
    path: PathBuf,
}

impl SyncLock {
    /// Acquire the exclusive lock, failing fast (no blocking/retry) on
    /// contention.
    pub fn acquire(repo_root: &Path) -> Result<Self> {
        let dir = store_dir(repo_root);
        std::fs::create_dir_all(&dir).context("creating .yep-mem/")?;
        let path = lock_path(repo_root);

        if let Ok(text) = std::fs::read_to_string(&path) {
            if let Ok(existing) = serde_json::from_str::<LockFile>(&text) {
                if !is_stale(&existing) {
                    return Err(crate::error::CoreError::LockContention.into());
                }
                tracing::warn!(pid = existing.pid, "replacing stale sync.lock");
            }
        }

        let mine = LockFile {
            pid: std::process::id(),
            ts: now_unix(),
        };
        std::fs::write(&path, serde_json::to_string(&mine)?).context("writing sync.lock")?;
        Ok(Self { path })
    }

    pub fn release(self) {
        drop(self);
    }
}

impl Drop for SyncLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
