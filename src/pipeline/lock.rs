//! Per-artifact run serialization.
//!
//! Every stage locks each artifact it touches, its input as well as its
//! output, so two runs sharing a file never overlap; the second one waits
//! until the first has released its guards. Runs on disjoint artifacts
//! proceed independently.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Held for the duration of a run; dropping it lets the next run start.
pub type RunGuard = OwnedMutexGuard<()>;

/// Registry of one async mutex per artifact path.
///
/// Entries nobody holds or waits on are pruned whenever a lock is looked up.
#[derive(Debug, Default)]
pub struct RunLocks {
    locks: Mutex<HashMap<PathBuf, Arc<AsyncMutex<()>>>>,
}

impl RunLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `artifact`.
    pub async fn acquire(&self, artifact: &Path) -> RunGuard {
        let lock = self.lock_for(artifact);
        lock.lock_owned().await
    }

    /// Wait for exclusive use of every path in `artifacts`.
    ///
    /// Locks are taken in sorted key order with duplicates collapsed, so
    /// callers locking overlapping sets cannot deadlock each other.
    pub async fn acquire_all(&self, artifacts: &[&Path]) -> Vec<RunGuard> {
        let mut keys: Vec<PathBuf> = artifacts.iter().map(|a| lock_key(a)).collect();
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            guards.push(self.lock_for_key(key).lock_owned().await);
        }
        guards
    }

    /// Take the lock only if no other run holds it.
    pub fn try_acquire(&self, artifact: &Path) -> Option<RunGuard> {
        self.lock_for(artifact).try_lock_owned().ok()
    }

    /// Number of paths currently tracked.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_for(&self, artifact: &Path) -> Arc<AsyncMutex<()>> {
        self.lock_for_key(lock_key(artifact))
    }

    fn lock_for_key(&self, key: PathBuf) -> Arc<AsyncMutex<()>> {
        // The map holds no invariant a panicking holder could break
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Holders and waiters keep a clone, so a count of one means unused
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(locks.entry(key).or_default())
    }
}

/// Canonical parent directory joined with the file name, so `./a/x.csv`
/// and `a/x.csv` share one lock even before the file exists.
fn lock_key(artifact: &Path) -> PathBuf {
    let parent = artifact
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let dir = std::fs::canonicalize(parent)
        .or_else(|_| std::path::absolute(parent))
        .unwrap_or_else(|_| parent.to_path_buf());
    match artifact.file_name() {
        Some(name) => dir.join(name),
        None => dir,
    }
}
