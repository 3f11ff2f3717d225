// SPDX-License-Identifier: MIT

//! Single-leader advisory lock guarding one evaluator cycle at a time.
//!
//! Two implementations of the same non-blocking try-and-release contract:
//! an in-process `AtomicBool` for tests and single-replica deployments,
//! and an `fs2` exclusive file lock for multi-process deployments sharing
//! a state directory.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use fs2::FileExt;
use sha2::{Digest, Sha256};

/// The stable lock key the evaluator acquires once per cycle.
pub const MANIFEST_MANAGER_LOCK_KEY: &str = "chainsharp_manifest_manager";

fn stable_hash(key: &str) -> u64 {
    let digest = Sha256::digest(key.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Non-blocking advisory lock. `try_acquire` returns `None` instead of
/// blocking when another holder already has it; the guard releases on drop.
pub trait AdvisoryLock: Send + Sync + 'static {
    type Guard: Send;

    fn try_acquire(&self) -> Option<Self::Guard>;
}

/// In-process lock for tests and single-replica deployments.
#[derive(Clone, Default)]
pub struct LocalAdvisoryLock {
    held: Arc<AtomicBool>,
}

impl LocalAdvisoryLock {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct LocalLockGuard {
    held: Arc<AtomicBool>,
}

impl Drop for LocalLockGuard {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
    }
}

impl AdvisoryLock for LocalAdvisoryLock {
    type Guard = LocalLockGuard;

    fn try_acquire(&self) -> Option<Self::Guard> {
        self.held
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| LocalLockGuard { held: Arc::clone(&self.held) })
    }
}

/// Cross-process lock backed by an exclusive file lock, keyed on the
/// stable hash of `key` rather than a literal filename so the lock
/// directory can be shared by unrelated lock names without collision.
pub struct FileAdvisoryLock {
    path: PathBuf,
}

impl FileAdvisoryLock {
    pub fn new(lock_dir: impl AsRef<Path>, key: &str) -> Self {
        let file_name = format!("{:016x}.lock", stable_hash(key));
        Self { path: lock_dir.as_ref().join(file_name) }
    }
}

pub struct FileLockGuard {
    file: File,
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl AdvisoryLock for FileAdvisoryLock {
    type Guard = FileLockGuard;

    fn try_acquire(&self) -> Option<Self::Guard> {
        // Open (not truncate) before locking so a failed-to-lock path never
        // wipes a file another process might still be reading.
        let file = OpenOptions::new().write(true).create(true).truncate(false).open(&self.path).ok()?;
        file.try_lock_exclusive().ok()?;
        Some(FileLockGuard { file })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_lock_rejects_a_second_holder_until_the_first_drops() {
        let lock = LocalAdvisoryLock::new();
        let first = lock.try_acquire().expect("first acquire should succeed");
        assert!(lock.try_acquire().is_none());
        drop(first);
        assert!(lock.try_acquire().is_some());
    }

    #[test]
    fn file_lock_rejects_a_second_holder_until_the_first_drops() {
        let dir = tempfile::tempdir().unwrap();
        let a = FileAdvisoryLock::new(dir.path(), MANIFEST_MANAGER_LOCK_KEY);
        let b = FileAdvisoryLock::new(dir.path(), MANIFEST_MANAGER_LOCK_KEY);

        let guard = a.try_acquire().expect("first acquire should succeed");
        assert!(b.try_acquire().is_none());
        drop(guard);
        assert!(b.try_acquire().is_some());
    }

    #[test]
    fn different_keys_hash_to_different_files() {
        let dir = tempfile::tempdir().unwrap();
        let a = FileAdvisoryLock::new(dir.path(), "lock-a");
        let b = FileAdvisoryLock::new(dir.path(), "lock-b");
        let _first = a.try_acquire().unwrap();
        assert!(b.try_acquire().is_some());
    }
}
