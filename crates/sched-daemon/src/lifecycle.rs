// SPDX-License-Identifier: MIT

//! Daemon startup and shutdown: acquire the lock file first so two daemons
//! sharing a state directory can never both come up, then open the store
//! (which replays its own snapshot + WAL — no separate recovery step is
//! needed, since this scheduler has no subprocess-based work to
//! reconcile).

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use fs2::FileExt;
use sched_engine::SchedulerConfig;
use sched_store::{MigrationRegistry, Store};
use thiserror::Error;

use crate::config::{self, ConfigError, Paths};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store error: {0}")]
    Store(#[from] sched_store::StoreError),
}

/// Holds the process-lifetime resources a running daemon needs kept alive.
pub struct DaemonHandle {
    pub paths: Paths,
    pub config: SchedulerConfig,
    // Held only to keep the exclusive lock; released on drop.
    #[allow(dead_code)]
    lock_file: File,
}

pub fn startup() -> Result<(DaemonHandle, Store), LifecycleError> {
    let paths = Paths::resolve()?;
    std::fs::create_dir_all(&paths.state_dir)?;
    std::fs::create_dir_all(&paths.store_dir)?;

    let lock_file = acquire_lock(&paths.lock_path)?;

    if paths.socket_path.exists() {
        std::fs::remove_file(&paths.socket_path)?;
    }

    let config = config::load_scheduler_config(&paths.config_path)?;
    let store = Store::open(&paths.store_dir, &MigrationRegistry::new())?;

    tracing::info!(
        state_dir = %paths.state_dir.display(),
        manifests = store.state().manifests.len(),
        work_queue = store.state().work_queue.len(),
        "daemon started"
    );

    Ok((DaemonHandle { paths, config, lock_file }, store))
}

fn acquire_lock(path: &PathBuf) -> Result<File, LifecycleError> {
    let lock_file =
        std::fs::OpenOptions::new().write(true).create(true).truncate(false).open(path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    lock_file.set_len(0)?;
    let mut lock_file = lock_file;
    writeln!(lock_file, "{}", std::process::id())?;
    Ok(lock_file)
}

impl DaemonHandle {
    pub fn shutdown(&self) {
        tracing::info!("shutting down daemon");
        if self.paths.socket_path.exists() {
            let _ = std::fs::remove_file(&self.paths.socket_path);
        }
        if self.paths.lock_path.exists() {
            let _ = std::fs::remove_file(&self.paths.lock_path);
        }
    }
}
