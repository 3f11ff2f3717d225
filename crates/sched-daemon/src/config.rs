// SPDX-License-Identifier: MIT

//! Daemon-level configuration: filesystem layout and the scheduler config
//! file, resolved via an explicit env var override, falling back to a
//! `dirs`-provided path.

use std::path::PathBuf;

use sched_engine::SchedulerConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine a state directory (set SCHED_STATE_DIR)")]
    NoStateDir,
    #[error("failed to read config file {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse config file {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
}

/// Filesystem layout for one daemon instance.
#[derive(Debug, Clone)]
pub struct Paths {
    pub state_dir: PathBuf,
    pub socket_path: PathBuf,
    pub lock_path: PathBuf,
    pub store_dir: PathBuf,
    pub config_path: PathBuf,
}

impl Paths {
    /// Resolve the state directory: `SCHED_STATE_DIR` env var, or
    /// `dirs::state_dir()/sched` (falling back to the data dir on
    /// platforms without a dedicated state dir).
    pub fn resolve() -> Result<Self, ConfigError> {
        let state_dir = if let Ok(dir) = std::env::var("SCHED_STATE_DIR") {
            PathBuf::from(dir)
        } else {
            dirs::state_dir()
                .or_else(dirs::data_dir)
                .ok_or(ConfigError::NoStateDir)?
                .join("sched")
        };

        Ok(Self {
            socket_path: state_dir.join("daemon.sock"),
            lock_path: state_dir.join("daemon.pid"),
            store_dir: state_dir.join("store"),
            config_path: state_dir.join("config.toml"),
            state_dir,
        })
    }
}

/// Load `SchedulerConfig` from `path`, or fall back to every documented
/// default when the file doesn't exist — a bare `[scheduler]`-less
/// deployment is always valid.
pub fn load_scheduler_config(path: &std::path::Path) -> Result<SchedulerConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            SchedulerConfig::from_toml_str(&contents).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SchedulerConfig::default()),
        Err(e) => Err(ConfigError::ReadFailed(path.to_path_buf(), e)),
    }
}
