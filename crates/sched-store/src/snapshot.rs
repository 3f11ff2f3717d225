// SPDX-License-Identifier: MIT

//! Snapshot persistence for crash recovery.
//!
//! Snapshots store the complete materialized state at a point in time,
//! identified by the WAL sequence number it was taken at. Recovery loads
//! the snapshot, migrates its JSON to the current schema version if
//! needed, then replays WAL entries after that sequence.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backup::rotate_bak_path;
use crate::migration::{MigrationError, MigrationRegistry};
use crate::state::MaterializedState;

pub const CURRENT_SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("migration error: {0}")]
    Migration(#[from] MigrationError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "v")]
    pub version: u32,
    pub seq: u64,
    pub state: MaterializedState,
    pub created_at: DateTime<Utc>,
}

/// zstd level used for snapshot compression: fast, not maximal — snapshots
/// are written far more often than they're shipped anywhere.
const ZSTD_LEVEL: i32 = 3;

impl Snapshot {
    pub fn new(seq: u64, state: MaterializedState, created_at: DateTime<Utc>) -> Self {
        Self { version: CURRENT_SNAPSHOT_VERSION, seq, state, created_at }
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let path = path.as_ref();
        let json = serde_json::to_vec(self)?;
        let compressed = zstd::encode_all(&json[..], ZSTD_LEVEL)?;
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, &compressed)?;
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Load a snapshot from `path`, migrating its schema version forward
    /// if needed. On zstd or JSON corruption the file is rotated to `.bak`
    /// and `Ok(None)` returned so the caller falls back to an empty state
    /// plus a full WAL replay.
    pub fn load(
        path: impl AsRef<Path>,
        registry: &MigrationRegistry,
    ) -> Result<Option<Self>, SnapshotError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }
        let compressed = fs::read(path)?;
        let bytes = match zstd::decode_all(&compressed[..]) {
            Ok(b) => b,
            Err(_) => {
                let bak = rotate_bak_path(path);
                tracing::warn!(path = %path.display(), bak = %bak.display(), "snapshot failed to decompress, rotating to backup");
                let _ = fs::rename(path, bak);
                return Ok(None);
            }
        };
        let parsed: Result<serde_json::Value, _> = serde_json::from_slice(&bytes);
        let value = match parsed {
            Ok(v) => v,
            Err(_) => {
                let bak = rotate_bak_path(path);
                tracing::warn!(path = %path.display(), bak = %bak.display(), "snapshot JSON corrupt, rotating to backup");
                let _ = fs::rename(path, bak);
                return Ok(None);
            }
        };
        let migrated = registry.migrate_to(value, CURRENT_SNAPSHOT_VERSION)?;
        Ok(Some(serde_json::from_value(migrated)?))
    }
}
