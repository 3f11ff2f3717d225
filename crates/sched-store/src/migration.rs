// SPDX-License-Identifier: MIT

//! Snapshot schema migrations.
//!
//! A [`Snapshot`](crate::snapshot::Snapshot) is tagged with the schema
//! version it was written under. `MigrationRegistry` walks a chain of
//! single-version-step migrations to bring an old snapshot's JSON forward
//! to the version the running binary expects.

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MigrationError {
    #[error("snapshot version {0} is newer than the current schema version {1}")]
    TooNew(u32, u32),
    #[error("no migration path from version {0} to {1}")]
    NoPath(u32, u32),
}

/// A single schema version step.
pub trait Migration {
    fn source_version(&self) -> u32;
    fn target_version(&self) -> u32;
    fn migrate(&self, snapshot: &mut Value) -> Result<(), MigrationError>;
}

#[derive(Default)]
pub struct MigrationRegistry {
    pub(crate) migrations: Vec<Box<dyn Migration>>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self { migrations: Vec::new() }
    }

    /// Migrate `snapshot` (expected to carry a `"v"` field) forward to
    /// `target_version`, applying registered migrations one version step
    /// at a time.
    pub fn migrate_to(&self, mut snapshot: Value, target_version: u32) -> Result<Value, MigrationError> {
        let mut current_version = snapshot["v"].as_u64().unwrap_or(0) as u32;

        if current_version > target_version {
            return Err(MigrationError::TooNew(current_version, target_version));
        }

        while current_version < target_version {
            let step = self
                .migrations
                .iter()
                .find(|m| m.source_version() == current_version)
                .ok_or(MigrationError::NoPath(current_version, target_version))?;
            step.migrate(&mut snapshot)?;
            current_version = step.target_version();
            snapshot["v"] = current_version.into();
        }

        Ok(snapshot)
    }
}

#[cfg(test)]
#[path = "migration_tests.rs"]
mod tests;
