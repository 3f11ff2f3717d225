// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Durable, event-sourced persistence for the scheduler: a write-ahead log
//! of [`sched_core::Event`]s, periodic snapshots of the derived
//! [`MaterializedState`], and a [`Store`] that ties the two together with
//! crash-safe recovery.

mod backup;
mod migration;
mod snapshot;
mod state;
mod store;
mod wal;

pub use migration::{Migration, MigrationError, MigrationRegistry};
pub use snapshot::{Snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
pub use state::MaterializedState;
pub use store::{Store, StoreError};
pub use wal::{Wal, WalEntry, WalError};
