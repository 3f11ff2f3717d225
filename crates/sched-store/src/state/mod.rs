// SPDX-License-Identifier: MIT

//! Materialized state derived by replaying [`Event`]s.

mod dead_letter;
mod dormant;
mod execution;
mod manifest;
mod queue;

use std::collections::HashMap;

use sched_core::dead_letter::{DeadLetter, DeadLetterId};
use sched_core::execution::{ExecutionId, ExecutionMetadata};
use sched_core::manifest::{Manifest, ManifestId};
use sched_core::manifest_group::{ManifestGroup, ManifestGroupId};
use sched_core::work_queue::{WorkQueueEntry, WorkQueueId};
use sched_core::Event;
use serde::{Deserialize, Serialize};

/// Materialized state built from WAL replay.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MaterializedState {
    pub manifests: HashMap<ManifestId, Manifest>,
    pub manifest_groups: HashMap<ManifestGroupId, ManifestGroup>,
    pub work_queue: HashMap<WorkQueueId, WorkQueueEntry>,
    pub executions: HashMap<ExecutionId, ExecutionMetadata>,
    pub dead_letters: HashMap<DeadLetterId, DeadLetter>,
}

impl MaterializedState {
    /// Get a manifest by id or by its caller-supplied `external_id`.
    pub fn find_manifest_by_external_id(&self, external_id: &str) -> Option<&Manifest> {
        self.manifests.values().find(|m| m.external_id == external_id)
    }

    /// Apply an event to derive state changes.
    ///
    /// All handlers must be idempotent: replaying the same event twice
    /// (after a crash mid-flush, say) must leave state unchanged the
    /// second time. Handlers favor assignment over mutation and guard
    /// counter increments with a status check for that reason.
    pub fn apply_event(&mut self, event: &Event) {
        match event {
            Event::ManifestUpserted { .. }
            | Event::ManifestEnabled { .. }
            | Event::ManifestDisabled { .. }
            | Event::ManifestPruned { .. }
            | Event::ManifestGroupUpserted { .. }
            | Event::ManifestRanSuccessfully { .. } => manifest::apply(self, event),

            Event::WorkQueued { .. }
            | Event::WorkDispatched { .. }
            | Event::WorkCancelled { .. }
            | Event::WorkDuplicateAbsorbed { .. } => queue::apply(self, event),

            Event::ExecutionStarted { .. }
            | Event::ExecutionInProgress { .. }
            | Event::ExecutionCompleted { .. }
            | Event::ExecutionFailed { .. }
            | Event::ExecutionCancelRequested { .. } => execution::apply(self, event),

            Event::DeadLetterCreated { .. }
            | Event::DeadLetterRetried { .. }
            | Event::DeadLetterAcknowledged { .. } => dead_letter::apply(self, event),

            Event::DormantActivated { .. } | Event::DormantSkippedIdempotent { .. } => {
                dormant::apply(self, event)
            }
        }
    }
}

#[cfg(test)]
#[path = "../state_tests/mod.rs"]
mod tests;
