// SPDX-License-Identifier: MIT

//! Audit events backing the `log` table, indexed by `metadata_id`.
//!
//! Every state transition the scheduler core makes is also emitted as an
//! `Event`; the in-process store appends these to its WAL and replays them
//! to derive materialized state, an event-sourcing split between `Event`
//! (facts) and `MaterializedState` (derived).

mod dead_letter;
mod dormant;
mod execution;
mod manifest;
mod queue;

use serde::{Deserialize, Serialize};

use crate::dead_letter::{DeadLetter, DeadLetterId};
use crate::execution::{ExecutionId, ExecutionMetadata};
use crate::manifest::{Manifest, ManifestId};
use crate::manifest_group::{ManifestGroup, ManifestGroupId};
use crate::work_queue::{WorkQueueEntry, WorkQueueId};

/// Events that trigger materialized-state transitions.
///
/// Carries enough data to rebuild state by replay alone: a variant whose
/// effect is a fresh row embeds the whole row rather than just its id, the
/// same way a `Manifest` or `ExecutionMetadata` is a complete record
/// rather than a delta.
///
/// Serializes with `{"type": "domain:action", ...fields}`, matching the
/// wire contract's enum-as-string convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // -- manifest --
    #[serde(rename = "manifest:upserted")]
    ManifestUpserted { manifest: Manifest },
    #[serde(rename = "manifest:enabled")]
    ManifestEnabled { manifest_id: ManifestId },
    #[serde(rename = "manifest:disabled")]
    ManifestDisabled { manifest_id: ManifestId },
    #[serde(rename = "manifest:pruned")]
    ManifestPruned { manifest_id: ManifestId, external_id: String },
    #[serde(rename = "manifest:group_upserted")]
    ManifestGroupUpserted { group: ManifestGroup },
    #[serde(rename = "manifest:ran_successfully")]
    ManifestRanSuccessfully { manifest_id: ManifestId, at_ms: u64 },

    // -- work queue --
    #[serde(rename = "queue:queued")]
    WorkQueued { entry: WorkQueueEntry },
    #[serde(rename = "queue:dispatched")]
    WorkDispatched { work_queue_id: WorkQueueId, metadata_id: ExecutionId, dispatched_at_ms: u64 },
    #[serde(rename = "queue:cancelled")]
    WorkCancelled { work_queue_id: WorkQueueId },
    #[serde(rename = "queue:duplicate_absorbed")]
    WorkDuplicateAbsorbed { manifest_id: ManifestId },

    // -- execution --
    #[serde(rename = "execution:started")]
    ExecutionStarted { metadata: ExecutionMetadata },
    #[serde(rename = "execution:in_progress")]
    ExecutionInProgress { metadata_id: ExecutionId },
    #[serde(rename = "execution:completed")]
    ExecutionCompleted { metadata_id: ExecutionId, end_time_ms: u64, output: serde_json::Value },
    #[serde(rename = "execution:failed")]
    ExecutionFailed {
        metadata_id: ExecutionId,
        end_time_ms: u64,
        step: Option<String>,
        exception: String,
        reason: String,
        stack_trace: Option<String>,
    },
    #[serde(rename = "execution:cancel_requested")]
    ExecutionCancelRequested { metadata_id: ExecutionId },

    // -- dead letter --
    #[serde(rename = "dead_letter:created")]
    DeadLetterCreated { dead_letter: DeadLetter },
    #[serde(rename = "dead_letter:retried")]
    DeadLetterRetried { dead_letter_id: DeadLetterId, retry_metadata_id: ExecutionId, resolved_at_ms: u64 },
    #[serde(rename = "dead_letter:acknowledged")]
    DeadLetterAcknowledged {
        dead_letter_id: DeadLetterId,
        resolution_note: Option<String>,
        resolved_at_ms: u64,
    },

    // -- dormant activation --
    #[serde(rename = "dormant:activated")]
    DormantActivated {
        entry: WorkQueueEntry,
        child_manifest_id: ManifestId,
        parent_manifest_id: ManifestId,
    },
    #[serde(rename = "dormant:skipped_idempotent")]
    DormantSkippedIdempotent { child_manifest_id: ManifestId },
}

impl Event {
    /// One-line human-readable summary for structured tracing fields.
    pub fn log_summary(&self) -> String {
        match self {
            Event::ManifestUpserted { .. }
            | Event::ManifestEnabled { .. }
            | Event::ManifestDisabled { .. }
            | Event::ManifestPruned { .. }
            | Event::ManifestGroupUpserted { .. }
            | Event::ManifestRanSuccessfully { .. } => manifest::log_summary(self),

            Event::WorkQueued { .. }
            | Event::WorkDispatched { .. }
            | Event::WorkCancelled { .. }
            | Event::WorkDuplicateAbsorbed { .. } => queue::log_summary(self),

            Event::ExecutionStarted { .. }
            | Event::ExecutionInProgress { .. }
            | Event::ExecutionCompleted { .. }
            | Event::ExecutionFailed { .. }
            | Event::ExecutionCancelRequested { .. } => execution::log_summary(self),

            Event::DeadLetterCreated { .. }
            | Event::DeadLetterRetried { .. }
            | Event::DeadLetterAcknowledged { .. } => dead_letter::log_summary(self),

            Event::DormantActivated { .. } | Event::DormantSkippedIdempotent { .. } => {
                dormant::log_summary(self)
            }
        }
    }
}
