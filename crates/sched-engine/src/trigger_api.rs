// SPDX-License-Identifier: MIT

//! Trigger API: the external operations exposed to operators and the
//! dashboard — enable, disable, manual trigger, dead-letter resolution,
//! and cooperative cancellation. Every write here goes through the same
//! append-only store the evaluator and dispatcher use; nothing here
//! bypasses the WorkQueue or its capacity limits, which are enforced by
//! the dispatcher on its next tick regardless of who enqueued the entry.

use std::sync::Arc;

use parking_lot::Mutex;
use sched_core::dead_letter::DeadLetterId;
use sched_core::execution::{ExecutionId, WorkflowState};
use sched_core::manifest::{Manifest, ManifestId};
use sched_core::work_queue::{WorkQueueEntry, WorkQueueStatus};
use sched_core::{Clock, Event, SchedulerError};
use sched_store::Store;
use thiserror::Error;

use crate::error::EngineResult;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum TriggerError {
    #[error("unknown manifest: {0}")]
    UnknownManifest(ManifestId),
    #[error("unknown dead letter: {0}")]
    UnknownDeadLetter(DeadLetterId),
    #[error("dead letter {0} is already resolved")]
    DeadLetterNotOpen(DeadLetterId),
    #[error("unknown execution: {0}")]
    UnknownExecution(ExecutionId),
    #[error("execution {0} has already reached a terminal state")]
    ExecutionAlreadyTerminal(ExecutionId),
}

/// Whether a manual trigger actually queued work or was absorbed because
/// the manifest already had pending work (the same uniqueness the
/// evaluator's own enqueue step honors).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    Queued(sched_core::work_queue::WorkQueueId),
    AlreadyQueued,
}

pub struct TriggerApi<C> {
    store: Arc<Mutex<Store>>,
    clock: C,
}

impl<C: Clock> TriggerApi<C> {
    pub fn new(store: Arc<Mutex<Store>>, clock: C) -> Self {
        Self { store, clock }
    }

    pub fn enable(&self, external_id: &str) -> EngineResult<()> {
        let mut store = self.store.lock();
        let manifest_id = resolve_manifest(&store, external_id)?.id;
        store.append(Event::ManifestEnabled { manifest_id })?;
        Ok(())
    }

    pub fn disable(&self, external_id: &str) -> EngineResult<()> {
        let mut store = self.store.lock();
        let manifest_id = resolve_manifest(&store, external_id)?.id;
        store.append(Event::ManifestDisabled { manifest_id })?;
        Ok(())
    }

    /// Manual trigger: queues work for a manifest outside its schedule.
    /// Priority is copied straight from the manifest, not derived from its
    /// group or boosted for being a dependent — an operator's trigger is
    /// not the evaluator's scheduled enqueue.
    pub fn trigger(
        &self,
        external_id: &str,
        input_override: Option<serde_json::Value>,
    ) -> EngineResult<TriggerOutcome> {
        let now = self.clock.epoch_ms();
        let mut store = self.store.lock();

        let manifest = resolve_manifest(&store, external_id)?;
        let manifest_id = manifest.id;

        let already_queued = store
            .state()
            .work_queue
            .values()
            .any(|e| e.manifest_id == Some(manifest_id) && e.status == WorkQueueStatus::Queued);
        if already_queued {
            store.append(Event::WorkDuplicateAbsorbed { manifest_id })?;
            return Ok(TriggerOutcome::AlreadyQueued);
        }

        let entry = WorkQueueEntry::new_queued(
            Some(manifest_id),
            manifest.workflow_name,
            manifest.input_type_name,
            input_override.unwrap_or(manifest.input_properties),
            manifest.priority,
            now,
        );
        let entry_id = entry.id;
        store.append(Event::WorkQueued { entry })?;
        Ok(TriggerOutcome::Queued(entry_id))
    }

    /// Re-queues the dead-lettered manifest's work and marks the dead
    /// letter `retried`. The execution id recorded on the dead letter is a
    /// fresh correlation token — the queue entry itself gets a real
    /// execution id only once the dispatcher picks it up.
    pub fn retry_dead_letter(&self, dead_letter_id: DeadLetterId) -> EngineResult<ExecutionId> {
        let now = self.clock.epoch_ms();
        let mut store = self.store.lock();

        let dead_letter = store
            .state()
            .dead_letters
            .get(&dead_letter_id)
            .cloned()
            .ok_or(TriggerError::UnknownDeadLetter(dead_letter_id))?;
        if !dead_letter.is_open() {
            return Err(TriggerError::DeadLetterNotOpen(dead_letter_id).into());
        }

        let manifest = store
            .state()
            .manifests
            .get(&dead_letter.manifest_id)
            .cloned()
            .ok_or(TriggerError::UnknownManifest(dead_letter.manifest_id))?;

        let already_queued = store
            .state()
            .work_queue
            .values()
            .any(|e| e.manifest_id == Some(manifest.id) && e.status == WorkQueueStatus::Queued);
        if !already_queued {
            let entry = WorkQueueEntry::new_queued(
                Some(manifest.id),
                manifest.workflow_name,
                manifest.input_type_name,
                manifest.input_properties,
                manifest.priority,
                now,
            );
            store.append(Event::WorkQueued { entry })?;
        }

        let retry_execution_id = ExecutionId::new();
        store.append(Event::DeadLetterRetried {
            dead_letter_id,
            retry_metadata_id: retry_execution_id,
            resolved_at_ms: now,
        })?;
        Ok(retry_execution_id)
    }

    pub fn acknowledge_dead_letter(
        &self,
        dead_letter_id: DeadLetterId,
        note: Option<String>,
    ) -> EngineResult<()> {
        let now = self.clock.epoch_ms();
        let mut store = self.store.lock();

        let dead_letter = store
            .state()
            .dead_letters
            .get(&dead_letter_id)
            .cloned()
            .ok_or(TriggerError::UnknownDeadLetter(dead_letter_id))?;
        if !dead_letter.is_open() {
            return Err(TriggerError::DeadLetterNotOpen(dead_letter_id).into());
        }

        store.append(Event::DeadLetterAcknowledged {
            dead_letter_id,
            resolution_note: note,
            resolved_at_ms: now,
        })?;
        Ok(())
    }

    /// Sets the cooperative cancellation flag. The executor polls it at
    /// step boundaries — this never forcibly aborts a running step.
    pub fn request_cancel(&self, execution_id: ExecutionId) -> EngineResult<()> {
        let mut store = self.store.lock();
        let metadata = store
            .state()
            .executions
            .get(&execution_id)
            .cloned()
            .ok_or(TriggerError::UnknownExecution(execution_id))?;
        if metadata.is_terminal() {
            return Err(TriggerError::ExecutionAlreadyTerminal(execution_id).into());
        }
        store.append(Event::ExecutionCancelRequested { metadata_id: execution_id })?;
        Ok(())
    }
}

fn resolve_manifest(store: &Store, external_id: &str) -> Result<Manifest, SchedulerError> {
    store
        .state()
        .find_manifest_by_external_id(external_id)
        .cloned()
        .ok_or_else(|| SchedulerError::UnknownManifest(external_id.to_string()))
}
