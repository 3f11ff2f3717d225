// SPDX-License-Identifier: MIT

//! Dormant-dependent activation: a scoped service bound to one running
//! execution, letting that execution's workflow steps activate declared
//! dormant children without touching the store directly.
//!
//! The active context is carried via a `tokio::task_local!` scoped around
//! the executor's call into the user workflow, the same shape the
//! reference workunit-store context propagation in the wider Rust
//! ecosystem uses for implicit per-task state.

use std::sync::Arc;

use parking_lot::Mutex;
use sched_core::manifest::ManifestId;
use sched_core::work_queue::{WorkQueueEntry, WorkQueueStatus};
use sched_core::{DormantActivationError, Event, SchedulerError};
use sched_store::Store;

use crate::error::EngineResult;

/// One `(external_id, runtime_input)` pair to activate.
pub struct ActivationRequest {
    pub child_external_id: String,
    pub runtime_input: serde_json::Value,
}

/// Scoped per-execution activator: knows which manifest is "currently
/// running" so it can enforce the parent/child preconditions. Kept clock-
/// free (the executor passes `now` in) so it's a concrete type suitable
/// for the `tokio::task_local!` below.
#[derive(Clone)]
pub struct Activator {
    store: Arc<Mutex<Store>>,
    parent_manifest_id: ManifestId,
    dependent_priority_boost: i32,
}

impl Activator {
    pub fn new(store: Arc<Mutex<Store>>, parent_manifest_id: ManifestId, dependent_priority_boost: i32) -> Self {
        Self { store, parent_manifest_id, dependent_priority_boost }
    }

    pub fn activate(&self, child_external_id: &str, runtime_input: serde_json::Value, now: u64) -> EngineResult<()> {
        self.activate_many(
            vec![ActivationRequest { child_external_id: child_external_id.to_string(), runtime_input }],
            now,
        )
    }

    /// Validates every request before writing any queue entry, so a
    /// precondition failure midway never leaves a partial batch.
    pub fn activate_many(&self, requests: Vec<ActivationRequest>, now: u64) -> EngineResult<()> {
        let mut store = self.store.lock();

        let mut planned = Vec::with_capacity(requests.len());
        for request in requests {
            let manifest = store
                .state()
                .find_manifest_by_external_id(&request.child_external_id)
                .cloned()
                .ok_or(DormantActivationError::UnknownManifest)
                .map_err(SchedulerError::InvalidDormantActivation)?;

            if manifest.schedule_type != sched_core::ScheduleType::DormantDependent {
                return Err(SchedulerError::InvalidDormantActivation(DormantActivationError::NotDormant).into());
            }
            if manifest.depends_on_manifest_id != Some(self.parent_manifest_id) {
                return Err(SchedulerError::InvalidDormantActivation(DormantActivationError::NotChildOfParent).into());
            }
            planned.push((manifest, request.runtime_input));
        }

        for (manifest, runtime_input) in planned {
            let already_pending = store
                .state()
                .work_queue
                .values()
                .any(|e| e.manifest_id == Some(manifest.id) && e.status == WorkQueueStatus::Queued);
            if already_pending {
                store.append(Event::DormantSkippedIdempotent { child_manifest_id: manifest.id })?;
                continue;
            }

            let group_priority =
                store.state().manifest_groups.get(&manifest.manifest_group_id).map(|g| g.priority).unwrap_or(0);
            let entry = WorkQueueEntry::new_queued(
                Some(manifest.id),
                manifest.workflow_name.clone(),
                manifest.input_type_name.clone(),
                runtime_input,
                group_priority + self.dependent_priority_boost,
                now,
            );
            store.append(Event::DormantActivated {
                entry,
                child_manifest_id: manifest.id,
                parent_manifest_id: self.parent_manifest_id,
            })?;
        }

        Ok(())
    }
}

tokio::task_local! {
    /// Bound by the executor around the user workflow's invocation (step 4
    /// of the executor chain); absent otherwise.
    pub static CURRENT_ACTIVATOR: Activator;
}

/// `NotInExecution` if called outside the scope the executor establishes.
pub fn current() -> Result<Activator, DormantActivationError> {
    CURRENT_ACTIVATOR.try_with(|a| a.clone()).map_err(|_| DormantActivationError::NotInExecution)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sched_core::manifest::ManifestBuilder;
    use sched_store::MigrationRegistry;
    use std::time::Duration;

    fn dormant_err(e: crate::error::EngineError) -> DormantActivationError {
        match e {
            crate::error::EngineError::Scheduler(SchedulerError::InvalidDormantActivation(d)) => d,
            other => panic!("expected a dormant activation error, got {other:?}"),
        }
    }

    fn store() -> (tempfile::TempDir, Arc<Mutex<Store>>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path(), &MigrationRegistry::new()).unwrap();
        (dir, Arc::new(Mutex::new(store)))
    }

    #[test]
    fn activates_a_declared_dormant_child() {
        let (_dir, store) = store();
        let parent = ManifestBuilder::new("parent").interval(Duration::from_secs(60)).build();
        let parent_id = parent.id;
        let child = ManifestBuilder::new("child").dormant_dependent_on(parent_id).build();
        let child_id = child.id;
        store.lock().append(Event::ManifestUpserted { manifest: parent }).unwrap();
        store.lock().append(Event::ManifestUpserted { manifest: child }).unwrap();

        let activator = Activator::new(Arc::clone(&store), parent_id, 0);
        activator.activate("child", serde_json::json!({"x": 1}), 1_000).unwrap();

        assert!(store
            .lock()
            .state()
            .work_queue
            .values()
            .any(|e| e.manifest_id == Some(child_id) && e.status == WorkQueueStatus::Queued));
    }

    #[test]
    fn rejects_a_manifest_that_is_not_dormant() {
        let (_dir, store) = store();
        let parent = ManifestBuilder::new("parent").interval(Duration::from_secs(60)).build();
        let parent_id = parent.id;
        let non_dormant = ManifestBuilder::new("scheduled-child").interval(Duration::from_secs(60)).build();
        store.lock().append(Event::ManifestUpserted { manifest: parent }).unwrap();
        store.lock().append(Event::ManifestUpserted { manifest: non_dormant }).unwrap();

        let activator = Activator::new(store, parent_id, 0);
        let err = activator.activate("scheduled-child", serde_json::Value::Null, 1_000).unwrap_err();
        assert_eq!(dormant_err(err), DormantActivationError::NotDormant);
    }

    #[test]
    fn rejects_activation_by_a_manifest_that_is_not_the_declared_parent() {
        let (_dir, store) = store();
        let real_parent = ManifestBuilder::new("real-parent").interval(Duration::from_secs(60)).build();
        let real_parent_id = real_parent.id;
        let impostor_id = ManifestId::new();
        let child = ManifestBuilder::new("child").dormant_dependent_on(real_parent_id).build();
        store.lock().append(Event::ManifestUpserted { manifest: real_parent }).unwrap();
        store.lock().append(Event::ManifestUpserted { manifest: child }).unwrap();

        let activator = Activator::new(store, impostor_id, 0);
        let err = activator.activate("child", serde_json::Value::Null, 1_000).unwrap_err();
        assert_eq!(dormant_err(err), DormantActivationError::NotChildOfParent);
    }

    #[test]
    fn unknown_child_external_id_is_an_error() {
        let (_dir, store) = store();
        let activator = Activator::new(store, ManifestId::new(), 0);
        let err = activator.activate("missing", serde_json::Value::Null, 1_000).unwrap_err();
        assert_eq!(dormant_err(err), DormantActivationError::UnknownManifest);
    }

    #[test]
    fn activation_is_idempotent_when_child_already_has_queued_work() {
        let (_dir, store) = store();
        let parent = ManifestBuilder::new("parent").interval(Duration::from_secs(60)).build();
        let parent_id = parent.id;
        let child = ManifestBuilder::new("child").dormant_dependent_on(parent_id).build();
        let child_id = child.id;
        store.lock().append(Event::ManifestUpserted { manifest: parent }).unwrap();
        store.lock().append(Event::ManifestUpserted { manifest: child }).unwrap();

        let activator = Activator::new(Arc::clone(&store), parent_id, 0);
        activator.activate("child", serde_json::Value::Null, 1_000).unwrap();
        activator.activate("child", serde_json::Value::Null, 1_000).unwrap();

        let queued_count =
            store.lock().state().work_queue.values().filter(|e| e.manifest_id == Some(child_id)).count();
        assert_eq!(queued_count, 1);
    }
}
