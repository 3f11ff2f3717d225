// SPDX-License-Identifier: MIT

use sched_core::dead_letter::{DeadLetter, DeadLetterStatus};
use sched_core::execution::{ExecutionId, ExecutionMetadata, WorkflowState};
use sched_core::manifest::{Manifest, ManifestBuilder, ManifestId};
use sched_core::manifest_group::ManifestGroup;
use sched_core::work_queue::{WorkQueueEntry, WorkQueueStatus};
use sched_core::Event;

use super::*;

fn manifest() -> Manifest {
    ManifestBuilder::new("extract-0").build()
}

#[test]
fn apply_event_routes_manifest_variants() {
    let mut state = MaterializedState::default();
    let m = manifest();
    state.apply_event(&Event::ManifestUpserted { manifest: m.clone() });
    assert!(state.manifests.contains_key(&m.id));

    state.apply_event(&Event::ManifestDisabled { manifest_id: m.id });
    assert!(!state.manifests[&m.id].is_enabled);
}

#[test]
fn apply_event_routes_group_upsert() {
    let mut state = MaterializedState::default();
    let group = ManifestGroup::new("etl");
    state.apply_event(&Event::ManifestGroupUpserted { group: group.clone() });
    assert!(state.manifest_groups.contains_key(&group.id));
}

#[test]
fn apply_event_routes_queue_lifecycle() {
    let mut state = MaterializedState::default();
    let m = manifest();
    state.apply_event(&Event::ManifestUpserted { manifest: m.clone() });

    let entry = WorkQueueEntry::new_queued(Some(m.id), "wf", "Input", serde_json::json!({}), 0, 0);
    state.apply_event(&Event::WorkQueued { entry: entry.clone() });
    assert_eq!(state.work_queue[&entry.id].status, WorkQueueStatus::Queued);

    let metadata_id = ExecutionId::new();
    state.apply_event(&Event::WorkDispatched {
        work_queue_id: entry.id,
        metadata_id,
        dispatched_at_ms: 5,
    });
    assert_eq!(state.work_queue[&entry.id].status, WorkQueueStatus::Dispatched);
}

#[test]
fn apply_event_routes_execution_lifecycle() {
    let mut state = MaterializedState::default();
    let metadata = ExecutionMetadata::new_pending("wf", None, None, 0);
    state.apply_event(&Event::ExecutionStarted { metadata: metadata.clone() });
    assert_eq!(state.executions[&metadata.id].workflow_state, WorkflowState::Pending);

    state.apply_event(&Event::ExecutionFailed {
        metadata_id: metadata.id,
        end_time_ms: 10,
        step: Some("fetch".into()),
        exception: "TimeoutException".into(),
        reason: "timed out".into(),
        stack_trace: None,
    });
    assert_eq!(state.executions[&metadata.id].workflow_state, WorkflowState::Failed);
}

#[test]
fn apply_event_routes_dead_letter_lifecycle() {
    let mut state = MaterializedState::default();
    let dl = DeadLetter::new(ManifestId::new(), "max retries exceeded", 3, 0);
    state.apply_event(&Event::DeadLetterCreated { dead_letter: dl.clone() });
    assert!(state.dead_letters[&dl.id].is_open());

    state.apply_event(&Event::DeadLetterAcknowledged {
        dead_letter_id: dl.id,
        resolution_note: None,
        resolved_at_ms: 20,
    });
    assert_eq!(state.dead_letters[&dl.id].status, DeadLetterStatus::Acknowledged);
}

#[test]
fn apply_event_routes_dormant_activation() {
    let mut state = MaterializedState::default();
    let child = ManifestId::new();
    let entry = WorkQueueEntry::new_queued(Some(child), "wf", "Input", serde_json::json!({}), 0, 0);
    state.apply_event(&Event::DormantActivated {
        entry: entry.clone(),
        child_manifest_id: child,
        parent_manifest_id: ManifestId::new(),
    });
    assert!(state.work_queue.contains_key(&entry.id));
}

#[test]
fn find_manifest_by_external_id_looks_up_across_the_whole_table() {
    let mut state = MaterializedState::default();
    let m = manifest();
    state.apply_event(&Event::ManifestUpserted { manifest: m.clone() });
    let found = state.find_manifest_by_external_id(&m.external_id).unwrap();
    assert_eq!(found.id, m.id);
    assert!(state.find_manifest_by_external_id("does-not-exist").is_none());
}

#[test]
fn full_happy_path_replay_rebuilds_consistent_state() {
    let mut state = MaterializedState::default();
    let m = manifest();
    state.apply_event(&Event::ManifestUpserted { manifest: m.clone() });

    let entry = WorkQueueEntry::new_queued(Some(m.id), "wf", "Input", serde_json::json!({}), 0, 0);
    state.apply_event(&Event::WorkQueued { entry: entry.clone() });

    let metadata = ExecutionMetadata::new_pending("wf", Some(m.id), None, 0);
    state.apply_event(&Event::WorkDispatched {
        work_queue_id: entry.id,
        metadata_id: metadata.id,
        dispatched_at_ms: 0,
    });
    state.apply_event(&Event::ExecutionStarted { metadata: metadata.clone() });
    state.apply_event(&Event::ExecutionCompleted {
        metadata_id: metadata.id,
        end_time_ms: 5,
        output: serde_json::json!({"rows": 10}),
    });

    assert_eq!(state.work_queue[&entry.id].status, WorkQueueStatus::Dispatched);
    assert_eq!(state.executions[&metadata.id].workflow_state, WorkflowState::Completed);
}
