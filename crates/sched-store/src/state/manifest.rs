// SPDX-License-Identifier: MIT

//! Manifest/group event handlers.

use sched_core::Event;

use super::MaterializedState;

pub(crate) fn apply(state: &mut MaterializedState, event: &Event) {
    match event {
        Event::ManifestUpserted { manifest } => {
            state.manifests.insert(manifest.id, manifest.clone());
        }

        Event::ManifestEnabled { manifest_id } => {
            if let Some(m) = state.manifests.get_mut(manifest_id) {
                m.is_enabled = true;
            }
        }

        Event::ManifestDisabled { manifest_id } => {
            if let Some(m) = state.manifests.get_mut(manifest_id) {
                m.is_enabled = false;
            }
        }

        Event::ManifestPruned { manifest_id, .. } => {
            state.manifests.remove(manifest_id);
            state.dead_letters.retain(|_, dl| dl.manifest_id != *manifest_id);
            state.executions.retain(|_, e| e.manifest_id != Some(*manifest_id));
            state.work_queue.retain(|_, e| e.manifest_id != Some(*manifest_id));
        }

        Event::ManifestGroupUpserted { group } => {
            state.manifest_groups.insert(group.id, group.clone());
        }

        Event::ManifestRanSuccessfully { manifest_id, at_ms } => {
            if let Some(m) = state.manifests.get_mut(manifest_id) {
                m.last_successful_run = Some(*at_ms);
            }
        }

        _ => unreachable!("not a manifest event"),
    }
}

#[cfg(test)]
mod tests {
    use sched_core::manifest::ManifestBuilder;
    use sched_core::manifest_group::ManifestGroup;

    use super::*;

    #[test]
    fn upsert_then_disable_then_enable_round_trips() {
        let mut state = MaterializedState::default();
        let manifest = ManifestBuilder::new("extract-0").build();
        apply(&mut state, &Event::ManifestUpserted { manifest: manifest.clone() });
        assert!(state.manifests[&manifest.id].is_enabled);

        apply(&mut state, &Event::ManifestDisabled { manifest_id: manifest.id });
        assert!(!state.manifests[&manifest.id].is_enabled);

        apply(&mut state, &Event::ManifestEnabled { manifest_id: manifest.id });
        assert!(state.manifests[&manifest.id].is_enabled);
    }

    #[test]
    fn pruned_removes_the_row() {
        let mut state = MaterializedState::default();
        let manifest = ManifestBuilder::new("extract-0").build();
        apply(&mut state, &Event::ManifestUpserted { manifest: manifest.clone() });
        apply(
            &mut state,
            &Event::ManifestPruned {
                manifest_id: manifest.id,
                external_id: manifest.external_id.clone(),
            },
        );
        assert!(!state.manifests.contains_key(&manifest.id));
    }

    #[test]
    fn pruned_cascades_to_dead_letters_executions_and_work_queue() {
        use sched_core::dead_letter::DeadLetter;
        use sched_core::execution::ExecutionMetadata;
        use sched_core::work_queue::WorkQueueEntry;

        let mut state = MaterializedState::default();
        let manifest = ManifestBuilder::new("extract-0").build();
        apply(&mut state, &Event::ManifestUpserted { manifest: manifest.clone() });

        let dead_letter = DeadLetter::new(manifest.id, "max retries exceeded", 3, 0);
        state.dead_letters.insert(dead_letter.id, dead_letter);
        let mut execution = ExecutionMetadata::new_pending("wf", Some(manifest.id), None, 0);
        execution.manifest_id = Some(manifest.id);
        state.executions.insert(execution.id, execution);
        let entry = WorkQueueEntry::new_queued(
            Some(manifest.id),
            "wf",
            "Input",
            serde_json::json!({}),
            0,
            0,
        );
        state.work_queue.insert(entry.id, entry);

        apply(
            &mut state,
            &Event::ManifestPruned {
                manifest_id: manifest.id,
                external_id: manifest.external_id.clone(),
            },
        );

        assert!(state.dead_letters.values().all(|dl| dl.manifest_id != manifest.id));
        assert!(state.executions.values().all(|e| e.manifest_id != Some(manifest.id)));
        assert!(state.work_queue.values().all(|e| e.manifest_id != Some(manifest.id)));
    }

    #[test]
    fn group_upsert_is_idempotent_on_replay() {
        let mut state = MaterializedState::default();
        let group = ManifestGroup::new("etl");
        apply(&mut state, &Event::ManifestGroupUpserted { group: group.clone() });
        apply(&mut state, &Event::ManifestGroupUpserted { group: group.clone() });
        assert_eq!(state.manifest_groups.len(), 1);
    }

    #[test]
    fn ran_successfully_sets_last_successful_run() {
        let mut state = MaterializedState::default();
        let manifest = ManifestBuilder::new("extract-0").build();
        apply(&mut state, &Event::ManifestUpserted { manifest: manifest.clone() });
        apply(&mut state, &Event::ManifestRanSuccessfully { manifest_id: manifest.id, at_ms: 500 });
        assert_eq!(state.manifests[&manifest.id].last_successful_run, Some(500));
    }
}
