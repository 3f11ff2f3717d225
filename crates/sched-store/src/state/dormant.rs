// SPDX-License-Identifier: MIT

//! Dormant-dependent activation event handlers.

use sched_core::Event;

use super::MaterializedState;

pub(crate) fn apply(state: &mut MaterializedState, event: &Event) {
    match event {
        Event::DormantActivated { entry, .. } => {
            state.work_queue.entry(entry.id).or_insert_with(|| entry.clone());
        }

        Event::DormantSkippedIdempotent { .. } => {}

        _ => unreachable!("not a dormant event"),
    }
}

#[cfg(test)]
mod tests {
    use sched_core::manifest::ManifestId;
    use sched_core::work_queue::WorkQueueEntry;

    use super::*;

    #[test]
    fn activation_inserts_the_queue_entry() {
        let mut state = MaterializedState::default();
        let child = ManifestId::new();
        let entry = WorkQueueEntry::new_queued(Some(child), "wf", "Input", serde_json::json!({}), 0, 0);
        apply(
            &mut state,
            &Event::DormantActivated {
                entry: entry.clone(),
                child_manifest_id: child,
                parent_manifest_id: ManifestId::new(),
            },
        );
        assert!(state.work_queue.contains_key(&entry.id));
    }

    #[test]
    fn skipped_idempotent_is_a_noop() {
        let mut state = MaterializedState::default();
        apply(&mut state, &Event::DormantSkippedIdempotent { child_manifest_id: ManifestId::new() });
        assert!(state.work_queue.is_empty());
    }
}
