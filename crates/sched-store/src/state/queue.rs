// SPDX-License-Identifier: MIT

//! Work queue event handlers.

use sched_core::work_queue::WorkQueueStatus;
use sched_core::Event;

use super::MaterializedState;

pub(crate) fn apply(state: &mut MaterializedState, event: &Event) {
    match event {
        Event::WorkQueued { entry } => {
            state.work_queue.entry(entry.id).or_insert_with(|| entry.clone());
        }

        Event::WorkDispatched { work_queue_id, metadata_id, dispatched_at_ms } => {
            if let Some(entry) = state.work_queue.get_mut(work_queue_id) {
                if entry.status == WorkQueueStatus::Queued {
                    entry.mark_dispatched(*metadata_id, *dispatched_at_ms);
                }
            }
        }

        Event::WorkCancelled { work_queue_id } => {
            if let Some(entry) = state.work_queue.get_mut(work_queue_id) {
                entry.status = WorkQueueStatus::Cancelled;
            }
        }

        Event::WorkDuplicateAbsorbed { .. } => {}

        _ => unreachable!("not a queue event"),
    }
}
