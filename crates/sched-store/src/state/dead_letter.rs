// SPDX-License-Identifier: MIT

//! Dead-letter event handlers.

use sched_core::dead_letter::DeadLetterStatus;
use sched_core::Event;

use super::MaterializedState;

pub(crate) fn apply(state: &mut MaterializedState, event: &Event) {
    match event {
        Event::DeadLetterCreated { dead_letter } => {
            state.dead_letters.entry(dead_letter.id).or_insert_with(|| dead_letter.clone());
        }

        Event::DeadLetterRetried { dead_letter_id, retry_metadata_id, resolved_at_ms } => {
            if let Some(dl) = state.dead_letters.get_mut(dead_letter_id) {
                if dl.is_open() {
                    dl.retry(*retry_metadata_id, *resolved_at_ms);
                }
            }
        }

        Event::DeadLetterAcknowledged { dead_letter_id, resolution_note, resolved_at_ms } => {
            if let Some(dl) = state.dead_letters.get_mut(dead_letter_id) {
                if dl.is_open() {
                    dl.acknowledge(resolution_note.clone(), *resolved_at_ms);
                }
            }
        }

        _ => unreachable!("not a dead-letter event"),
    }
}
