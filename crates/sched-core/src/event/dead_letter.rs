// SPDX-License-Identifier: MIT

//! Dead-letter event helpers

use super::Event;

pub(super) fn log_summary(event: &Event) -> String {
    match event {
        Event::DeadLetterCreated { dead_letter } => format!(
            "dead-lettered id={} manifest={} reason={}",
            dead_letter.id, dead_letter.manifest_id, dead_letter.reason
        ),
        Event::DeadLetterRetried { dead_letter_id, retry_metadata_id, .. } => {
            format!("dead-letter retried id={dead_letter_id} execution={retry_metadata_id}")
        }
        Event::DeadLetterAcknowledged { dead_letter_id, .. } => {
            format!("dead-letter acknowledged id={dead_letter_id}")
        }
        _ => unreachable!("not a dead-letter event"),
    }
}
