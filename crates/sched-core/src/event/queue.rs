// SPDX-License-Identifier: MIT

//! WorkQueue event helpers

use super::Event;

pub(super) fn log_summary(event: &Event) -> String {
    match event {
        Event::WorkQueued { entry } => format!(
            "queued id={} manifest={} priority={}",
            entry.id,
            entry.manifest_id.map(|m| m.to_string()).unwrap_or_else(|| "ad-hoc".into()),
            entry.priority
        ),
        Event::WorkDispatched { work_queue_id, metadata_id, .. } => {
            format!("dispatched id={work_queue_id} execution={metadata_id}")
        }
        Event::WorkCancelled { work_queue_id } => format!("cancelled id={work_queue_id}"),
        Event::WorkDuplicateAbsorbed { manifest_id } => {
            format!("duplicate queue insert absorbed manifest={manifest_id}")
        }
        _ => unreachable!("not a queue event"),
    }
}
