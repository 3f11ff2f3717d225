// SPDX-License-Identifier: MIT

//! Dormant-dependent activation event helpers

use super::Event;

pub(super) fn log_summary(event: &Event) -> String {
    match event {
        Event::DormantActivated { entry, child_manifest_id, parent_manifest_id } => {
            format!(
                "dormant activated queue_id={} child={child_manifest_id} parent={parent_manifest_id}",
                entry.id
            )
        }
        Event::DormantSkippedIdempotent { child_manifest_id } => {
            format!("dormant activation skipped (already pending) child={child_manifest_id}")
        }
        _ => unreachable!("not a dormant event"),
    }
}
