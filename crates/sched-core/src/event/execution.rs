// SPDX-License-Identifier: MIT

//! Execution event helpers

use super::Event;

pub(super) fn log_summary(event: &Event) -> String {
    match event {
        Event::ExecutionStarted { metadata } => format!("execution started id={}", metadata.id),
        Event::ExecutionInProgress { metadata_id } => format!("execution in_progress id={metadata_id}"),
        Event::ExecutionCompleted { metadata_id, .. } => {
            format!("execution completed id={metadata_id}")
        }
        Event::ExecutionFailed { metadata_id, reason, .. } => {
            format!("execution failed id={metadata_id} reason={reason}")
        }
        Event::ExecutionCancelRequested { metadata_id } => {
            format!("execution cancel requested id={metadata_id}")
        }
        _ => unreachable!("not an execution event"),
    }
}
