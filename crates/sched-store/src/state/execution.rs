// SPDX-License-Identifier: MIT

//! Execution event handlers.

use sched_core::execution::WorkflowState;
use sched_core::Event;

use super::MaterializedState;

pub(crate) fn apply(state: &mut MaterializedState, event: &Event) {
    match event {
        Event::ExecutionStarted { metadata } => {
            state.executions.entry(metadata.id).or_insert_with(|| metadata.clone());
        }

        Event::ExecutionInProgress { metadata_id } => {
            if let Some(metadata) = state.executions.get_mut(metadata_id) {
                if metadata.workflow_state == WorkflowState::Pending {
                    metadata.mark_in_progress();
                }
            }
        }

        Event::ExecutionCompleted { metadata_id, end_time_ms, output } => {
            if let Some(metadata) = state.executions.get_mut(metadata_id) {
                if !metadata.is_terminal() {
                    metadata.mark_completed(*end_time_ms, output.clone());
                }
            }
        }

        Event::ExecutionFailed { metadata_id, end_time_ms, step, exception, reason, stack_trace } => {
            if let Some(metadata) = state.executions.get_mut(metadata_id) {
                if !metadata.is_terminal() {
                    metadata.mark_failed(
                        *end_time_ms,
                        step.clone(),
                        exception.clone(),
                        reason.clone(),
                        stack_trace.clone(),
                    );
                }
            }
        }

        Event::ExecutionCancelRequested { metadata_id } => {
            if let Some(metadata) = state.executions.get_mut(metadata_id) {
                metadata.cancel_requested = true;
            }
        }

        _ => unreachable!("not an execution event"),
    }
}

#[cfg(test)]
mod tests {
    use sched_core::execution::ExecutionMetadata;

    use super::*;

    fn pending() -> ExecutionMetadata {
        ExecutionMetadata::new_pending("wf", None, None, 0)
    }

    #[test]
    fn started_then_completed_sets_output() {
        let mut state = MaterializedState::default();
        let metadata = pending();
        apply(&mut state, &Event::ExecutionStarted { metadata: metadata.clone() });
        apply(
            &mut state,
            &Event::ExecutionCompleted {
                metadata_id: metadata.id,
                end_time_ms: 100,
                output: serde_json::json!({"ok": true}),
            },
        );
        let stored = &state.executions[&metadata.id];
        assert_eq!(stored.workflow_state, WorkflowState::Completed);
        assert_eq!(stored.end_time_ms, Some(100));
    }

    #[test]
    fn completed_does_not_regress_on_a_later_failed_replay() {
        let mut state = MaterializedState::default();
        let metadata = pending();
        apply(&mut state, &Event::ExecutionStarted { metadata: metadata.clone() });
        apply(
            &mut state,
            &Event::ExecutionCompleted {
                metadata_id: metadata.id,
                end_time_ms: 100,
                output: serde_json::json!({}),
            },
        );
        apply(
            &mut state,
            &Event::ExecutionFailed {
                metadata_id: metadata.id,
                end_time_ms: 200,
                step: None,
                exception: "Whatever".into(),
                reason: "whatever".into(),
                stack_trace: None,
            },
        );
        assert_eq!(state.executions[&metadata.id].workflow_state, WorkflowState::Completed);
    }

    #[test]
    fn in_progress_transitions_from_pending() {
        let mut state = MaterializedState::default();
        let metadata = pending();
        apply(&mut state, &Event::ExecutionStarted { metadata: metadata.clone() });
        apply(&mut state, &Event::ExecutionInProgress { metadata_id: metadata.id });
        assert_eq!(state.executions[&metadata.id].workflow_state, WorkflowState::InProgress);
    }

    #[test]
    fn cancel_requested_sets_the_flag() {
        let mut state = MaterializedState::default();
        let metadata = pending();
        apply(&mut state, &Event::ExecutionStarted { metadata: metadata.clone() });
        apply(&mut state, &Event::ExecutionCancelRequested { metadata_id: metadata.id });
        assert!(state.executions[&metadata.id].cancel_requested);
    }
}
