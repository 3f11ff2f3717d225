// SPDX-License-Identifier: MIT

//! Execution metadata: one row per attempt.

use serde::{Deserialize, Serialize};

use crate::define_id;
use crate::manifest::ManifestId;

define_id! {
    /// Identifies a single [`ExecutionMetadata`] attempt.
    pub struct ExecutionId("exe-");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// The durable record of a single workflow attempt and its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    pub id: ExecutionId,
    pub external_id: String,
    pub name: String,
    pub workflow_state: WorkflowState,
    pub start_time_ms: u64,
    pub end_time_ms: Option<u64>,
    pub input: Option<serde_json::Value>,
    pub output: Option<serde_json::Value>,
    pub failure_step: Option<String>,
    pub failure_exception: Option<String>,
    pub failure_reason: Option<String>,
    pub stack_trace: Option<String>,
    /// Nested runs (sub-workflows) reference their parent here.
    pub parent_id: Option<ExecutionId>,
    pub manifest_id: Option<ManifestId>,
    pub cancel_requested: bool,
    pub currently_running_step: Option<String>,
    pub step_started_at_ms: Option<u64>,
}

impl ExecutionMetadata {
    pub fn new_pending(
        name: impl Into<String>,
        manifest_id: Option<ManifestId>,
        input: Option<serde_json::Value>,
        start_time_ms: u64,
    ) -> Self {
        let id = ExecutionId::new();
        Self {
            external_id: id.as_str().to_string(),
            id,
            name: name.into(),
            workflow_state: WorkflowState::Pending,
            start_time_ms,
            end_time_ms: None,
            input,
            output: None,
            failure_step: None,
            failure_exception: None,
            failure_reason: None,
            stack_trace: None,
            parent_id: None,
            manifest_id,
            cancel_requested: false,
            currently_running_step: None,
            step_started_at_ms: None,
        }
    }

    pub fn mark_in_progress(&mut self) {
        self.workflow_state = WorkflowState::InProgress;
    }

    /// Failure outcome, a sum with [`Self::mark_completed`].
    pub fn mark_failed(
        &mut self,
        end_time_ms: u64,
        step: Option<String>,
        exception: impl Into<String>,
        reason: impl Into<String>,
        stack_trace: Option<String>,
    ) {
        self.workflow_state = WorkflowState::Failed;
        self.end_time_ms = Some(end_time_ms);
        self.failure_step = step;
        self.failure_exception = Some(exception.into());
        self.failure_reason = Some(reason.into());
        self.stack_trace = stack_trace;
    }

    pub fn mark_completed(&mut self, end_time_ms: u64, output: serde_json::Value) {
        self.workflow_state = WorkflowState::Completed;
        self.end_time_ms = Some(end_time_ms);
        self.output = Some(output);
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.workflow_state, WorkflowState::Completed | WorkflowState::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_execution_starts_pending() {
        let e = ExecutionMetadata::new_pending("wf", None, None, 0);
        assert_eq!(e.workflow_state, WorkflowState::Pending);
        assert!(!e.is_terminal());
    }

    #[test]
    fn mark_in_progress_transitions_from_pending() {
        let mut e = ExecutionMetadata::new_pending("wf", None, None, 0);
        e.mark_in_progress();
        assert_eq!(e.workflow_state, WorkflowState::InProgress);
    }

    #[test]
    fn mark_completed_sets_output_and_end_time() {
        let mut e = ExecutionMetadata::new_pending("wf", None, None, 0);
        e.mark_completed(100, serde_json::json!({"ok": true}));
        assert!(e.is_terminal());
        assert_eq!(e.end_time_ms, Some(100));
    }

    #[test]
    fn mark_failed_captures_failure_fields() {
        let mut e = ExecutionMetadata::new_pending("wf", None, None, 0);
        e.mark_failed(50, Some("step1".into()), "TimeoutException", "timed out", None);
        assert!(e.is_terminal());
        assert_eq!(e.failure_step.as_deref(), Some("step1"));
        assert_eq!(e.failure_exception.as_deref(), Some("TimeoutException"));
    }
}
