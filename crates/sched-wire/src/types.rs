// SPDX-License-Identifier: MIT

//! Admin-facing summary/detail DTOs, decoupled from the storage-layer
//! domain types so the wire shape can evolve independently of them.

use sched_core::dead_letter::{DeadLetter, DeadLetterId, DeadLetterStatus};
use sched_core::execution::{ExecutionId, ExecutionMetadata, WorkflowState};
use sched_core::manifest::{Manifest, ManifestId, ScheduleType};
use sched_core::work_queue::{WorkQueueEntry, WorkQueueId, WorkQueueStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestSummary {
    pub id: ManifestId,
    pub external_id: String,
    pub workflow_name: String,
    pub is_enabled: bool,
    pub schedule_type: ScheduleType,
    pub last_successful_run: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestDetail {
    pub id: ManifestId,
    pub external_id: String,
    pub workflow_name: String,
    pub input_type_name: String,
    pub is_enabled: bool,
    pub schedule_type: ScheduleType,
    pub cron_expression: Option<String>,
    pub depends_on_manifest_id: Option<ManifestId>,
    pub priority: i32,
    pub max_retries: u32,
    pub last_successful_run: Option<u64>,
}

impl From<&Manifest> for ManifestSummary {
    fn from(m: &Manifest) -> Self {
        Self {
            id: m.id,
            external_id: m.external_id.clone(),
            workflow_name: m.workflow_name.clone(),
            is_enabled: m.is_enabled,
            schedule_type: m.schedule_type,
            last_successful_run: m.last_successful_run,
        }
    }
}

impl From<&Manifest> for ManifestDetail {
    fn from(m: &Manifest) -> Self {
        Self {
            id: m.id,
            external_id: m.external_id.clone(),
            workflow_name: m.workflow_name.clone(),
            input_type_name: m.input_type_name.clone(),
            is_enabled: m.is_enabled,
            schedule_type: m.schedule_type,
            cron_expression: m.cron_expression.clone(),
            depends_on_manifest_id: m.depends_on_manifest_id,
            priority: m.priority,
            max_retries: m.max_retries,
            last_successful_run: m.last_successful_run,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterSummary {
    pub id: DeadLetterId,
    pub manifest_id: ManifestId,
    pub status: DeadLetterStatus,
    pub reason: String,
    pub dead_lettered_at_ms: u64,
}

impl From<&DeadLetter> for DeadLetterSummary {
    fn from(dl: &DeadLetter) -> Self {
        Self {
            id: dl.id,
            manifest_id: dl.manifest_id,
            status: dl.status,
            reason: dl.reason.clone(),
            dead_lettered_at_ms: dl.dead_lettered_at_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    pub id: ExecutionId,
    pub name: String,
    pub workflow_state: WorkflowState,
    pub start_time_ms: u64,
    pub end_time_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionDetail {
    pub id: ExecutionId,
    pub name: String,
    pub workflow_state: WorkflowState,
    pub start_time_ms: u64,
    pub end_time_ms: Option<u64>,
    pub failure_step: Option<String>,
    pub failure_exception: Option<String>,
    pub failure_reason: Option<String>,
    pub cancel_requested: bool,
}

impl From<&ExecutionMetadata> for ExecutionSummary {
    fn from(e: &ExecutionMetadata) -> Self {
        Self {
            id: e.id,
            name: e.name.clone(),
            workflow_state: e.workflow_state,
            start_time_ms: e.start_time_ms,
            end_time_ms: e.end_time_ms,
        }
    }
}

impl From<&ExecutionMetadata> for ExecutionDetail {
    fn from(e: &ExecutionMetadata) -> Self {
        Self {
            id: e.id,
            name: e.name.clone(),
            workflow_state: e.workflow_state,
            start_time_ms: e.start_time_ms,
            end_time_ms: e.end_time_ms,
            failure_step: e.failure_step.clone(),
            failure_exception: e.failure_exception.clone(),
            failure_reason: e.failure_reason.clone(),
            cancel_requested: e.cancel_requested,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkQueueSummary {
    pub id: WorkQueueId,
    pub workflow_name: String,
    pub status: WorkQueueStatus,
    pub priority: i32,
    pub created_at_ms: u64,
}

impl From<&WorkQueueEntry> for WorkQueueSummary {
    fn from(e: &WorkQueueEntry) -> Self {
        Self {
            id: e.id,
            workflow_name: e.workflow_name.clone(),
            status: e.status,
            priority: e.priority,
            created_at_ms: e.created_at_ms,
        }
    }
}
