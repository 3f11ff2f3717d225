// SPDX-License-Identifier: MIT

//! WorkQueue entries: single units of pending work.

use serde::{Deserialize, Serialize};

use crate::define_id;
use crate::execution::ExecutionId;
use crate::manifest::ManifestId;

define_id! {
    /// Identifies a [`WorkQueueEntry`].
    pub struct WorkQueueId("wq-");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkQueueStatus {
    Queued,
    Dispatched,
    Cancelled,
}

/// A single unit of pending work linking a manifest (or ad-hoc trigger) to
/// a future execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkQueueEntry {
    pub id: WorkQueueId,
    /// External correlation id; reuses the typed id's string form.
    pub external_id: String,
    pub workflow_name: String,
    pub input: serde_json::Value,
    pub input_type_name: String,
    pub status: WorkQueueStatus,
    /// Null for ad-hoc/manual triggers.
    pub manifest_id: Option<ManifestId>,
    /// Populated at dispatch time.
    pub metadata_id: Option<ExecutionId>,
    pub priority: i32,
    pub created_at_ms: u64,
    pub dispatched_at_ms: Option<u64>,
}

impl WorkQueueEntry {
    pub fn new_queued(
        manifest_id: Option<ManifestId>,
        workflow_name: impl Into<String>,
        input_type_name: impl Into<String>,
        input: serde_json::Value,
        priority: i32,
        created_at_ms: u64,
    ) -> Self {
        let id = WorkQueueId::new();
        Self {
            external_id: id.as_str().to_string(),
            id,
            workflow_name: workflow_name.into(),
            input,
            input_type_name: input_type_name.into(),
            status: WorkQueueStatus::Queued,
            manifest_id,
            metadata_id: None,
            priority,
            created_at_ms,
            dispatched_at_ms: None,
        }
    }

    /// `metadata_id` is null iff `status == queued`.
    pub fn invariant_holds(&self) -> bool {
        match self.status {
            WorkQueueStatus::Queued => self.metadata_id.is_none(),
            WorkQueueStatus::Dispatched => self.metadata_id.is_some(),
            WorkQueueStatus::Cancelled => true,
        }
    }

    pub fn mark_dispatched(&mut self, metadata_id: ExecutionId, dispatched_at_ms: u64) {
        self.status = WorkQueueStatus::Dispatched;
        self.metadata_id = Some(metadata_id);
        self.dispatched_at_ms = Some(dispatched_at_ms);
    }
}

/// Dispatch ordering key: group priority DESC, entry priority DESC,
/// created_at ASC (FIFO within a priority).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DispatchOrderKey {
    pub neg_group_priority: i32,
    pub neg_entry_priority: i32,
    pub created_at_ms: u64,
}

impl DispatchOrderKey {
    pub fn new(group_priority: i32, entry_priority: i32, created_at_ms: u64) -> Self {
        Self {
            neg_group_priority: -group_priority,
            neg_entry_priority: -entry_priority,
            created_at_ms,
        }
    }
}
