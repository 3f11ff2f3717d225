// SPDX-License-Identifier: MIT

//! Admin responses returned for each [`crate::request::Request`].

use sched_core::dead_letter::DeadLetterId;
use sched_core::execution::ExecutionId;
use serde::{Deserialize, Serialize};

use crate::types::{
    DeadLetterSummary, ExecutionDetail, ExecutionSummary, ManifestDetail, ManifestSummary,
    WorkQueueSummary,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Ok,
    Error { message: String },

    Upserted { manifest: Box<ManifestDetail> },
    ScheduleManyApplied { manifests: Vec<ManifestSummary>, pruned: Vec<String> },
    ManifestEnabled { external_id: String },
    ManifestDisabled { external_id: String },
    Triggered { external_id: String, work_queue_id: sched_core::work_queue::WorkQueueId },
    DeadLetterRetried { dead_letter_id: DeadLetterId, retry_metadata_id: ExecutionId },
    DeadLetterAcknowledged { dead_letter_id: DeadLetterId },
    CancelRequested { metadata_id: ExecutionId },

    Manifests { manifests: Vec<ManifestSummary> },
    Manifest { manifest: Option<Box<ManifestDetail>> },
    DeadLetters { dead_letters: Vec<DeadLetterSummary> },
    Executions { executions: Vec<ExecutionSummary> },
    Execution { execution: Option<Box<ExecutionDetail>> },
    WorkQueue { entries: Vec<WorkQueueSummary> },
}
