// SPDX-License-Identifier: MIT

//! Dead letters: markers that a manifest has exhausted its retry budget.

use serde::{Deserialize, Serialize};

use crate::define_id;
use crate::execution::ExecutionId;
use crate::manifest::ManifestId;

define_id! {
    /// Identifies a [`DeadLetter`].
    pub struct DeadLetterId("dlt-");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadLetterStatus {
    AwaitingIntervention,
    Retried,
    Acknowledged,
}

/// Created when retries are exhausted. A manifest with status
/// `awaiting_intervention` blocks further automatic scheduling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub id: DeadLetterId,
    pub manifest_id: ManifestId,
    pub dead_lettered_at_ms: u64,
    pub status: DeadLetterStatus,
    pub resolved_at_ms: Option<u64>,
    pub resolution_note: Option<String>,
    pub reason: String,
    pub retry_count_at_dead_letter: u32,
    pub retry_metadata_id: Option<ExecutionId>,
}

impl DeadLetter {
    pub fn new(
        manifest_id: ManifestId,
        reason: impl Into<String>,
        retry_count_at_dead_letter: u32,
        dead_lettered_at_ms: u64,
    ) -> Self {
        Self {
            id: DeadLetterId::new(),
            manifest_id,
            dead_lettered_at_ms,
            status: DeadLetterStatus::AwaitingIntervention,
            resolved_at_ms: None,
            resolution_note: None,
            reason: reason.into(),
            retry_count_at_dead_letter,
            retry_metadata_id: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == DeadLetterStatus::AwaitingIntervention
    }

    /// Operator resolution: retry. Links the fresh execution row and marks
    /// this dead-letter `retried`.
    pub fn retry(&mut self, new_execution_id: ExecutionId, resolved_at_ms: u64) {
        self.status = DeadLetterStatus::Retried;
        self.retry_metadata_id = Some(new_execution_id);
        self.resolved_at_ms = Some(resolved_at_ms);
    }

    /// Operator resolution: acknowledge without re-running.
    pub fn acknowledge(&mut self, note: Option<String>, resolved_at_ms: u64) {
        self.status = DeadLetterStatus::Acknowledged;
        self.resolution_note = note;
        self.resolved_at_ms = Some(resolved_at_ms);
    }
}
