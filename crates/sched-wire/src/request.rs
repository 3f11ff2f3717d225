// SPDX-License-Identifier: MIT

//! Admin requests: the Trigger API's wire shape, carried by `sched-cli`
//! to `sched-daemon` over the framed codec in [`crate::codec`].

use sched_core::dead_letter::DeadLetterId;
use sched_core::execution::ExecutionId;
use sched_core::manifest::{ManifestId, ManifestSpec};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Register or replace a manifest, looked up by `spec.external_id`.
    Upsert { spec: ManifestSpec },
    /// Batch upsert; `prune_prefix`, if set, cascade-deletes every existing
    /// manifest whose external_id has that prefix and isn't in `specs`.
    ScheduleMany { specs: Vec<ManifestSpec>, prune_prefix: Option<String> },
    /// Re-enable a manifest for automatic scheduling.
    Enable { external_id: String },
    /// Disable a manifest; in-flight executions are unaffected.
    Disable { external_id: String },
    /// Enqueue one ad-hoc execution of a manifest regardless of schedule.
    Trigger { external_id: String, input_override: Option<serde_json::Value> },
    /// Retry a dead-lettered manifest: creates a fresh execution and marks
    /// the dead-letter resolved.
    RetryDeadLetter { dead_letter_id: DeadLetterId },
    /// Resolve a dead-letter without re-running it.
    AcknowledgeDeadLetter { dead_letter_id: DeadLetterId, resolution_note: Option<String> },
    /// Request cooperative cancellation of an in-progress execution.
    RequestCancel { metadata_id: ExecutionId },

    ListManifests,
    GetManifest { manifest_id: ManifestId },
    ListDeadLetters,
    ListExecutions,
    GetExecution { metadata_id: ExecutionId },
    ListWorkQueue,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_roundtrip_through_json_with_type_tag() {
        let req = Request::Enable { external_id: "billing.sync".to_string() };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["type"], "Enable");
        let back: Request = serde_json::from_value(json).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn upsert_request_roundtrips() {
        let req = Request::Upsert {
            spec: ManifestSpec::new("billing.sync", "wf", "Input", sched_core::manifest::ScheduleType::None),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["type"], "Upsert");
        let back: Request = serde_json::from_value(json).unwrap();
        assert_eq!(back, req);
    }
}
