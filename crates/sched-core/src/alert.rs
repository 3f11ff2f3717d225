// SPDX-License-Identifier: MIT

//! Alert configuration and context types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Registered alert configuration shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    pub workflow_name: String,
    #[serde(with = "duration_secs")]
    pub time_window: std::time::Duration,
    pub minimum_failures: u32,
    #[serde(default)]
    pub exception_filters: Vec<String>,
    #[serde(default)]
    pub step_filters: Vec<String>,
    /// Additional predicates ANDed against a failure's metadata, on top of
    /// the OR-matched `exception_filters`/`step_filters` above.
    #[serde(default)]
    pub custom_filters: Vec<CustomFilter>,
    #[serde(default, with = "duration_secs_opt")]
    pub cooldown_period: Option<std::time::Duration>,
}

/// A single field-equality predicate evaluated against the failed
/// execution's metadata (serialized to JSON so any field, not just the
/// handful with dedicated filter lists, can be matched).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFilter {
    pub field: String,
    pub equals: String,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_secs().serialize(s)
    }
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

mod duration_secs_opt {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        d.map(|d| d.as_secs()).serialize(s)
    }
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}

/// Built once a failure crosses the alerting threshold, then fanned out to
/// every registered sender.
#[derive(Debug, Clone, Serialize)]
pub struct AlertContext {
    pub workflow_name: String,
    pub failure_count: u32,
    pub exception_frequency: HashMap<String, u32>,
    pub first_failure_ms: u64,
    pub last_success_ms: Option<u64>,
    pub sample_failed_inputs: Vec<serde_json::Value>,
}
