// SPDX-License-Identifier: MIT

//! Scheduler-wide configuration: one struct carrying every tunable the
//! evaluator, dispatcher, and reaper consult, deserializable from TOML
//! with every field defaulted so a bare `[scheduler]` table is valid.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

fn default_manifest_manager_polling_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_job_dispatcher_polling_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_max_retries() -> u32 {
    3
}

fn default_job_timeout() -> Duration {
    Duration::from_secs(3600)
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerConfig {
    #[serde(default = "default_manifest_manager_polling_interval", with = "duration_secs")]
    pub manifest_manager_polling_interval: Duration,

    #[serde(default = "default_true")]
    pub manifest_manager_enabled: bool,

    #[serde(default = "default_job_dispatcher_polling_interval", with = "duration_secs")]
    pub job_dispatcher_polling_interval: Duration,

    #[serde(default)]
    pub max_active_jobs: Option<u32>,

    #[serde(default)]
    pub excluded_workflow_type_names: HashSet<String>,

    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,

    #[serde(default = "default_job_timeout", with = "duration_secs")]
    pub default_job_timeout: Duration,

    #[serde(default)]
    pub dependent_priority_boost: i32,

    #[serde(default)]
    pub recover_stuck_jobs_on_startup: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            manifest_manager_polling_interval: default_manifest_manager_polling_interval(),
            manifest_manager_enabled: true,
            job_dispatcher_polling_interval: default_job_dispatcher_polling_interval(),
            max_active_jobs: None,
            excluded_workflow_type_names: HashSet::new(),
            default_max_retries: default_max_retries(),
            default_job_timeout: default_job_timeout(),
            dependent_priority_boost: 0,
            recover_stuck_jobs_on_startup: false,
        }
    }
}

impl SchedulerConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_deserializes_to_every_default() {
        let cfg: SchedulerConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, SchedulerConfig::default());
    }

    #[test]
    fn overrides_only_the_named_keys() {
        let cfg = SchedulerConfig::from_toml_str(
            r#"
            job_dispatcher_polling_interval = 2
            max_active_jobs = 10
            dependent_priority_boost = 5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.job_dispatcher_polling_interval, Duration::from_secs(2));
        assert_eq!(cfg.max_active_jobs, Some(10));
        assert_eq!(cfg.dependent_priority_boost, 5);
        assert_eq!(cfg.manifest_manager_polling_interval, Duration::from_secs(30));
    }

    #[test]
    fn excluded_workflow_type_names_parses_as_a_set() {
        let cfg = SchedulerConfig::from_toml_str(
            r#"excluded_workflow_type_names = ["housekeeping.Vacuum", "housekeeping.Compact"]"#,
        )
        .unwrap();
        assert!(cfg.excluded_workflow_type_names.contains("housekeeping.Vacuum"));
        assert_eq!(cfg.excluded_workflow_type_names.len(), 2);
    }
}
