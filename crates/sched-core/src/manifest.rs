// SPDX-License-Identifier: MIT

//! Manifests: durable definitions of what to run and when.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::define_id;
use crate::error::{SchedulerError, SchedulerResult};
use crate::manifest_group::ManifestGroupId;

define_id! {
    /// Identifies a [`Manifest`].
    pub struct ManifestId("mnf-");
}

/// How a manifest's next eligibility is computed. See `schedule.rs` for the
/// `next_fire`/`should_run_now` logic that consumes this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleType {
    /// Manual/on-demand only; never fired by the evaluator.
    None,
    Cron,
    Interval,
    /// Fires once its parent's `last_successful_run` advances past this
    /// manifest's own `last_successful_run`.
    Dependent,
    /// Never eligible from the scheduler; activated only via explicit
    /// dormant-dependent activation.
    DormantDependent,
}

/// A durable definition of what to run and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub id: ManifestId,
    /// Unique stable key supplied by the caller. Immutable once created.
    pub external_id: String,
    pub workflow_name: String,
    pub input_type_name: String,
    /// Opaque JSON blob; schema owned by the user workflow.
    pub input_properties: serde_json::Value,
    pub is_enabled: bool,
    pub schedule_type: ScheduleType,
    pub cron_expression: Option<String>,
    #[serde(default, with = "duration_secs_opt")]
    pub interval: Option<Duration>,
    pub depends_on_manifest_id: Option<ManifestId>,
    pub manifest_group_id: ManifestGroupId,
    pub priority: i32,
    pub max_retries: u32,
    #[serde(default, with = "duration_secs_opt")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub last_successful_run: Option<u64>,
}

mod duration_secs_opt {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(v: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        v.map(|d| d.as_secs()).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_secs))
    }
}

/// Options accepted by [`Manifest::upsert`] / the manifest store's `Upsert`.
#[derive(Debug, Clone)]
pub struct ManifestOptions {
    pub is_enabled: bool,
    pub max_retries: u32,
    pub timeout: Option<Duration>,
    pub priority: i32,
    pub group_id: Option<ManifestGroupId>,
}

impl Default for ManifestOptions {
    fn default() -> Self {
        Self { is_enabled: true, max_retries: 3, timeout: None, priority: 0, group_id: None }
    }
}

/// Caller-facing request shape for registering or replacing a manifest,
/// carried by the manifest store's `Upsert`/`ScheduleMany` operations and
/// by the admin wire protocol. Unlike [`Manifest`] it has no `id` (resolved
/// by `external_id` lookup) and no `last_successful_run` (preserved across
/// an upsert, never caller-supplied).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestSpec {
    pub external_id: String,
    pub workflow_name: String,
    pub input_type_name: String,
    #[serde(default)]
    pub input_properties: serde_json::Value,
    pub schedule_type: ScheduleType,
    #[serde(default)]
    pub cron_expression: Option<String>,
    #[serde(default, with = "duration_secs_opt")]
    pub interval: Option<Duration>,
    #[serde(default)]
    pub depends_on_external_id: Option<String>,
    #[serde(default)]
    pub manifest_group_id: Option<ManifestGroupId>,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default, with = "duration_secs_opt")]
    pub timeout: Option<Duration>,
    #[serde(default)]
    pub priority: i32,
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

impl ManifestSpec {
    pub fn new(
        external_id: impl Into<String>,
        workflow_name: impl Into<String>,
        input_type_name: impl Into<String>,
        schedule_type: ScheduleType,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            workflow_name: workflow_name.into(),
            input_type_name: input_type_name.into(),
            input_properties: serde_json::json!({}),
            schedule_type,
            cron_expression: None,
            interval: None,
            depends_on_external_id: None,
            manifest_group_id: None,
            is_enabled: true,
            max_retries: 3,
            timeout: None,
            priority: 0,
        }
    }
}

impl Manifest {
    /// Construct a fresh manifest, validating the schedule_type invariants
    /// before returning it.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        external_id: impl Into<String>,
        workflow_name: impl Into<String>,
        input_type_name: impl Into<String>,
        input_properties: serde_json::Value,
        schedule_type: ScheduleType,
        cron_expression: Option<String>,
        interval: Option<Duration>,
        depends_on_manifest_id: Option<ManifestId>,
        manifest_group_id: ManifestGroupId,
        options: ManifestOptions,
    ) -> SchedulerResult<Self> {
        let manifest = Self {
            id: ManifestId::new(),
            external_id: external_id.into(),
            workflow_name: workflow_name.into(),
            input_type_name: input_type_name.into(),
            input_properties,
            is_enabled: options.is_enabled,
            schedule_type,
            cron_expression,
            interval,
            depends_on_manifest_id,
            manifest_group_id,
            priority: options.priority,
            max_retries: options.max_retries,
            timeout: options.timeout,
            last_successful_run: None,
        };
        manifest.validate()?;
        Ok(manifest)
    }

    /// Checks the schedule_type invariants. Does not check the depends_on
    /// DAG property — that requires graph-wide knowledge and is enforced
    /// by the manifest store at upsert time.
    pub fn validate(&self) -> SchedulerResult<()> {
        match self.schedule_type {
            ScheduleType::Cron if self.cron_expression.is_none() => {
                return Err(SchedulerError::InvalidSchedule(
                    "schedule_type=cron requires cron_expression".into(),
                ));
            }
            ScheduleType::Interval => match self.interval {
                Some(i) if !i.is_zero() => {}
                _ => {
                    return Err(SchedulerError::InvalidSchedule(
                        "schedule_type=interval requires interval_seconds > 0".into(),
                    ));
                }
            },
            ScheduleType::Dependent | ScheduleType::DormantDependent
                if self.depends_on_manifest_id.is_none() =>
            {
                return Err(SchedulerError::InvalidSchedule(
                    "dependent schedules require depends_on_manifest_id".into(),
                ));
            }
            _ => {}
        }
        Ok(())
    }

    /// Whether this manifest's dispatch priority should receive the
    /// dependent priority boost.
    pub fn is_dependent(&self) -> bool {
        matches!(self.schedule_type, ScheduleType::Dependent | ScheduleType::DormantDependent)
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use builder::ManifestBuilder;

#[cfg(any(test, feature = "test-support"))]
mod builder {
    use super::*;

    /// Fluent test builder for [`Manifest`], gated behind `test-support`.
    pub struct ManifestBuilder {
        external_id: String,
        workflow_name: String,
        input_type_name: String,
        input_properties: serde_json::Value,
        schedule_type: ScheduleType,
        cron_expression: Option<String>,
        interval: Option<Duration>,
        depends_on_manifest_id: Option<ManifestId>,
        manifest_group_id: ManifestGroupId,
        options: ManifestOptions,
        last_successful_run: Option<u64>,
    }

    impl ManifestBuilder {
        pub fn new(external_id: impl Into<String>) -> Self {
            Self {
                external_id: external_id.into(),
                workflow_name: "workflow".into(),
                input_type_name: "Input".into(),
                input_properties: serde_json::json!({}),
                schedule_type: ScheduleType::None,
                cron_expression: None,
                interval: None,
                depends_on_manifest_id: None,
                manifest_group_id: ManifestGroupId::new(),
                options: ManifestOptions::default(),
                last_successful_run: None,
            }
        }

        pub fn workflow_name(mut self, name: impl Into<String>) -> Self {
            self.workflow_name = name.into();
            self
        }

        pub fn input_type_name(mut self, name: impl Into<String>) -> Self {
            self.input_type_name = name.into();
            self
        }

        pub fn interval(mut self, interval: Duration) -> Self {
            self.schedule_type = ScheduleType::Interval;
            self.interval = Some(interval);
            self
        }

        pub fn cron(mut self, expr: impl Into<String>) -> Self {
            self.schedule_type = ScheduleType::Cron;
            self.cron_expression = Some(expr.into());
            self
        }

        pub fn dependent_on(mut self, parent: ManifestId) -> Self {
            self.schedule_type = ScheduleType::Dependent;
            self.depends_on_manifest_id = Some(parent);
            self
        }

        pub fn dormant_dependent_on(mut self, parent: ManifestId) -> Self {
            self.schedule_type = ScheduleType::DormantDependent;
            self.depends_on_manifest_id = Some(parent);
            self
        }

        pub fn group(mut self, group_id: ManifestGroupId) -> Self {
            self.manifest_group_id = group_id;
            self
        }

        pub fn max_retries(mut self, n: u32) -> Self {
            self.options.max_retries = n;
            self
        }

        pub fn priority(mut self, p: i32) -> Self {
            self.options.priority = p;
            self
        }

        pub fn last_successful_run(mut self, epoch_ms: u64) -> Self {
            self.last_successful_run = Some(epoch_ms);
            self
        }

        pub fn disabled(mut self) -> Self {
            self.options.is_enabled = false;
            self
        }

        pub fn build(self) -> Manifest {
            let mut m = Manifest::new(
                self.external_id,
                self.workflow_name,
                self.input_type_name,
                self.input_properties,
                self.schedule_type,
                self.cron_expression,
                self.interval,
                self.depends_on_manifest_id,
                self.manifest_group_id,
                self.options,
            )
            .expect("ManifestBuilder produced an invalid manifest");
            m.last_successful_run = self.last_successful_run;
            m
        }
    }
}
