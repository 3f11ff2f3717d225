// SPDX-License-Identifier: MIT

//! Pure schedule-evaluation logic.
//!
//! Nothing here touches storage: `next_fire` and `should_run_now` are pure
//! functions of a manifest, its parent's last successful run (when
//! dependent), and a handful of aggregate booleans the evaluator computes
//! in one query per cycle.

use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use cron::Schedule as CronSchedule;

use crate::manifest::{Manifest, ScheduleType};

/// Lightweight per-cycle view of a manifest joined to the aggregate counts
/// the evaluator pushes into a single store query.
#[derive(Debug, Clone)]
pub struct ManifestCandidate {
    pub manifest: Manifest,
    pub failed_count: u32,
    pub has_awaiting_dead_letter: bool,
    pub has_queued_work: bool,
    pub has_active_execution: bool,
}

impl ManifestCandidate {
    /// True iff enabled, no blocking dead-letter, no active execution,
    /// no queued work, and due.
    pub fn should_run_now(&self, now_epoch_ms: u64) -> bool {
        self.manifest.is_enabled
            && !self.has_awaiting_dead_letter
            && !self.has_active_execution
            && !self.has_queued_work
            && next_fire(&self.manifest, now_epoch_ms).is_some_and(|fire| fire <= now_epoch_ms)
    }
}

/// Computes the next epoch-ms instant at which `manifest` becomes eligible,
/// or `None` if it is never eligible from the scheduler (schedule_type=none
/// or dormant_dependent).
pub fn next_fire(manifest: &Manifest, now_epoch_ms: u64) -> Option<u64> {
    match manifest.schedule_type {
        ScheduleType::None | ScheduleType::DormantDependent => None,
        ScheduleType::Interval => {
            let interval_ms = manifest.interval.unwrap_or(Duration::ZERO).as_millis() as u64;
            Some(match manifest.last_successful_run {
                Some(last) => last + interval_ms,
                None => now_epoch_ms,
            })
        }
        ScheduleType::Cron => {
            let expr = manifest.cron_expression.as_deref()?;
            // Manifests store standard 5-field cron (minute hour dom month dow);
            // the `cron` crate requires a leading seconds field.
            let six_field = format!("0 {expr}");
            let schedule = CronSchedule::from_str(&six_field).ok()?;
            let after = epoch_ms_to_datetime(manifest.last_successful_run.unwrap_or(0));
            schedule.after(&after).next().map(datetime_to_epoch_ms)
        }
        // Dependent eligibility is decided by `dependent_is_eligible`, not a
        // wall-clock instant; callers should check that instead of next_fire.
        ScheduleType::Dependent => None,
    }
}

/// Dependent eligibility: strictly `parent.last_successful_run >
/// this.last_successful_run`.
pub fn dependent_is_eligible(manifest: &Manifest, parent_last_successful_run: Option<u64>) -> bool {
    match (parent_last_successful_run, manifest.last_successful_run) {
        (Some(parent), Some(mine)) => parent > mine,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

fn epoch_ms_to_datetime(ms: u64) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::<chrono::Utc>::from(UNIX_EPOCH + Duration::from_millis(ms))
}

fn datetime_to_epoch_ms(dt: chrono::DateTime<chrono::Utc>) -> u64 {
    dt.timestamp_millis().max(0) as u64
}

/// Convenience for callers that want "now" in epoch-ms from `SystemTime`.
pub fn system_now_epoch_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}
