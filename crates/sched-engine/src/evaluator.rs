// SPDX-License-Identifier: MIT

//! Evaluator: the single background task that decides which manifests are
//! due and enqueues their work. `Evaluator::tick` is the six-step cycle;
//! the steps below it are free functions so each can be unit tested
//! directly against a `MaterializedState` without a `Store`.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use sched_core::manifest::{ManifestId, ScheduleType};
use sched_core::schedule::{dependent_is_eligible, ManifestCandidate};
use sched_core::work_queue::{WorkQueueEntry, WorkQueueStatus};
use sched_core::{Clock, Event};
use sched_store::{MaterializedState, Store};

use crate::advisory_lock::AdvisoryLock;
use crate::config::SchedulerConfig;
use crate::error::EngineResult;
use crate::reaper;

/// Summary of one completed cycle, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluatorOutcome {
    pub dead_lettered: usize,
    pub enqueued: usize,
}

pub struct Evaluator<L, C> {
    store: Arc<Mutex<Store>>,
    lock: L,
    clock: C,
    config: SchedulerConfig,
}

impl<L: AdvisoryLock, C: Clock> Evaluator<L, C> {
    pub fn new(store: Arc<Mutex<Store>>, lock: L, clock: C, config: SchedulerConfig) -> Self {
        Self { store, lock, clock, config }
    }

    /// Runs one cycle: acquire the leader lock, reap, decide, enqueue,
    /// release. Returns a zeroed outcome (not an error) if another replica
    /// already holds the lock — that's the expected common case, not a
    /// failure.
    pub fn tick(&self) -> EngineResult<EvaluatorOutcome> {
        let _guard = match self.lock.try_acquire() {
            Some(guard) => guard,
            None => {
                tracing::debug!("evaluator lock held elsewhere this tick, skipping");
                return Ok(EvaluatorOutcome::default());
            }
        };

        let now = self.clock.epoch_ms();
        let mut store = self.store.lock();

        let candidates = build_candidates(store.state());
        let newly_dead_lettered = reaper::reap(&mut store, &candidates, now)?;
        if !newly_dead_lettered.is_empty() {
            tracing::info!(count = newly_dead_lettered.len(), "reaper dead-lettered manifests this cycle");
        }

        let due = decide(store.state(), &candidates, &newly_dead_lettered, now, &self.config);
        let enqueued = enqueue(&mut store, due, now, &self.config)?;
        if !enqueued.is_empty() {
            tracing::info!(count = enqueued.len(), "evaluator enqueued due manifests");
        }

        Ok(EvaluatorOutcome { dead_lettered: newly_dead_lettered.len(), enqueued: enqueued.len() })
    }
}

/// Step 2: project every enabled manifest into a candidate carrying the
/// aggregate counts the rest of the cycle needs.
fn build_candidates(state: &MaterializedState) -> Vec<ManifestCandidate> {
    state
        .manifests
        .values()
        .filter(|m| m.is_enabled)
        .map(|manifest| {
            let failed_count = state
                .executions
                .values()
                .filter(|e| {
                    e.manifest_id == Some(manifest.id)
                        && e.workflow_state == sched_core::execution::WorkflowState::Failed
                })
                .count() as u32;
            let has_awaiting_dead_letter =
                state.dead_letters.values().any(|dl| dl.manifest_id == manifest.id && dl.is_open());
            let has_queued_work = state
                .work_queue
                .values()
                .any(|e| e.manifest_id == Some(manifest.id) && e.status == WorkQueueStatus::Queued);
            let has_active_execution =
                state.executions.values().any(|e| e.manifest_id == Some(manifest.id) && !e.is_terminal());
            ManifestCandidate {
                manifest: manifest.clone(),
                failed_count,
                has_awaiting_dead_letter,
                has_queued_work,
                has_active_execution,
            }
        })
        .collect()
}

/// Step 4: decide which candidates are due. Returns an empty list
/// immediately if the optional global `MaxActiveJobs` ceiling is already
/// saturated — the dispatcher drains this tick instead.
fn decide(
    state: &MaterializedState,
    candidates: &[ManifestCandidate],
    newly_dead_lettered: &HashSet<ManifestId>,
    now: u64,
    config: &SchedulerConfig,
) -> Vec<ManifestCandidate> {
    if let Some(limit) = config.max_active_jobs {
        if active_job_count(state, config) >= limit {
            return Vec::new();
        }
    }

    candidates
        .iter()
        .filter(|c| c.manifest.schedule_type != ScheduleType::None)
        .filter(|c| c.manifest.schedule_type != ScheduleType::DormantDependent)
        .filter(|c| !newly_dead_lettered.contains(&c.manifest.id))
        .filter(|c| !c.has_active_execution && !c.has_queued_work)
        .filter(|c| is_due(c, state, now))
        .cloned()
        .collect()
}

fn is_due(candidate: &ManifestCandidate, state: &MaterializedState, now: u64) -> bool {
    match candidate.manifest.schedule_type {
        // Dependent eligibility has no wall-clock component; it's decided
        // by the parent's last successful run, not `next_fire`.
        ScheduleType::Dependent => {
            let parent_last_run = candidate
                .manifest
                .depends_on_manifest_id
                .and_then(|parent_id| state.manifests.get(&parent_id))
                .and_then(|parent| parent.last_successful_run);
            dependent_is_eligible(&candidate.manifest, parent_last_run)
        }
        _ => candidate.should_run_now(now),
    }
}

fn active_job_count(state: &MaterializedState, config: &SchedulerConfig) -> u32 {
    state
        .executions
        .values()
        .filter(|e| !e.is_terminal())
        .filter(|e| !config.excluded_workflow_type_names.contains(&e.name))
        .count() as u32
}

/// Step 5: write a queued entry for each due manifest. A duplicate
/// (another writer already queued this manifest between candidate-build
/// and here) is absorbed rather than treated as an error, mirroring the
/// unique-index semantics of the data model.
fn enqueue(
    store: &mut Store,
    due: Vec<ManifestCandidate>,
    now: u64,
    config: &SchedulerConfig,
) -> EngineResult<Vec<WorkQueueEntry>> {
    let mut enqueued = Vec::new();
    for candidate in due {
        let manifest = candidate.manifest;
        let already_queued = store
            .state()
            .work_queue
            .values()
            .any(|e| e.manifest_id == Some(manifest.id) && e.status == WorkQueueStatus::Queued);
        if already_queued {
            store.append(Event::WorkDuplicateAbsorbed { manifest_id: manifest.id })?;
            continue;
        }

        let group_priority =
            store.state().manifest_groups.get(&manifest.manifest_group_id).map(|g| g.priority).unwrap_or(0);
        let boost = if manifest.is_dependent() { config.dependent_priority_boost } else { 0 };

        let entry = WorkQueueEntry::new_queued(
            Some(manifest.id),
            manifest.workflow_name.clone(),
            manifest.input_type_name.clone(),
            manifest.input_properties.clone(),
            group_priority + boost,
            now,
        );
        store.append(Event::WorkQueued { entry: entry.clone() })?;
        enqueued.push(entry);
    }
    Ok(enqueued)
}
