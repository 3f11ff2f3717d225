// SPDX-License-Identifier: MIT

//! Dispatcher: drains the work queue into running executions, honoring
//! the global `max_active_jobs` ceiling and each group's own
//! `max_active_jobs` cap, in priority order.
//!
//! The planning step (which entries to dispatch) runs synchronously under
//! a brief lock; the lock is released before any `.await`, so a slow or
//! stuck background task server never blocks the evaluator or a concurrent
//! trigger-API call.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use sched_core::manifest_group::ManifestGroupId;
use sched_core::work_queue::{DispatchOrderKey, WorkQueueEntry, WorkQueueStatus};
use sched_core::{Clock, Event, ExecutionMetadata};
use sched_adapters::background::BackgroundTaskServer;
use sched_store::Store;

use crate::config::SchedulerConfig;
use crate::error::EngineResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatcherOutcome {
    pub dispatched: usize,
}

pub struct Dispatcher<B, C> {
    store: Arc<Mutex<Store>>,
    task_server: Arc<B>,
    clock: C,
    config: SchedulerConfig,
}

impl<B: BackgroundTaskServer, C: Clock> Dispatcher<B, C> {
    pub fn new(store: Arc<Mutex<Store>>, task_server: Arc<B>, clock: C, config: SchedulerConfig) -> Self {
        Self { store, task_server, clock, config }
    }

    pub async fn tick(&self) -> EngineResult<DispatcherOutcome> {
        let plan = self.plan();
        let mut dispatched = 0;
        for entry in plan {
            let id = entry.id;
            match self.dispatch_one(entry).await {
                Ok(()) => dispatched += 1,
                Err(err) => tracing::warn!(error = %err, work_queue_id = %id, "dispatch failed for queue entry"),
            }
        }
        Ok(DispatcherOutcome { dispatched })
    }

    /// Steps 1-3: load queued entries in dispatch order (dropping any whose
    /// manifest group is disabled), compute current global/group occupancy,
    /// and apply the layered capacity limits. Returns the entries cleared
    /// to dispatch this tick.
    fn plan(&self) -> Vec<WorkQueueEntry> {
        let store = self.store.lock();
        let state = store.state();

        let is_excluded = |name: &str| self.config.excluded_workflow_type_names.contains(name);

        let mut global_active = state
            .executions
            .values()
            .filter(|e| !e.is_terminal() && !is_excluded(&e.name))
            .count() as u32;

        let mut group_active: HashMap<ManifestGroupId, u32> = HashMap::new();
        for execution in state.executions.values().filter(|e| !e.is_terminal()) {
            if is_excluded(&execution.name) {
                continue;
            }
            if let Some(group_id) = execution
                .manifest_id
                .and_then(|m| state.manifests.get(&m))
                .map(|m| m.manifest_group_id)
            {
                *group_active.entry(group_id).or_insert(0) += 1;
            }
        }

        let mut queued: Vec<&WorkQueueEntry> =
            state.work_queue.values().filter(|e| e.status == WorkQueueStatus::Queued).collect();
        queued.sort_by_key(|entry| {
            let group_priority = entry
                .manifest_id
                .and_then(|m| state.manifests.get(&m))
                .and_then(|m| state.manifest_groups.get(&m.manifest_group_id))
                .map(|g| g.priority)
                .unwrap_or(0);
            DispatchOrderKey::new(group_priority, entry.priority, entry.created_at_ms)
        });

        let mut plan = Vec::new();
        for entry in queued {
            if is_excluded(&entry.workflow_name) {
                continue;
            }

            let group = entry
                .manifest_id
                .and_then(|m| state.manifests.get(&m))
                .and_then(|m| state.manifest_groups.get(&m.manifest_group_id));
            if let Some(group) = group {
                if !group.is_enabled {
                    continue;
                }
            }

            if let Some(limit) = self.config.max_active_jobs {
                if global_active >= limit {
                    break;
                }
            }

            if let Some(group) = group {
                if let Some(cap) = group.max_active_jobs {
                    if group_active.get(&group.id).copied().unwrap_or(0) >= cap {
                        continue;
                    }
                }
            }

            global_active += 1;
            if let Some(group) = group {
                *group_active.entry(group.id).or_insert(0) += 1;
            }
            plan.push(entry.clone());
        }
        plan
    }

    /// Step 4: mark one queue entry dispatched, start its execution record,
    /// and hand it to the background task server. The store mutex is held
    /// only for the synchronous event-append; it's dropped before the
    /// `enqueue` call so the task server's own scheduling work never runs
    /// under the lock.
    async fn dispatch_one(&self, entry: WorkQueueEntry) -> EngineResult<()> {
        let now = self.clock.epoch_ms();
        let metadata = {
            let mut store = self.store.lock();
            let metadata =
                ExecutionMetadata::new_pending(entry.workflow_name.clone(), entry.manifest_id, Some(entry.input.clone()), now);
            store.append(Event::ExecutionStarted { metadata: metadata.clone() })?;
            store.append(Event::WorkDispatched {
                work_queue_id: entry.id,
                metadata_id: metadata.id,
                dispatched_at_ms: now,
            })?;
            metadata
        };
        self.task_server.enqueue(metadata.id, entry.input).await;
        Ok(())
    }
}
