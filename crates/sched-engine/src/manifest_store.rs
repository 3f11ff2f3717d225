// SPDX-License-Identifier: MIT

//! Manifest store: `Upsert`/`UpsertDependent`/`ScheduleMany` against the
//! manifest table. Every batch runs under a single lock acquisition so
//! concurrent writers never observe a partially-applied batch, and every
//! individual upsert resolves the caller's `external_id` against the
//! existing row before deciding what to write, so an upsert replaces a
//! manifest in place rather than shadowing it with a second row.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use sched_core::manifest::{Manifest, ManifestId, ManifestOptions, ManifestSpec};
use sched_core::manifest_group::ManifestGroupId;
use sched_core::{Event, SchedulerError};
use sched_store::{MaterializedState, Store};

use crate::error::EngineResult;

pub struct ManifestStore {
    store: Arc<Mutex<Store>>,
}

impl ManifestStore {
    pub fn new(store: Arc<Mutex<Store>>) -> Self {
        Self { store }
    }

    /// Looks up the existing manifest by `spec.external_id`, if any;
    /// preserves its `id` and `last_successful_run`, replaces every other
    /// attribute, and writes a single `ManifestUpserted` event.
    pub fn upsert(&self, spec: ManifestSpec) -> EngineResult<Manifest> {
        let mut store = self.store.lock();
        let manifest = upsert_one(&mut store, spec)?;
        Ok(manifest)
    }

    /// Same as [`Self::upsert`], but requires a parent, resolved by
    /// `depends_on_external_id` — `UnknownParent` if it doesn't exist.
    pub fn upsert_dependent(&self, mut spec: ManifestSpec, depends_on_external_id: &str) -> EngineResult<Manifest> {
        spec.depends_on_external_id = Some(depends_on_external_id.to_string());
        self.upsert(spec)
    }

    /// Batch upsert, one lock held across the whole set. `prune_prefix`, if
    /// given, cascade-deletes every existing manifest whose external_id
    /// starts with that prefix and is not in this batch's kept set —
    /// dead-letters, executions, and queued work for the pruned manifest
    /// are removed along with it.
    pub fn schedule_many(&self, specs: Vec<ManifestSpec>, prune_prefix: Option<&str>) -> EngineResult<Vec<Manifest>> {
        let mut store = self.store.lock();

        let kept_external_ids: HashSet<String> = specs.iter().map(|s| s.external_id.clone()).collect();
        let mut manifests = Vec::with_capacity(specs.len());
        for spec in specs {
            manifests.push(upsert_one(&mut store, spec)?);
        }

        if let Some(prefix) = prune_prefix {
            let to_prune: Vec<(ManifestId, String)> = store
                .state()
                .manifests
                .values()
                .filter(|m| m.external_id.starts_with(prefix) && !kept_external_ids.contains(&m.external_id))
                .map(|m| (m.id, m.external_id.clone()))
                .collect();
            for (manifest_id, external_id) in to_prune {
                store.append(Event::ManifestPruned { manifest_id, external_id })?;
            }
        }

        Ok(manifests)
    }

    /// Batch variant of [`Self::upsert_dependent`]: every spec must already
    /// carry a `depends_on_external_id`, or the whole batch is rejected
    /// before any write happens.
    pub fn schedule_many_dependent(
        &self,
        specs: Vec<ManifestSpec>,
        prune_prefix: Option<&str>,
    ) -> EngineResult<Vec<Manifest>> {
        for spec in &specs {
            if spec.depends_on_external_id.is_none() {
                return Err(SchedulerError::InvalidSchedule(format!(
                    "{} is missing depends_on_external_id in a dependent batch",
                    spec.external_id
                ))
                .into());
            }
        }
        self.schedule_many(specs, prune_prefix)
    }
}

fn upsert_one(store: &mut Store, spec: ManifestSpec) -> EngineResult<Manifest> {
    let depends_on_manifest_id = match &spec.depends_on_external_id {
        Some(parent_external_id) => {
            let parent = store
                .state()
                .find_manifest_by_external_id(parent_external_id)
                .ok_or_else(|| SchedulerError::UnknownParent(parent_external_id.clone()))?;
            let parent_id = parent.id;
            if would_create_cycle(store.state(), &spec.external_id, parent_id) {
                return Err(SchedulerError::DependencyCycle {
                    child: spec.external_id.clone(),
                    parent: parent_external_id.clone(),
                }
                .into());
            }
            Some(parent_id)
        }
        None => None,
    };

    let existing = store.state().find_manifest_by_external_id(&spec.external_id).cloned();

    let options = ManifestOptions {
        is_enabled: spec.is_enabled,
        max_retries: spec.max_retries,
        timeout: spec.timeout,
        priority: spec.priority,
        group_id: spec.manifest_group_id,
    };
    let mut manifest = Manifest::new(
        spec.external_id,
        spec.workflow_name,
        spec.input_type_name,
        spec.input_properties,
        spec.schedule_type,
        spec.cron_expression,
        spec.interval,
        depends_on_manifest_id,
        spec.manifest_group_id.unwrap_or_else(ManifestGroupId::new),
        options,
    )?;

    if let Some(existing) = existing {
        manifest.id = existing.id;
        manifest.last_successful_run = existing.last_successful_run;
    }

    store.append(Event::ManifestUpserted { manifest: manifest.clone() })?;
    Ok(manifest)
}

/// Walks the `depends_on_manifest_id` chain upward from `parent_id`;
/// returns true if it ever reaches a manifest whose external_id is
/// `child_external_id` (i.e. the child would become its own ancestor).
fn would_create_cycle(state: &MaterializedState, child_external_id: &str, parent_id: ManifestId) -> bool {
    let mut current = Some(parent_id);
    let mut seen = HashSet::new();
    while let Some(id) = current {
        if !seen.insert(id) {
            return false;
        }
        let Some(manifest) = state.manifests.get(&id) else { return false };
        if manifest.external_id == child_external_id {
            return true;
        }
        current = manifest.depends_on_manifest_id;
    }
    false
}
