// SPDX-License-Identifier: MIT

//! Alert hook: evaluates an `AlertConfig` on executor failure and fans out
//! through `sched_adapters::alert::AlertFanout`. Configuration is resolved
//! once at startup and cached by workflow full-name; this module never
//! re-reads configuration from the store.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use sched_core::alert::{AlertConfig, AlertContext};
use sched_core::execution::{ExecutionMetadata, WorkflowState};
use sched_core::Clock;
use sched_adapters::alert::AlertFanout;
use sched_store::Store;

pub struct AlertHook<C> {
    store: Arc<Mutex<Store>>,
    configs: HashMap<String, AlertConfig>,
    fanout: AlertFanout,
    clock: C,
    last_alerted_ms: Mutex<HashMap<String, u64>>,
}

impl<C: Clock> AlertHook<C> {
    pub fn new(store: Arc<Mutex<Store>>, configs: HashMap<String, AlertConfig>, fanout: AlertFanout, clock: C) -> Self {
        Self { store, configs, fanout, clock, last_alerted_ms: Mutex::new(HashMap::new()) }
    }

    /// Called by the executor right after a failed execution's metadata is
    /// persisted. Does nothing if no config is registered for this
    /// workflow, or the failure doesn't match the configured filters, or a
    /// cooldown is still in effect.
    pub async fn on_failure(&self, metadata: &ExecutionMetadata) {
        let Some(config) = self.configs.get(&metadata.name) else { return };

        if !passes_filters(config, metadata) {
            return;
        }

        let now = self.clock.epoch_ms();
        if let Some(cooldown) = config.cooldown_period {
            let last = self.last_alerted_ms.lock();
            if let Some(&previous) = last.get(&metadata.name) {
                if now.saturating_sub(previous) < cooldown.as_millis() as u64 {
                    return;
                }
            }
        }

        let context = if config.minimum_failures <= 1 {
            single_failure_context(metadata)
        } else {
            match self.windowed_context(config, now) {
                Some(ctx) => ctx,
                None => return,
            }
        };

        if config.cooldown_period.is_some() {
            self.last_alerted_ms.lock().insert(metadata.name.clone(), now);
        }

        self.fanout.send_all(&context).await;
    }

    /// Queries execution metadata in `[now - time_window, now]` for this
    /// workflow name, filters in-memory, and builds an `AlertContext` if
    /// the resulting failure count meets `minimum_failures`. Returns `None`
    /// if the threshold isn't met.
    fn windowed_context(&self, config: &AlertConfig, now: u64) -> Option<AlertContext> {
        let window_start = now.saturating_sub(config.time_window.as_millis() as u64);
        let store = self.store.lock();

        let failures: Vec<&ExecutionMetadata> = store
            .state()
            .executions
            .values()
            .filter(|e| e.name == config.workflow_name)
            .filter(|e| e.workflow_state == WorkflowState::Failed)
            .filter(|e| e.end_time_ms.is_some_and(|t| t >= window_start && t <= now))
            .filter(|e| passes_filters(config, e))
            .collect();

        if (failures.len() as u32) < config.minimum_failures {
            return None;
        }

        let mut exception_frequency = HashMap::new();
        for e in &failures {
            if let Some(exception) = &e.failure_exception {
                *exception_frequency.entry(exception.clone()).or_insert(0u32) += 1;
            }
        }
        let first_failure_ms = failures.iter().filter_map(|e| e.end_time_ms).min().unwrap_or(now);
        let last_success_ms = store
            .state()
            .executions
            .values()
            .filter(|e| e.name == config.workflow_name && e.workflow_state == WorkflowState::Completed)
            .filter_map(|e| e.end_time_ms)
            .max();
        let sample_failed_inputs =
            failures.iter().filter_map(|e| e.input.clone()).take(5).collect();

        Some(AlertContext {
            workflow_name: config.workflow_name.clone(),
            failure_count: failures.len() as u32,
            exception_frequency,
            first_failure_ms,
            last_success_ms,
            sample_failed_inputs,
        })
    }
}

fn single_failure_context(metadata: &ExecutionMetadata) -> AlertContext {
    let mut exception_frequency = HashMap::new();
    if let Some(exception) = &metadata.failure_exception {
        exception_frequency.insert(exception.clone(), 1);
    }
    AlertContext {
        workflow_name: metadata.name.clone(),
        failure_count: 1,
        exception_frequency,
        first_failure_ms: metadata.end_time_ms.unwrap_or(metadata.start_time_ms),
        last_success_ms: None,
        sample_failed_inputs: metadata.input.clone().into_iter().collect(),
    }
}

fn passes_filters(config: &AlertConfig, metadata: &ExecutionMetadata) -> bool {
    let exception_ok = config.exception_filters.is_empty()
        || metadata
            .failure_exception
            .as_deref()
            .is_some_and(|exc| config.exception_filters.iter().any(|f| f == exc));
    let step_ok = config.step_filters.is_empty()
        || metadata.failure_step.as_deref().is_some_and(|step| config.step_filters.iter().any(|f| f == step));
    exception_ok && step_ok && passes_custom_filters(config, metadata)
}

/// AND-of-custom-predicates: every configured filter must match a field of
/// the metadata's own JSON representation, so filters aren't limited to
/// the handful of fields with dedicated filter lists above.
fn passes_custom_filters(config: &AlertConfig, metadata: &ExecutionMetadata) -> bool {
    if config.custom_filters.is_empty() {
        return true;
    }
    let Ok(value) = serde_json::to_value(metadata) else {
        return false;
    };
    config.custom_filters.iter().all(|filter| {
        value.get(&filter.field).is_some_and(|v| field_matches(v, &filter.equals))
    })
}

fn field_matches(value: &serde_json::Value, expected: &str) -> bool {
    match value {
        serde_json::Value::String(s) => s == expected,
        serde_json::Value::Null => expected.is_empty(),
        other => other.to_string() == expected,
    }
}
