// SPDX-License-Identifier: MIT

//! Executor: the `TaskHandler` the background pool calls back into with a
//! dispatched execution id and its input. Runs the chain load, validate,
//! transition to in_progress, bind a dormant-activation context, resolve
//! the workflow, run it, then persist the outcome and fire the alert hook
//! on failure.
//!
//! `TaskHandler::handle` has no `Result` in its signature — the pool never
//! inspects outcomes beyond "did it return" — so every internal failure is
//! caught here and logged at `error` level rather than propagated further;
//! that tracing line is this crate's equivalent of the pool "recording" it.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sched_adapters::background::TaskHandler;
use sched_adapters::registry::WorkflowRegistry;
use sched_core::execution::{ExecutionId, ExecutionMetadata, WorkflowState};
use sched_core::workflow::WorkflowOutcome;
use sched_core::{Clock, Event};
use sched_store::Store;
use thiserror::Error;

use crate::alert_hook::AlertHook;
use crate::config::SchedulerConfig;
use crate::dormant::{Activator, CURRENT_ACTIVATOR};
use crate::error::EngineResult;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("execution {0} has no matching record")]
    UnknownExecution(ExecutionId),
    #[error("execution {0} is not pending (already {1:?})")]
    NotPending(ExecutionId, WorkflowState),
    #[error("execution {0} has no matching queue entry to resolve its input type")]
    MissingQueueEntry(ExecutionId),
    #[error("workflow failed at step {step:?}: {exception} ({reason})")]
    WorkflowFailed { step: String, exception: String, reason: String },
}

pub struct Executor<C> {
    store: Arc<Mutex<Store>>,
    registry: WorkflowRegistry,
    alert_hook: Arc<AlertHook<C>>,
    clock: C,
    config: SchedulerConfig,
}

impl<C: Clock> Executor<C> {
    pub fn new(
        store: Arc<Mutex<Store>>,
        registry: WorkflowRegistry,
        alert_hook: Arc<AlertHook<C>>,
        clock: C,
        config: SchedulerConfig,
    ) -> Self {
        Self { store, registry, alert_hook, clock, config }
    }

    async fn execute(&self, execution_id: ExecutionId, input: serde_json::Value) {
        let start = std::time::Instant::now();
        let result = self.execute_inner(execution_id, input).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(()) => tracing::info!(%execution_id, elapsed_ms, "execution finished"),
            Err(err) => tracing::error!(%execution_id, elapsed_ms, error = %err, "execution failed"),
        }
    }

    async fn execute_inner(&self, execution_id: ExecutionId, input: serde_json::Value) -> EngineResult<()> {
        let (manifest_id, input_type_name) = {
            let store = self.store.lock();
            let metadata = store
                .state()
                .executions
                .get(&execution_id)
                .cloned()
                .ok_or(ExecutorError::UnknownExecution(execution_id))?;
            if metadata.workflow_state != WorkflowState::Pending {
                return Err(ExecutorError::NotPending(execution_id, metadata.workflow_state).into());
            }
            let entry = store
                .state()
                .work_queue
                .values()
                .find(|e| e.metadata_id == Some(execution_id))
                .cloned()
                .ok_or(ExecutorError::MissingQueueEntry(execution_id))?;
            (metadata.manifest_id, entry.input_type_name)
        };

        {
            let mut store = self.store.lock();
            store.append(Event::ExecutionInProgress { metadata_id: execution_id })?;
        }

        // Best-effort cancellation: checked at step boundaries only, never
        // preempting a workflow already running — there is no forced
        // termination here.
        if self.is_cancel_requested(execution_id) {
            self.mark_cancelled(execution_id).await?;
            return Ok(());
        }

        let workflow = match self.registry.lookup(&input_type_name) {
            Ok(workflow) => workflow,
            Err(err) => {
                self.record_failure(execution_id, None, "UnregisteredWorkflow", &err.to_string(), None).await?;
                return Err(err.into());
            }
        };

        let outcome = if let Some(parent_manifest_id) = manifest_id {
            let activator = Activator::new(
                Arc::clone(&self.store),
                parent_manifest_id,
                self.config.dependent_priority_boost,
            );
            CURRENT_ACTIVATOR.scope(activator, workflow.run(input)).await
        } else {
            workflow.run(input).await
        };

        match outcome {
            WorkflowOutcome::Success(output) => {
                let now = self.clock.epoch_ms();
                let mut store = self.store.lock();
                store.append(Event::ExecutionCompleted { metadata_id: execution_id, end_time_ms: now, output })?;
                if let Some(manifest_id) = manifest_id {
                    store.append(Event::ManifestRanSuccessfully { manifest_id, at_ms: now })?;
                }
                Ok(())
            }
            WorkflowOutcome::Failure(step_err) => {
                self.record_failure(
                    execution_id,
                    Some(step_err.step.clone()),
                    &step_err.exception,
                    &step_err.reason,
                    step_err.stack_trace.clone(),
                )
                .await?;
                Err(ExecutorError::WorkflowFailed {
                    step: step_err.step,
                    exception: step_err.exception,
                    reason: step_err.reason,
                }
                .into())
            }
        }
    }

    fn is_cancel_requested(&self, execution_id: ExecutionId) -> bool {
        self.store.lock().state().executions.get(&execution_id).map(|m| m.cancel_requested).unwrap_or(false)
    }

    async fn mark_cancelled(&self, execution_id: ExecutionId) -> EngineResult<()> {
        let now = self.clock.epoch_ms();
        let mut store = self.store.lock();
        store.append(Event::ExecutionFailed {
            metadata_id: execution_id,
            end_time_ms: now,
            step: None,
            exception: "Cancelled".into(),
            reason: "cancellation requested before the workflow started".into(),
            stack_trace: None,
        })?;
        tracing::info!(%execution_id, "execution cancelled before running");
        Ok(())
    }

    /// Persists the failure and invokes the alert hook. Does not alert on
    /// operator-requested cancellation; see [`Self::mark_cancelled`].
    async fn record_failure(
        &self,
        execution_id: ExecutionId,
        step: Option<String>,
        exception: &str,
        reason: &str,
        stack_trace: Option<String>,
    ) -> EngineResult<()> {
        let now = self.clock.epoch_ms();
        {
            let mut store = self.store.lock();
            store.append(Event::ExecutionFailed {
                metadata_id: execution_id,
                end_time_ms: now,
                step,
                exception: exception.to_string(),
                reason: reason.to_string(),
                stack_trace,
            })?;
        }
        let metadata: ExecutionMetadata = {
            let store = self.store.lock();
            store
                .state()
                .executions
                .get(&execution_id)
                .cloned()
                .ok_or(ExecutorError::UnknownExecution(execution_id))?
        };
        self.alert_hook.on_failure(&metadata).await;
        Ok(())
    }
}

#[async_trait]
impl<C: Clock> TaskHandler for Executor<C> {
    async fn handle(&self, execution_id: ExecutionId, input: serde_json::Value) {
        self.execute(execution_id, input).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sched_adapters::alert::{AlertFanout, FakeAlertSender};
    use sched_core::manifest::ManifestBuilder;
    use sched_core::work_queue::WorkQueueEntry;
    use sched_core::workflow::{Step, StepContext, StepError, StepKind};
    use sched_core::workflow::{ChainWorkflow, Workflow};
    use sched_core::FakeClock;
    use sched_store::MigrationRegistry;
    use std::collections::HashMap;
    use std::time::Duration;

    fn store() -> (tempfile::TempDir, Arc<Mutex<Store>>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path(), &MigrationRegistry::new()).unwrap();
        (dir, Arc::new(Mutex::new(store)))
    }

    fn alert_hook(store: Arc<Mutex<Store>>, clock: FakeClock) -> (Arc<AlertHook<FakeClock>>, FakeAlertSender) {
        let sender = FakeAlertSender::new();
        let fanout = AlertFanout::new(vec![Arc::new(sender.clone())]);
        (Arc::new(AlertHook::new(store, HashMap::new(), fanout, clock)), sender)
    }

    /// Queues and dispatches a manifest's work by hand (bypassing the
    /// dispatcher, which this module doesn't depend on), returning the
    /// execution id the executor should be handed.
    fn seed_dispatched_execution(
        store: &Arc<Mutex<Store>>,
        manifest_id: Option<sched_core::manifest::ManifestId>,
        input_type_name: &str,
        input: serde_json::Value,
    ) -> ExecutionId {
        let mut guard = store.lock();
        let entry = WorkQueueEntry::new_queued(manifest_id, "wf", input_type_name, input.clone(), 0, 0);
        let entry_id = entry.id;
        guard.append(Event::WorkQueued { entry }).unwrap();

        let metadata = ExecutionMetadata::new_pending("wf", manifest_id, Some(input), 0);
        let metadata_id = metadata.id;
        guard.append(Event::ExecutionStarted { metadata }).unwrap();
        guard.append(Event::WorkDispatched { work_queue_id: entry_id, metadata_id, dispatched_at_ms: 0 }).unwrap();
        metadata_id
    }

    struct AlwaysOk;

    #[async_trait]
    impl Step for AlwaysOk {
        fn name(&self) -> &str {
            "always_ok"
        }
        async fn run(&self, ctx: &mut StepContext) -> Result<(), StepError> {
            ctx.insert(serde_json::json!({"ok": true}));
            Ok(())
        }
    }

    struct AlwaysFail;

    #[async_trait]
    impl Step for AlwaysFail {
        fn name(&self) -> &str {
            "boom_step"
        }
        fn kind(&self) -> StepKind {
            StepKind::Plain
        }
        async fn run(&self, _ctx: &mut StepContext) -> Result<(), StepError> {
            Err(StepError {
                step: self.name().into(),
                exception: "BoomException".into(),
                reason: "boom".into(),
                stack_trace: None,
            })
        }
    }

    /// A workflow that activates a declared dormant child through the
    /// ambient task-local context instead of touching the store directly.
    struct ActivatesChild;

    #[async_trait]
    impl Workflow for ActivatesChild {
        async fn run(&self, _input: serde_json::Value) -> WorkflowOutcome {
            let activator = crate::dormant::current().expect("executor should have bound an activator");
            activator.activate("child", serde_json::Value::Null, 1_000).expect("activation should succeed");
            WorkflowOutcome::Success(serde_json::Value::Null)
        }
    }

    #[tokio::test]
    async fn successful_run_marks_completed_and_updates_manifest_last_successful_run() {
        let (_dir, store) = store();
        let manifest = ManifestBuilder::new("extract-0").interval(Duration::from_secs(60)).build();
        let manifest_id = manifest.id;
        store.lock().append(Event::ManifestUpserted { manifest }).unwrap();
        let execution_id =
            seed_dispatched_execution(&store, Some(manifest_id), "extract.Input", serde_json::json!({}));

        let mut registry = WorkflowRegistry::new();
        registry.register("extract.Input", Arc::new(ChainWorkflow::new(vec![Box::new(AlwaysOk)]))).unwrap();

        let clock = FakeClock::new();
        clock.set_epoch_ms(5_000);
        let (hook, sender) = alert_hook(Arc::clone(&store), clock.clone());
        let executor = Executor::new(Arc::clone(&store), registry, hook, clock, SchedulerConfig::default());

        executor.handle(execution_id, serde_json::json!({})).await;

        let guard = store.lock();
        let metadata = &guard.state().executions[&execution_id];
        assert_eq!(metadata.workflow_state, WorkflowState::Completed);
        assert_eq!(guard.state().manifests[&manifest_id].last_successful_run, Some(5_000));
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn failed_run_marks_failed_and_invokes_alert_hook() {
        let (_dir, store) = store();
        let execution_id = seed_dispatched_execution(&store, None, "billing.Input", serde_json::json!({}));

        let mut registry = WorkflowRegistry::new();
        registry.register("billing.Input", Arc::new(ChainWorkflow::new(vec![Box::new(AlwaysFail)]))).unwrap();

        let clock = FakeClock::new();
        let sender = FakeAlertSender::new();
        let fanout = AlertFanout::new(vec![Arc::new(sender.clone())]);
        let config = sched_core::alert::AlertConfig {
            workflow_name: "wf".into(),
            time_window: Duration::from_secs(3600),
            minimum_failures: 1,
            exception_filters: vec![],
            step_filters: vec![],
            custom_filters: vec![],
            cooldown_period: None,
        };
        let hook = Arc::new(AlertHook::new(
            Arc::clone(&store),
            HashMap::from([("wf".to_string(), config)]),
            fanout,
            clock.clone(),
        ));
        let executor = Executor::new(Arc::clone(&store), registry, hook, clock, SchedulerConfig::default());

        executor.handle(execution_id, serde_json::json!({})).await;

        let guard = store.lock();
        let metadata = &guard.state().executions[&execution_id];
        assert_eq!(metadata.workflow_state, WorkflowState::Failed);
        assert_eq!(metadata.failure_exception.as_deref(), Some("BoomException"));
        assert_eq!(metadata.failure_step.as_deref(), Some("boom_step"));
        drop(guard);
        assert_eq!(sender.sent().len(), 1);
    }

    #[tokio::test]
    async fn unregistered_input_type_is_marked_failed() {
        let (_dir, store) = store();
        let execution_id = seed_dispatched_execution(&store, None, "missing.Input", serde_json::json!({}));

        let registry = WorkflowRegistry::new();
        let clock = FakeClock::new();
        let (hook, _sender) = alert_hook(Arc::clone(&store), clock.clone());
        let executor = Executor::new(Arc::clone(&store), registry, hook, clock, SchedulerConfig::default());

        executor.handle(execution_id, serde_json::json!({})).await;

        let guard = store.lock();
        let metadata = &guard.state().executions[&execution_id];
        assert_eq!(metadata.workflow_state, WorkflowState::Failed);
        assert_eq!(metadata.failure_exception.as_deref(), Some("UnregisteredWorkflow"));
    }

    #[tokio::test]
    async fn a_non_pending_execution_is_left_untouched() {
        let (_dir, store) = store();
        let execution_id = seed_dispatched_execution(&store, None, "extract.Input", serde_json::json!({}));
        store.lock().append(Event::ExecutionCompleted { metadata_id: execution_id, end_time_ms: 1, output: serde_json::Value::Null }).unwrap();

        let mut registry = WorkflowRegistry::new();
        registry.register("extract.Input", Arc::new(ChainWorkflow::new(vec![Box::new(AlwaysOk)]))).unwrap();
        let clock = FakeClock::new();
        let (hook, _sender) = alert_hook(Arc::clone(&store), clock.clone());
        let executor = Executor::new(Arc::clone(&store), registry, hook, clock, SchedulerConfig::default());

        executor.handle(execution_id, serde_json::json!({})).await;

        assert_eq!(store.lock().state().executions[&execution_id].workflow_state, WorkflowState::Completed);
    }

    #[tokio::test]
    async fn cancellation_requested_before_run_skips_the_workflow_without_alerting() {
        let (_dir, store) = store();
        let execution_id = seed_dispatched_execution(&store, None, "extract.Input", serde_json::json!({}));
        store.lock().append(Event::ExecutionCancelRequested { metadata_id: execution_id }).unwrap();

        let mut registry = WorkflowRegistry::new();
        registry.register("extract.Input", Arc::new(ChainWorkflow::new(vec![Box::new(AlwaysOk)]))).unwrap();
        let clock = FakeClock::new();
        let (hook, sender) = alert_hook(Arc::clone(&store), clock.clone());
        let executor = Executor::new(Arc::clone(&store), registry, hook, clock, SchedulerConfig::default());

        executor.handle(execution_id, serde_json::json!({})).await;

        let guard = store.lock();
        let metadata = &guard.state().executions[&execution_id];
        assert_eq!(metadata.workflow_state, WorkflowState::Failed);
        assert_eq!(metadata.failure_exception.as_deref(), Some("Cancelled"));
        drop(guard);
        assert!(sender.sent().is_empty());
    }

    #[tokio::test]
    async fn workflow_can_activate_a_dormant_child_via_the_ambient_context() {
        let (_dir, store) = store();
        let parent = ManifestBuilder::new("parent").interval(Duration::from_secs(60)).build();
        let parent_id = parent.id;
        let child = ManifestBuilder::new("child").dormant_dependent_on(parent_id).build();
        let child_id = child.id;
        store.lock().append(Event::ManifestUpserted { manifest: parent }).unwrap();
        store.lock().append(Event::ManifestUpserted { manifest: child }).unwrap();
        let execution_id =
            seed_dispatched_execution(&store, Some(parent_id), "parent.Input", serde_json::json!({}));

        let mut registry = WorkflowRegistry::new();
        registry.register("parent.Input", Arc::new(ActivatesChild)).unwrap();
        let clock = FakeClock::new();
        let (hook, _sender) = alert_hook(Arc::clone(&store), clock.clone());
        let executor = Executor::new(Arc::clone(&store), registry, hook, clock, SchedulerConfig::default());

        executor.handle(execution_id, serde_json::json!({})).await;

        assert!(store
            .lock()
            .state()
            .work_queue
            .values()
            .any(|e| e.manifest_id == Some(child_id)));
    }
}
