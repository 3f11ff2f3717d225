// SPDX-License-Identifier: MIT

//! End-to-end scenarios for the scheduler, each driven entirely through a
//! `FakeClock` and explicit `.tick()` calls on the evaluator/dispatcher —
//! no wall-clock sleeping anywhere in this file.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sched_adapters::background::{FakeTaskServer, InlineTaskServer};
use sched_adapters::registry::WorkflowRegistry;
use sched_adapters::AlertFanout;
use sched_core::manifest::ManifestBuilder;
use sched_core::manifest_group::ManifestGroup;
use sched_core::workflow::{ChainWorkflow, Step, StepContext, StepError, Workflow, WorkflowOutcome};
use sched_core::{DeadLetterStatus, Event, FakeClock, ManifestId, WorkflowState};
use sched_engine::advisory_lock::{FileAdvisoryLock, LocalAdvisoryLock};
use sched_engine::alert_hook::AlertHook;
use sched_engine::config::SchedulerConfig;
use sched_engine::dispatcher::Dispatcher;
use sched_engine::dormant::Activator;
use sched_engine::evaluator::Evaluator;
use sched_engine::executor::Executor;
use sched_engine::trigger_api::{TriggerApi, TriggerOutcome};
use sched_store::{MigrationRegistry, Store};

fn new_store() -> (tempfile::TempDir, Arc<Mutex<Store>>) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::open(dir.path(), &MigrationRegistry::new()).unwrap();
    (dir, Arc::new(Mutex::new(store)))
}

fn no_op_alert_hook(store: Arc<Mutex<Store>>, clock: FakeClock) -> Arc<AlertHook<FakeClock>> {
    Arc::new(AlertHook::new(store, HashMap::new(), AlertFanout::new(vec![]), clock))
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

fn trivial_workflow() -> Arc<dyn Workflow> {
    Arc::new(ChainWorkflow::new(vec![Box::new(AlwaysOk)]))
}

struct AlwaysTimesOut;

#[async_trait]
impl Step for AlwaysTimesOut {
    fn name(&self) -> &str {
        "call_upstream"
    }
    async fn run(&self, _ctx: &mut StepContext) -> Result<(), StepError> {
        Err(StepError {
            step: self.name().into(),
            exception: "TimeoutException".into(),
            reason: "upstream did not respond".into(),
            stack_trace: None,
        })
    }
}

/// Activates its declared dormant child through the ambient task-local
/// context the executor binds around a manifest-backed run.
struct ActivatesDormantChild {
    child_external_id: &'static str,
    runtime_input: serde_json::Value,
}

#[async_trait]
impl Workflow for ActivatesDormantChild {
    async fn run(&self, _input: serde_json::Value) -> WorkflowOutcome {
        let activator = sched_engine::dormant::current().expect("executor should have bound an activator");
        activator
            .activate(self.child_external_id, self.runtime_input.clone(), 1_000)
            .expect("activation should succeed");
        WorkflowOutcome::Success(serde_json::Value::Null)
    }
}

/// Scenario 1: a single interval manifest, ticked across simulated time,
/// completes exactly as many times as its interval divides into the
/// elapsed window.
#[tokio::test]
async fn single_interval_manifest_runs_three_times_in_sixty_five_seconds() {
    let (_dir, store) = new_store();
    let manifest = ManifestBuilder::new("hello")
        .workflow_name("hello")
        .input_type_name("hello.Input")
        .interval(Duration::from_secs(20))
        .last_successful_run(0)
        .build();
    let manifest_id = manifest.id;
    store.lock().append(Event::ManifestUpserted { manifest }).unwrap();

    let mut registry = WorkflowRegistry::new();
    registry.register("hello.Input", trivial_workflow()).unwrap();

    let clock = FakeClock::new();
    let alert_hook = no_op_alert_hook(Arc::clone(&store), clock.clone());
    let executor =
        Arc::new(Executor::new(Arc::clone(&store), registry, alert_hook, clock.clone(), SchedulerConfig::default()));
    let task_server = Arc::new(InlineTaskServer::new(executor));
    let dispatcher = Dispatcher::new(Arc::clone(&store), task_server, clock.clone(), SchedulerConfig::default());
    let evaluator = Evaluator::new(Arc::clone(&store), LocalAdvisoryLock::new(), clock.clone(), SchedulerConfig::default());

    for elapsed_secs in [20u64, 40, 60, 65] {
        clock.set_epoch_ms(elapsed_secs * 1_000);
        evaluator.tick().unwrap();
        dispatcher.tick().await.unwrap();
    }

    let guard = store.lock();
    let completed = guard
        .state()
        .executions
        .values()
        .filter(|e| e.manifest_id == Some(manifest_id) && e.workflow_state == WorkflowState::Completed)
        .count();
    assert_eq!(completed, 3);
}

/// Scenario 2: a ten-way fan-out of extract → transform → dq dependency
/// chains. Each chain must complete in strict parent-before-child order.
#[tokio::test]
async fn dependency_chains_complete_in_strict_order() {
    let (_dir, store) = new_store();

    let mut registry = WorkflowRegistry::new();
    registry.register("extract.Input", trivial_workflow()).unwrap();
    registry.register("transform.Input", trivial_workflow()).unwrap();
    registry.register("dq.Input", trivial_workflow()).unwrap();

    let mut chains = Vec::new();
    for i in 0..10 {
        let extract = ManifestBuilder::new(format!("extract-{i}"))
            .workflow_name("extract")
            .input_type_name("extract.Input")
            .interval(Duration::from_secs(300))
            .build();
        let extract_id = extract.id;
        let transform = ManifestBuilder::new(format!("transform-{i}"))
            .workflow_name("transform")
            .input_type_name("transform.Input")
            .dependent_on(extract_id)
            .build();
        let transform_id = transform.id;
        let dq = ManifestBuilder::new(format!("dq-{i}"))
            .workflow_name("dq")
            .input_type_name("dq.Input")
            .dependent_on(transform_id)
            .build();
        let dq_id = dq.id;

        let mut guard = store.lock();
        guard.append(Event::ManifestUpserted { manifest: extract }).unwrap();
        guard.append(Event::ManifestUpserted { manifest: transform }).unwrap();
        guard.append(Event::ManifestUpserted { manifest: dq }).unwrap();
        drop(guard);

        chains.push((extract_id, transform_id, dq_id));
    }

    let clock = FakeClock::new();
    let alert_hook = no_op_alert_hook(Arc::clone(&store), clock.clone());
    let executor =
        Arc::new(Executor::new(Arc::clone(&store), registry, alert_hook, clock.clone(), SchedulerConfig::default()));
    let task_server = Arc::new(InlineTaskServer::new(executor));
    let dispatcher = Dispatcher::new(Arc::clone(&store), task_server, clock.clone(), SchedulerConfig::default());
    let evaluator = Evaluator::new(Arc::clone(&store), LocalAdvisoryLock::new(), clock.clone(), SchedulerConfig::default());

    // Three rounds: extract fires first, transform becomes eligible once
    // extract's last_successful_run advances, then dq once transform's does.
    for round in 1..=3u64 {
        clock.set_epoch_ms(round * 1_000);
        evaluator.tick().unwrap();
        dispatcher.tick().await.unwrap();
    }

    let guard = store.lock();
    let end_time_for = |manifest_id: ManifestId| -> u64 {
        guard
            .state()
            .executions
            .values()
            .find(|e| e.manifest_id == Some(manifest_id) && e.workflow_state == WorkflowState::Completed)
            .and_then(|e| e.end_time_ms)
            .expect("each manifest in the chain should have completed exactly once")
    };

    let completed_total = guard
        .state()
        .executions
        .values()
        .filter(|e| e.workflow_state == WorkflowState::Completed)
        .count();
    assert_eq!(completed_total, 30);

    for (extract_id, transform_id, dq_id) in chains {
        let extract_end = end_time_for(extract_id);
        let transform_end = end_time_for(transform_id);
        let dq_end = end_time_for(dq_id);
        assert!(extract_end < transform_end, "extract should finish strictly before its transform");
        assert!(transform_end < dq_end, "transform should finish strictly before its dq step");
    }
}

/// Scenario 3: two priority groups compete for a global capacity ceiling.
/// Higher-priority group A fills its own cap first; group B takes the
/// global leftovers; nothing left queued starves once prior work frees up.
#[tokio::test]
async fn layered_capacity_dispatches_highest_priority_first_without_starving_the_rest() {
    let (_dir, store) = new_store();

    let mut group_a = ManifestGroup::new("group-a");
    group_a.priority = 20;
    group_a.max_active_jobs = Some(3);
    let group_a_id = group_a.id;
    let mut group_b = ManifestGroup::new("group-b");
    group_b.priority = 10;
    group_b.max_active_jobs = Some(3);
    let group_b_id = group_b.id;

    {
        let mut guard = store.lock();
        guard.append(Event::ManifestGroupUpserted { group: group_a }).unwrap();
        guard.append(Event::ManifestGroupUpserted { group: group_b }).unwrap();

        let mut created_at = 0u64;
        for (label, group_id) in [("a", group_a_id), ("a", group_a_id), ("a", group_a_id), ("a", group_a_id)]
            .into_iter()
            .chain([("b", group_b_id), ("b", group_b_id), ("b", group_b_id), ("b", group_b_id)])
        {
            let manifest = ManifestBuilder::new(format!("{label}-{created_at}"))
                .interval(Duration::from_secs(60))
                .group(group_id)
                .build();
            let manifest_id = manifest.id;
            guard.append(Event::ManifestUpserted { manifest }).unwrap();
            let entry = sched_core::work_queue::WorkQueueEntry::new_queued(
                Some(manifest_id),
                "wf",
                "Input",
                serde_json::json!({}),
                0,
                created_at,
            );
            guard.append(Event::WorkQueued { entry }).unwrap();
            created_at += 1;
        }
    }

    let config = SchedulerConfig { max_active_jobs: Some(5), ..SchedulerConfig::default() };
    let task_server = Arc::new(FakeTaskServer::new());
    let dispatcher = Dispatcher::new(Arc::clone(&store), Arc::clone(&task_server), FakeClock::new(), config);

    let first = dispatcher.tick().await.unwrap();
    assert_eq!(first.dispatched, 5);

    {
        let guard = store.lock();
        let dispatched = guard
            .state()
            .work_queue
            .values()
            .filter(|e| e.status == sched_core::work_queue::WorkQueueStatus::Dispatched)
            .count();
        let queued = guard
            .state()
            .work_queue
            .values()
            .filter(|e| e.status == sched_core::work_queue::WorkQueueStatus::Queued)
            .count();
        assert_eq!(dispatched, 5);
        assert_eq!(queued, 3);
    }

    // Free up the capacity the first cycle used, the same way real work
    // finishing would: complete every dispatched execution.
    let in_flight: Vec<_> = {
        let guard = store.lock();
        guard
            .state()
            .work_queue
            .values()
            .filter_map(|e| e.metadata_id)
            .collect()
    };
    {
        let mut guard = store.lock();
        for metadata_id in in_flight {
            guard
                .append(Event::ExecutionCompleted { metadata_id, end_time_ms: 1_000, output: serde_json::Value::Null })
                .unwrap();
        }
    }

    let second = dispatcher.tick().await.unwrap();
    assert_eq!(second.dispatched, 3);

    let guard = store.lock();
    assert!(guard.state().work_queue.values().all(|e| e.status == sched_core::work_queue::WorkQueueStatus::Dispatched));
}

/// Scenario 4: a manifest that always fails is dead-lettered the tick
/// after its failure count reaches `max_retries`, never before.
#[tokio::test]
async fn exhausted_retries_promote_to_exactly_one_dead_letter() {
    let (_dir, store) = new_store();
    let manifest = ManifestBuilder::new("flaky")
        .workflow_name("flaky")
        .input_type_name("flaky.Input")
        .interval(Duration::from_secs(1))
        .max_retries(2)
        .build();
    let manifest_id = manifest.id;
    store.lock().append(Event::ManifestUpserted { manifest }).unwrap();

    let mut registry = WorkflowRegistry::new();
    registry.register("flaky.Input", Arc::new(ChainWorkflow::new(vec![Box::new(AlwaysTimesOut)]))).unwrap();

    let clock = FakeClock::new();
    let alert_hook = no_op_alert_hook(Arc::clone(&store), clock.clone());
    let executor =
        Arc::new(Executor::new(Arc::clone(&store), registry, alert_hook, clock.clone(), SchedulerConfig::default()));
    let task_server = Arc::new(InlineTaskServer::new(executor));
    let dispatcher = Dispatcher::new(Arc::clone(&store), task_server, clock.clone(), SchedulerConfig::default());
    let evaluator = Evaluator::new(Arc::clone(&store), LocalAdvisoryLock::new(), clock.clone(), SchedulerConfig::default());

    clock.set_epoch_ms(1_000);
    let first = evaluator.tick().unwrap();
    assert_eq!(first.dead_lettered, 0);
    dispatcher.tick().await.unwrap();

    clock.set_epoch_ms(2_000);
    let second = evaluator.tick().unwrap();
    assert_eq!(second.dead_lettered, 0);
    dispatcher.tick().await.unwrap();

    clock.set_epoch_ms(3_000);
    let third = evaluator.tick().unwrap();
    assert_eq!(third.dead_lettered, 1);
    assert_eq!(third.enqueued, 0);

    let guard = store.lock();
    let dead_letters: Vec<_> = guard.state().dead_letters.values().filter(|dl| dl.manifest_id == manifest_id).collect();
    assert_eq!(dead_letters.len(), 1);
    assert_eq!(dead_letters[0].status, DeadLetterStatus::AwaitingIntervention);
    assert!(dead_letters[0].reason.contains("max retries"));
}

/// Scenario 5: a parent execution activates a declared dormant child at
/// runtime. Re-activating the same child while its work is still queued
/// is absorbed, not duplicated.
#[tokio::test]
async fn dormant_child_is_activated_once_and_reactivation_is_idempotent() {
    let (_dir, store) = new_store();
    let parent = ManifestBuilder::new("extract-tx-5")
        .workflow_name("extract")
        .input_type_name("extract.Input")
        .interval(Duration::from_secs(60))
        .build();
    let parent_id = parent.id;
    let child = ManifestBuilder::new("dq-tx-5")
        .workflow_name("dq")
        .input_type_name("dq.Input")
        .dormant_dependent_on(parent_id)
        .build();
    let child_id = child.id;
    {
        let mut guard = store.lock();
        guard.append(Event::ManifestUpserted { manifest: parent }).unwrap();
        guard.append(Event::ManifestUpserted { manifest: child }).unwrap();
    }

    let mut registry = WorkflowRegistry::new();
    registry
        .register(
            "extract.Input",
            Arc::new(ActivatesDormantChild {
                child_external_id: "dq-tx-5",
                runtime_input: serde_json::json!({"anomalyCount": 7}),
            }),
        )
        .unwrap();

    let clock = FakeClock::new();
    let alert_hook = no_op_alert_hook(Arc::clone(&store), clock.clone());
    let executor =
        Arc::new(Executor::new(Arc::clone(&store), registry, alert_hook, clock.clone(), SchedulerConfig::default()));
    let task_server = Arc::new(InlineTaskServer::new(executor));
    let dispatcher = Dispatcher::new(Arc::clone(&store), task_server, clock.clone(), SchedulerConfig::default());
    let evaluator = Evaluator::new(Arc::clone(&store), LocalAdvisoryLock::new(), clock.clone(), SchedulerConfig::default());

    clock.set_epoch_ms(1_000);
    evaluator.tick().unwrap();
    dispatcher.tick().await.unwrap();

    {
        let guard = store.lock();
        let queued_for_child: Vec<_> = guard
            .state()
            .work_queue
            .values()
            .filter(|e| e.manifest_id == Some(child_id))
            .collect();
        assert_eq!(queued_for_child.len(), 1);
        assert_eq!(queued_for_child[0].status, sched_core::work_queue::WorkQueueStatus::Queued);
        assert_eq!(queued_for_child[0].input, serde_json::json!({"anomalyCount": 7}));
    }

    // Reactivating while the child's work is still queued must not create
    // a second entry.
    let activator = Activator::new(Arc::clone(&store), parent_id, 0);
    activator.activate("dq-tx-5", serde_json::json!({"anomalyCount": 99}), 2_000).unwrap();

    let guard = store.lock();
    let queued_for_child =
        guard.state().work_queue.values().filter(|e| e.manifest_id == Some(child_id)).count();
    assert_eq!(queued_for_child, 1);
}

/// Scenario 6: two evaluators sharing one store and a filesystem advisory
/// lock never produce more than one queued row per cycle for the same
/// due manifest, even though both tick every simulated second.
#[tokio::test]
async fn two_evaluators_sharing_a_lock_never_double_enqueue() {
    let (_dir, store) = new_store();
    let manifest = ManifestBuilder::new("ticker")
        .workflow_name("ticker")
        .input_type_name("ticker.Input")
        .interval(Duration::from_secs(1))
        .last_successful_run(0)
        .build();
    let manifest_id = manifest.id;
    store.lock().append(Event::ManifestUpserted { manifest }).unwrap();

    let mut registry = WorkflowRegistry::new();
    registry.register("ticker.Input", trivial_workflow()).unwrap();

    let clock = FakeClock::new();
    let alert_hook = no_op_alert_hook(Arc::clone(&store), clock.clone());
    let executor =
        Arc::new(Executor::new(Arc::clone(&store), registry, alert_hook, clock.clone(), SchedulerConfig::default()));
    let task_server = Arc::new(InlineTaskServer::new(executor));
    let dispatcher = Dispatcher::new(Arc::clone(&store), task_server, clock.clone(), SchedulerConfig::default());

    let lock_dir = tempfile::tempdir().unwrap();
    let lock_key = "ticker-evaluator";
    let evaluator_a = Evaluator::new(
        Arc::clone(&store),
        FileAdvisoryLock::new(lock_dir.path(), lock_key),
        clock.clone(),
        SchedulerConfig::default(),
    );
    let evaluator_b = Evaluator::new(
        Arc::clone(&store),
        FileAdvisoryLock::new(lock_dir.path(), lock_key),
        clock.clone(),
        SchedulerConfig::default(),
    );

    for second in 1..=30u64 {
        clock.set_epoch_ms(second * 1_000);
        evaluator_a.tick().unwrap();
        evaluator_b.tick().unwrap();
        dispatcher.tick().await.unwrap();
    }

    let guard = store.lock();
    let total_rows =
        guard.state().work_queue.values().filter(|e| e.manifest_id == Some(manifest_id)).count();
    assert!(total_rows <= 31, "expected at most 31 work queue rows, got {total_rows}");
}

/// Sanity check that the trigger API's manual path and the evaluator's
/// scheduled path both respect the same work-queue uniqueness the other
/// scenarios rely on.
#[tokio::test]
async fn manual_trigger_is_absorbed_when_evaluator_already_queued_the_same_manifest() {
    let (_dir, store) = new_store();
    let manifest = ManifestBuilder::new("hello").interval(Duration::from_secs(20)).build();
    let manifest_id = manifest.id;
    store.lock().append(Event::ManifestUpserted { manifest }).unwrap();

    let clock = FakeClock::new();
    clock.set_epoch_ms(20_000);
    let evaluator = Evaluator::new(Arc::clone(&store), LocalAdvisoryLock::new(), clock.clone(), SchedulerConfig::default());
    evaluator.tick().unwrap();

    let trigger = TriggerApi::new(Arc::clone(&store), clock);
    let outcome = trigger.trigger("hello", None).unwrap();
    assert_eq!(outcome, TriggerOutcome::AlreadyQueued);

    let guard = store.lock();
    assert_eq!(
        guard.state().work_queue.values().filter(|e| e.manifest_id == Some(manifest_id)).count(),
        1
    );
}
