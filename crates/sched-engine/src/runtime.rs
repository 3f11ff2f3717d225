// SPDX-License-Identifier: MIT

//! Runtime: spawns the evaluator, dispatcher, and checkpoint loops as
//! long-lived cooperative tasks, each on its own `tokio::time::interval`
//! and all racing the shared `CancellationToken` so a daemon shutdown
//! stops them together rather than leaving one running past the others.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use sched_adapters::background::BackgroundTaskServer;
use sched_core::Clock;
use sched_store::Store;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::advisory_lock::AdvisoryLock;
use crate::config::SchedulerConfig;
use crate::dispatcher::Dispatcher;
use crate::evaluator::Evaluator;

/// Interval between store checkpoints. Independent of the evaluator's own
/// polling cadence — checkpointing is purely a WAL-truncation housekeeping
/// concern, not a scheduling one.
const CHECKPOINT_INTERVAL: Duration = Duration::from_secs(60);

/// Join handles for the spawned background loops, so a caller can await
/// clean shutdown after cancelling the token it was given.
pub struct RuntimeHandle {
    pub evaluator: Option<JoinHandle<()>>,
    pub dispatcher: JoinHandle<()>,
    pub checkpoint: JoinHandle<()>,
}

impl RuntimeHandle {
    pub async fn join(self) {
        if let Some(evaluator) = self.evaluator {
            let _ = evaluator.await;
        }
        let _ = self.dispatcher.await;
        let _ = self.checkpoint.await;
    }
}

/// Spawns the three long-lived tasks described in the concurrency model:
/// the evaluator (skipped entirely when `manifest_manager_enabled` is
/// false), the dispatcher, and a periodic store checkpoint. Each loop
/// holds the store lock only for the duration of one synchronous tick.
pub fn spawn<L, C, B>(
    evaluator: Arc<Evaluator<L, C>>,
    dispatcher: Arc<Dispatcher<B, C>>,
    store: Arc<Mutex<Store>>,
    config: SchedulerConfig,
    cancel: CancellationToken,
) -> RuntimeHandle
where
    L: AdvisoryLock + Send + Sync + 'static,
    C: Clock,
    B: BackgroundTaskServer + Send + Sync + 'static,
{
    let evaluator_handle = if config.manifest_manager_enabled {
        let cancel = cancel.clone();
        let interval = config.manifest_manager_polling_interval;
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(err) = evaluator.tick() {
                            tracing::warn!(error = %err, "evaluator tick failed");
                        }
                    }
                }
            }
        }))
    } else {
        tracing::info!("manifest manager disabled, evaluator loop not started");
        None
    };

    let dispatcher_handle = {
        let cancel = cancel.clone();
        let interval = config.job_dispatcher_polling_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(err) = dispatcher.tick().await {
                            tracing::warn!(error = %err, "dispatcher tick failed");
                        }
                    }
                }
            }
        })
    };

    let checkpoint_handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(CHECKPOINT_INTERVAL);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let mut guard = store.lock();
                        if guard.needs_flush() {
                            if let Err(err) = guard.checkpoint(Utc::now()) {
                                tracing::warn!(error = %err, "checkpoint failed");
                            }
                        }
                    }
                }
            }
        })
    };

    RuntimeHandle { evaluator: evaluator_handle, dispatcher: dispatcher_handle, checkpoint: checkpoint_handle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisory_lock::LocalAdvisoryLock;
    use sched_adapters::background::FakeTaskServer;
    use sched_core::manifest::ManifestBuilder;
    use sched_core::{Event, FakeClock};
    use sched_store::MigrationRegistry;
    use std::time::Duration as StdDuration;

    #[tokio::test(start_paused = true)]
    async fn evaluator_loop_enqueues_a_due_manifest_then_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let mut raw_store = Store::open(dir.path(), &MigrationRegistry::new()).unwrap();
        let manifest = ManifestBuilder::new("extract-0").interval(StdDuration::from_secs(60)).build();
        let manifest_id = manifest.id;
        raw_store.append(Event::ManifestUpserted { manifest }).unwrap();
        let store = Arc::new(Mutex::new(raw_store));

        let clock = FakeClock::new();
        clock.set_epoch_ms(1_000_000);
        let mut config = SchedulerConfig::default();
        config.manifest_manager_polling_interval = StdDuration::from_millis(10);
        config.job_dispatcher_polling_interval = StdDuration::from_millis(10);

        let evaluator = Arc::new(Evaluator::new(
            Arc::clone(&store),
            LocalAdvisoryLock::new(),
            clock.clone(),
            config.clone(),
        ));
        let task_server = Arc::new(FakeTaskServer::new());
        let dispatcher =
            Arc::new(Dispatcher::new(Arc::clone(&store), Arc::clone(&task_server), clock, config.clone()));

        let cancel = CancellationToken::new();
        let handle = spawn(evaluator, dispatcher, Arc::clone(&store), config, cancel.clone());

        tokio::time::advance(StdDuration::from_millis(25)).await;
        tokio::task::yield_now().await;

        assert!(store.lock().state().work_queue.values().any(|e| e.manifest_id == Some(manifest_id)));

        cancel.cancel();
        handle.join().await;
    }

    #[tokio::test]
    async fn evaluator_loop_is_not_spawned_when_manifest_manager_is_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let raw_store = Store::open(dir.path(), &MigrationRegistry::new()).unwrap();
        let store = Arc::new(Mutex::new(raw_store));

        let clock = FakeClock::new();
        let config = SchedulerConfig { manifest_manager_enabled: false, ..SchedulerConfig::default() };

        let evaluator =
            Arc::new(Evaluator::new(Arc::clone(&store), LocalAdvisoryLock::new(), clock.clone(), config.clone()));
        let task_server = Arc::new(FakeTaskServer::new());
        let dispatcher =
            Arc::new(Dispatcher::new(Arc::clone(&store), Arc::clone(&task_server), clock, config.clone()));

        let cancel = CancellationToken::new();
        let handle = spawn(evaluator, dispatcher, store, config, cancel.clone());
        assert!(handle.evaluator.is_none());

        cancel.cancel();
        handle.join().await;
    }
}
