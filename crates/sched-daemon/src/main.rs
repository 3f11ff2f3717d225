// SPDX-License-Identifier: MIT

//! Entry point: loads config, opens the store, wires the evaluator,
//! dispatcher, executor, and alert hook, spawns the background runtime
//! and the socket listener, then waits for Ctrl-C to shut everything
//! down together through one `CancellationToken`.

use std::sync::Arc;

use parking_lot::Mutex;
use sched_adapters::alert::{AlertFanout, AlertSender, ConsoleAlertSender};
use sched_adapters::background::TokioTaskServer;
use sched_adapters::registry::WorkflowRegistry;
use sched_core::SystemClock;
use sched_daemon::lifecycle;
use sched_engine::{AlertHook, Dispatcher, Evaluator, Executor, FileAdvisoryLock, ManifestStore, TriggerApi};
use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;

/// Maximum number of executions running concurrently inside this
/// process's `TokioTaskServer`. A ceiling on OS resources, distinct from
/// `SchedulerConfig::max_active_jobs`'s domain-level capacity cap.
const MAX_LOCAL_CONCURRENCY: usize = 64;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let (daemon, store) = lifecycle::startup()?;
    let config = daemon.config.clone();
    let store = Arc::new(Mutex::new(store));
    let clock = SystemClock;

    let senders: Vec<Arc<dyn AlertSender>> = vec![Arc::new(ConsoleAlertSender)];
    let alert_hook = Arc::new(AlertHook::new(
        Arc::clone(&store),
        std::collections::HashMap::new(),
        AlertFanout::new(senders),
        clock.clone(),
    ));

    let executor = Arc::new(Executor::new(
        Arc::clone(&store),
        WorkflowRegistry::new(),
        alert_hook,
        clock.clone(),
        config.clone(),
    ));
    let task_server = Arc::new(TokioTaskServer::new(executor, MAX_LOCAL_CONCURRENCY));

    let lock = FileAdvisoryLock::new(&daemon.paths.state_dir, sched_engine::MANIFEST_MANAGER_LOCK_KEY);
    let evaluator = Arc::new(Evaluator::new(Arc::clone(&store), lock, clock.clone(), config.clone()));
    let dispatcher =
        Arc::new(Dispatcher::new(Arc::clone(&store), Arc::clone(&task_server), clock.clone(), config.clone()));
    let trigger_api = Arc::new(TriggerApi::new(Arc::clone(&store), clock));
    let manifest_store = Arc::new(ManifestStore::new(Arc::clone(&store)));

    let cancel = CancellationToken::new();
    let runtime_handle =
        sched_engine::spawn(evaluator, dispatcher, Arc::clone(&store), config, cancel.clone());

    let listener = UnixListener::bind(&daemon.paths.socket_path)?;
    let listener_handle = tokio::spawn(sched_daemon::listener::run(
        listener,
        Arc::clone(&store),
        trigger_api,
        manifest_store,
        cancel.clone(),
    ));

    tracing::info!(socket = %daemon.paths.socket_path.display(), "listening");
    tokio::signal::ctrl_c().await?;
    tracing::info!("received shutdown signal");

    cancel.cancel();
    runtime_handle.join().await;
    let _ = listener_handle.await;

    if let Err(err) = store.lock().checkpoint(chrono::Utc::now()) {
        tracing::warn!(error = %err, "final checkpoint failed");
    }
    daemon.shutdown();

    Ok(())
}
