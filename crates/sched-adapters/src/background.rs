// SPDX-License-Identifier: MIT

//! Worker pool contract: enqueue, schedule-at, try-cancel.
//!
//! Dispatch only ever hands an execution id and its input to this trait;
//! everything about failure counting and retries lives in the scheduler's
//! own metadata table, not here. The pool's only further obligation is to
//! eventually call the registered [`TaskHandler`] with that id and input.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sched_core::execution::ExecutionId;
use uuid::Uuid;

/// Invoked by the pool, at-least-once, with the execution id and
/// deserialized input it was enqueued with. This is the executor's entry
/// point (see the engine crate); the pool itself never inspects `input`.
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    async fn handle(&self, execution_id: ExecutionId, input: serde_json::Value);
}

/// Advisory handle to a scheduled or in-flight task. Used only for
/// cancellation; losing it does not leak anything beyond the ability to
/// cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(Uuid);

impl TaskHandle {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

#[async_trait]
pub trait BackgroundTaskServer: Send + Sync + 'static {
    /// Run `input` for `execution_id` immediately.
    async fn enqueue(&self, execution_id: ExecutionId, input: serde_json::Value) -> TaskHandle;

    /// Run `input` for `execution_id` no earlier than `at`.
    async fn schedule_at(
        &self,
        execution_id: ExecutionId,
        input: serde_json::Value,
        at: DateTime<Utc>,
    ) -> TaskHandle;

    /// Best-effort cancellation. Returns `false` if the task already
    /// started, already finished, or the handle is unknown.
    async fn try_cancel(&self, handle: TaskHandle) -> bool;
}

/// Executes synchronously inside `enqueue`, completing before it returns.
/// `schedule_at` ignores the requested instant and also runs immediately —
/// scenario tests advance time through a [`sched_core::FakeClock`] and
/// drive ticks explicitly rather than waiting on a real scheduled task.
/// Cancellation is always a no-op since nothing is ever still in flight.
pub struct InlineTaskServer<H> {
    handler: Arc<H>,
}

impl<H: TaskHandler> InlineTaskServer<H> {
    pub fn new(handler: Arc<H>) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl<H: TaskHandler> BackgroundTaskServer for InlineTaskServer<H> {
    async fn enqueue(&self, execution_id: ExecutionId, input: serde_json::Value) -> TaskHandle {
        self.handler.handle(execution_id, input).await;
        TaskHandle::new()
    }

    async fn schedule_at(
        &self,
        execution_id: ExecutionId,
        input: serde_json::Value,
        _at: DateTime<Utc>,
    ) -> TaskHandle {
        self.handler.handle(execution_id, input).await;
        TaskHandle::new()
    }

    async fn try_cancel(&self, _handle: TaskHandle) -> bool {
        false
    }
}

/// Bounded-concurrency pool backed by `tokio::task::spawn`, gated by a
/// semaphore so a burst of dispatches can't unboundedly fan out OS work.
pub struct TokioTaskServer<H> {
    handler: Arc<H>,
    semaphore: Arc<tokio::sync::Semaphore>,
    handles: Arc<parking_lot::Mutex<HashMap<Uuid, tokio::task::AbortHandle>>>,
}

impl<H: TaskHandler> TokioTaskServer<H> {
    pub fn new(handler: Arc<H>, max_concurrency: usize) -> Self {
        Self {
            handler,
            semaphore: Arc::new(tokio::sync::Semaphore::new(max_concurrency)),
            handles: Arc::new(parking_lot::Mutex::new(HashMap::new())),
        }
    }

    fn spawn(&self, execution_id: ExecutionId, input: serde_json::Value) -> TaskHandle {
        let handle = TaskHandle::new();
        let handler = Arc::clone(&self.handler);
        let semaphore = Arc::clone(&self.semaphore);
        let handles = Arc::clone(&self.handles);
        let id = handle.0;
        let join = tokio::spawn(async move {
            let _permit = semaphore.acquire().await;
            handler.handle(execution_id, input).await;
            handles.lock().remove(&id);
        });
        self.handles.lock().insert(id, join.abort_handle());
        handle
    }
}

#[async_trait]
impl<H: TaskHandler> BackgroundTaskServer for TokioTaskServer<H> {
    async fn enqueue(&self, execution_id: ExecutionId, input: serde_json::Value) -> TaskHandle {
        self.spawn(execution_id, input)
    }

    async fn schedule_at(
        &self,
        execution_id: ExecutionId,
        input: serde_json::Value,
        at: DateTime<Utc>,
    ) -> TaskHandle {
        let handle = TaskHandle::new();
        let handler = Arc::clone(&self.handler);
        let semaphore = Arc::clone(&self.semaphore);
        let handles = Arc::clone(&self.handles);
        let id = handle.0;
        let delay = (at - Utc::now()).to_std().unwrap_or(std::time::Duration::ZERO);
        let join = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _permit = semaphore.acquire().await;
            handler.handle(execution_id, input).await;
            handles.lock().remove(&id);
        });
        self.handles.lock().insert(id, join.abort_handle());
        handle
    }

    async fn try_cancel(&self, handle: TaskHandle) -> bool {
        match self.handles.lock().remove(&handle.0) {
            Some(abort) => {
                abort.abort();
                true
            }
            None => false,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{BackgroundTaskServer, TaskHandle};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use parking_lot::Mutex;
    use sched_core::execution::ExecutionId;
    use std::sync::Arc;

    /// Recorded enqueue/schedule call, for assertions in dispatcher tests.
    #[derive(Debug, Clone)]
    pub struct RecordedTask {
        pub execution_id: ExecutionId,
        pub input: serde_json::Value,
        pub at: Option<DateTime<Utc>>,
    }

    /// Records every call instead of running anything, for tests that only
    /// want to assert on dispatch decisions.
    #[derive(Clone, Default)]
    pub struct FakeTaskServer {
        calls: Arc<Mutex<Vec<RecordedTask>>>,
        cancelled: Arc<Mutex<Vec<TaskHandle>>>,
    }

    impl FakeTaskServer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn calls(&self) -> Vec<RecordedTask> {
            self.calls.lock().clone()
        }

        pub fn cancelled(&self) -> Vec<TaskHandle> {
            self.cancelled.lock().clone()
        }
    }

    #[async_trait]
    impl BackgroundTaskServer for FakeTaskServer {
        async fn enqueue(&self, execution_id: ExecutionId, input: serde_json::Value) -> TaskHandle {
            self.calls.lock().push(RecordedTask { execution_id, input, at: None });
            TaskHandle::new()
        }

        async fn schedule_at(
            &self,
            execution_id: ExecutionId,
            input: serde_json::Value,
            at: DateTime<Utc>,
        ) -> TaskHandle {
            self.calls.lock().push(RecordedTask { execution_id, input, at: Some(at) });
            TaskHandle::new()
        }

        async fn try_cancel(&self, handle: TaskHandle) -> bool {
            self.cancelled.lock().push(handle);
            true
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeTaskServer, RecordedTask};

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct RecordingHandler {
        calls: Mutex<Vec<(ExecutionId, serde_json::Value)>>,
    }

    #[async_trait]
    impl TaskHandler for RecordingHandler {
        async fn handle(&self, execution_id: ExecutionId, input: serde_json::Value) {
            self.calls.lock().push((execution_id, input));
        }
    }

    #[tokio::test]
    async fn inline_server_runs_the_handler_before_enqueue_returns() {
        let handler = Arc::new(RecordingHandler { calls: Mutex::new(Vec::new()) });
        let server = InlineTaskServer::new(Arc::clone(&handler));
        let id = ExecutionId::new();
        server.enqueue(id, serde_json::json!({"n": 1})).await;
        assert_eq!(handler.calls.lock().len(), 1);
        assert_eq!(handler.calls.lock()[0].0, id);
    }

    #[tokio::test]
    async fn inline_server_schedule_at_also_runs_immediately() {
        let handler = Arc::new(RecordingHandler { calls: Mutex::new(Vec::new()) });
        let server = InlineTaskServer::new(Arc::clone(&handler));
        server
            .schedule_at(ExecutionId::new(), serde_json::Value::Null, Utc::now() + chrono::Duration::hours(1))
            .await;
        assert_eq!(handler.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn inline_server_try_cancel_is_always_false() {
        let handler = Arc::new(RecordingHandler { calls: Mutex::new(Vec::new()) });
        let server = InlineTaskServer::new(handler);
        let handle = server.enqueue(ExecutionId::new(), serde_json::Value::Null).await;
        assert!(!server.try_cancel(handle).await);
    }

    #[tokio::test]
    async fn tokio_server_runs_the_handler_and_supports_cancellation() {
        let handler = Arc::new(RecordingHandler { calls: Mutex::new(Vec::new()) });
        let server = TokioTaskServer::new(Arc::clone(&handler), 4);
        let id = ExecutionId::new();
        let handle = server.enqueue(id, serde_json::json!({"ok": true})).await;
        // Give the spawned task a chance to run before asserting.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(handler.calls.lock().len(), 1);
        // Already completed: cancellation no longer finds the handle.
        assert!(!server.try_cancel(handle).await);
    }

    #[tokio::test]
    async fn tokio_server_schedule_at_can_be_cancelled_before_it_fires() {
        let handler = Arc::new(RecordingHandler { calls: Mutex::new(Vec::new()) });
        let server = TokioTaskServer::new(Arc::clone(&handler), 4);
        let far_future = Utc::now() + chrono::Duration::hours(1);
        let handle = server.schedule_at(ExecutionId::new(), serde_json::Value::Null, far_future).await;
        assert!(server.try_cancel(handle).await);
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(handler.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn fake_task_server_records_enqueue_and_schedule_calls() {
        let server = FakeTaskServer::new();
        let id = ExecutionId::new();
        server.enqueue(id, serde_json::json!({"a": 1})).await;
        server.schedule_at(ExecutionId::new(), serde_json::Value::Null, Utc::now()).await;
        let calls = server.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].execution_id, id);
        assert!(calls[0].at.is_none());
        assert!(calls[1].at.is_some());
    }
}
