// SPDX-License-Identifier: MIT

//! Alert senders: the transport side of the alert hook. The hook itself
//! (windowing, debouncing, filtering) lives in the engine crate; senders
//! here only know how to fan a built [`AlertContext`] out to a human.

use async_trait::async_trait;
use sched_core::alert::AlertContext;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlertSendError {
    #[error("send failed: {0}")]
    SendFailed(String),
}

#[async_trait]
pub trait AlertSender: Send + Sync + 'static {
    async fn send(&self, ctx: &AlertContext) -> Result<(), AlertSendError>;
}

fn format_alert(ctx: &AlertContext) -> (String, String) {
    let title = format!("{} is failing", ctx.workflow_name);
    let body = format!(
        "{} failures since {}{}",
        ctx.failure_count,
        ctx.first_failure_ms,
        match ctx.last_success_ms {
            Some(ms) => format!(" (last success at {ms})"),
            None => " (no prior success)".to_string(),
        }
    );
    (title, body)
}

/// Logs the alert as a structured warning. The default sender: always
/// available, never fails, suitable as the lone sender in single-node
/// deployments without desktop notification support.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleAlertSender;

#[async_trait]
impl AlertSender for ConsoleAlertSender {
    async fn send(&self, ctx: &AlertContext) -> Result<(), AlertSendError> {
        tracing::warn!(
            workflow = %ctx.workflow_name,
            failures = ctx.failure_count,
            first_failure_ms = ctx.first_failure_ms,
            last_success_ms = ?ctx.last_success_ms,
            exception_frequency = ?ctx.exception_frequency,
            "alert threshold crossed"
        );
        Ok(())
    }
}

/// Desktop notification sender using notify-rust.
///
/// On macOS, `notify-rust` uses `mac-notification-sys` (Cocoa bindings) to
/// send notifications via the Notification Center. The first notification
/// triggers `ensure_application_set()`, which runs an AppleScript lookup
/// for a bundle identifier; in a daemon without Automation permissions
/// that AppleScript blocks forever. The bundle id is pre-set at
/// construction time to bypass the lookup entirely.
#[derive(Clone, Copy, Debug, Default)]
pub struct DesktopAlertSender;

impl DesktopAlertSender {
    pub fn new() -> Self {
        #[cfg(target_os = "macos")]
        {
            let _ = mac_notification_sys::set_application("com.apple.Terminal");
        }
        Self
    }
}

#[async_trait]
impl AlertSender for DesktopAlertSender {
    async fn send(&self, ctx: &AlertContext) -> Result<(), AlertSendError> {
        let (title, body) = format_alert(ctx);
        // notify_rust::Notification::show() is synchronous on macOS.
        // Fire-and-forget on tokio's bounded blocking thread pool to avoid
        // blocking the async runtime while capping OS thread count.
        tokio::task::spawn_blocking(move || {
            tracing::info!(%title, %body, "sending desktop alert");
            match notify_rust::Notification::new().summary(&title).body(&body).show() {
                Ok(_) => tracing::info!(%title, "desktop alert sent"),
                Err(e) => tracing::warn!(%title, error = %e, "desktop alert failed"),
            }
        });
        Ok(())
    }
}

/// Fans an alert out to every registered sender in parallel. An individual
/// sender's failure is logged, not propagated, so one broken transport
/// never suppresses the others.
pub struct AlertFanout {
    senders: Vec<std::sync::Arc<dyn AlertSender>>,
}

impl AlertFanout {
    pub fn new(senders: Vec<std::sync::Arc<dyn AlertSender>>) -> Self {
        Self { senders }
    }

    pub async fn send_all(&self, ctx: &AlertContext) {
        let mut set = tokio::task::JoinSet::new();
        for sender in &self.senders {
            let sender = std::sync::Arc::clone(sender);
            let ctx = ctx.clone();
            set.spawn(async move {
                if let Err(e) = sender.send(&ctx).await {
                    tracing::warn!(workflow = %ctx.workflow_name, error = %e, "alert sender failed");
                }
            });
        }
        while set.join_next().await.is_some() {}
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{AlertSendError, AlertSender};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use sched_core::alert::AlertContext;
    use std::sync::Arc;

    /// Records every context it was sent, for assertions in alert hook tests.
    #[derive(Clone, Default)]
    pub struct FakeAlertSender {
        sent: Arc<Mutex<Vec<AlertContext>>>,
    }

    impl FakeAlertSender {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn sent(&self) -> Vec<AlertContext> {
            self.sent.lock().clone()
        }
    }

    #[async_trait]
    impl AlertSender for FakeAlertSender {
        async fn send(&self, ctx: &AlertContext) -> Result<(), AlertSendError> {
            self.sent.lock().push(ctx.clone());
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeAlertSender;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sample_ctx() -> AlertContext {
        AlertContext {
            workflow_name: "billing.sync".to_string(),
            failure_count: 3,
            exception_frequency: HashMap::from([("Timeout".to_string(), 3)]),
            first_failure_ms: 1_000,
            last_success_ms: Some(500),
            sample_failed_inputs: vec![serde_json::json!({"tenant": "acme"})],
        }
    }

    #[tokio::test]
    async fn console_sender_never_fails() {
        let sender = ConsoleAlertSender;
        assert!(sender.send(&sample_ctx()).await.is_ok());
    }

    #[tokio::test]
    async fn fanout_reaches_every_sender() {
        let a = FakeAlertSender::new();
        let b = FakeAlertSender::new();
        let fanout = AlertFanout::new(vec![
            std::sync::Arc::new(a.clone()),
            std::sync::Arc::new(b.clone()),
        ]);
        fanout.send_all(&sample_ctx()).await;
        assert_eq!(a.sent().len(), 1);
        assert_eq!(b.sent().len(), 1);
    }

    #[tokio::test]
    async fn fanout_continues_past_a_failing_sender() {
        struct AlwaysFails;
        #[async_trait]
        impl AlertSender for AlwaysFails {
            async fn send(&self, _ctx: &AlertContext) -> Result<(), AlertSendError> {
                Err(AlertSendError::SendFailed("unreachable".to_string()))
            }
        }

        let ok = FakeAlertSender::new();
        let fanout = AlertFanout::new(vec![std::sync::Arc::new(AlwaysFails), std::sync::Arc::new(ok.clone())]);
        fanout.send_all(&sample_ctx()).await;
        assert_eq!(ok.sent().len(), 1);
    }
}
