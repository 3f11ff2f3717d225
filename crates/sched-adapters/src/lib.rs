// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Outward-facing adapters: the background task server the dispatcher
//! hands work to, the workflow registry the executor resolves workflows
//! through, and the alert senders the alert hook fans out to.

pub mod alert;
pub mod background;
pub mod registry;

pub use alert::{AlertFanout, AlertSendError, AlertSender, ConsoleAlertSender, DesktopAlertSender};
pub use background::{BackgroundTaskServer, InlineTaskServer, TaskHandle, TaskHandler, TokioTaskServer};
pub use registry::{RegistryError, WorkflowRegistry};

#[cfg(any(test, feature = "test-support"))]
pub use alert::FakeAlertSender;
#[cfg(any(test, feature = "test-support"))]
pub use background::{FakeTaskServer, RecordedTask};
