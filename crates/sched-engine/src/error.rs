// SPDX-License-Identifier: MIT

//! Engine-level error taxonomy: wraps the lower crates' errors so
//! evaluator/dispatcher/executor code has one `?`-friendly result type.

use thiserror::Error;

use crate::executor::ExecutorError;
use crate::trigger_api::TriggerError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Scheduler(#[from] sched_core::SchedulerError),
    #[error(transparent)]
    Store(#[from] sched_store::StoreError),
    #[error(transparent)]
    Registry(#[from] sched_adapters::RegistryError),
    #[error(transparent)]
    Alert(#[from] sched_adapters::AlertSendError),
    #[error(transparent)]
    Executor(#[from] ExecutorError),
    #[error(transparent)]
    Trigger(#[from] TriggerError),
}

pub type EngineResult<T> = Result<T, EngineError>;
