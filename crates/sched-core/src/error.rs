// SPDX-License-Identifier: MIT

//! Error taxonomy shared across the scheduler core.
//!
//! Kinds, not type names: every fallible operation in the scheduler maps
//! into one of these variants so callers can decide, once, how each kind
//! propagates (absorbed in-cycle, surfaced to a caller, or fatal to a step).

use thiserror::Error;

/// Errors a [`crate::manifest::Manifest`] or schedule can violate.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum SchedulerError {
    /// Unique-index violation on a WorkQueue insert. Absorbed silently by
    /// the evaluator: another entry already covers this manifest's pending work.
    #[error("manifest {0} already has queued work")]
    DuplicateQueued(String),

    /// Referenced manifest does not exist.
    #[error("unknown manifest: {0}")]
    UnknownManifest(String),

    /// `UpsertDependent` referenced a parent that does not exist.
    #[error("unknown parent manifest: {0}")]
    UnknownParent(String),

    /// No workflow is registered under this input type name.
    #[error("unregistered workflow for input type: {0}")]
    UnregisteredWorkflow(String),

    /// Executor loaded an execution not in `pending` state.
    #[error("illegal retry: execution {0} is not pending")]
    IllegalRetry(String),

    /// One of the four dormant-activation preconditions failed.
    #[error("invalid dormant activation: {0}")]
    InvalidDormantActivation(DormantActivationError),

    /// A manifest would create a cycle in the depends_on graph.
    #[error("manifest {child} depending on {parent} would create a dependency cycle")]
    DependencyCycle { child: String, parent: String },

    /// A schedule_type invariant from the data model was violated.
    #[error("invalid schedule configuration: {0}")]
    InvalidSchedule(String),

    /// Store-level failure; retried on the next tick, never fatal to the process.
    #[error("transient store error: {0}")]
    TransientStore(String),

    /// An internal invariant was violated (e.g. a manifest expected to be
    /// loaded was missing). Crashes the current cycle; the next tick retries.
    #[error("internal invariant violated: {0}")]
    InternalInvariantViolated(String),
}

/// The four preconditions guarding dormant-dependent activation.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum DormantActivationError {
    #[error("not currently inside an execution")]
    NotInExecution,
    #[error("child manifest not found")]
    UnknownManifest,
    #[error("child manifest is not schedule_type=dormant_dependent")]
    NotDormant,
    #[error("child manifest does not depend on the activating parent")]
    NotChildOfParent,
}

/// Result alias used throughout the scheduler core.
pub type SchedulerResult<T> = Result<T, SchedulerError>;
