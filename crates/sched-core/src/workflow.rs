// SPDX-License-Identifier: MIT

//! User workflow abstraction: a chain of steps over a typed memory bag.
//!
//! A full workflow execution engine with a persistent step registry, retry
//! policies per step, and cross-process resumption is its own system; this
//! module supplies the minimal shape the executor needs to invoke one: a
//! `Workflow` resolved by input-type name, running a sequence of `Step`s
//! over an explicit `type_id -> value` context instead of reflection-based
//! property injection.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// How a step participates in the chain. No runtime reflection: a step's
/// kind and its input/output types are declared once, at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Ordinary step: runs, may mutate the memory bag.
    Plain,
    /// May stop the chain early without that being a failure.
    ShortCircuit,
    /// Pulls a value out of the bag for a side effect, leaves the bag intact.
    Extract,
    /// Delegates to a nested sequence of steps (sub-workflow).
    Chain,
}

/// A typed memory bag threaded through a workflow's steps, keyed by the
/// `TypeId` of the stored value — an explicit context map in place of
/// reflection-based DI scopes.
#[derive(Default)]
pub struct StepContext {
    bag: HashMap<TypeId, Box<dyn Any + Send>>,
}

impl StepContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<T: Send + 'static>(&mut self, value: T) {
        self.bag.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn get<T: Send + 'static>(&self) -> Option<&T> {
        self.bag.get(&TypeId::of::<T>()).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn take<T: Send + 'static>(&mut self) -> Option<T> {
        self.bag.remove(&TypeId::of::<T>()).and_then(|v| v.downcast::<T>().ok()).map(|b| *b)
    }

    pub fn contains<T: Send + 'static>(&self) -> bool {
        self.bag.contains_key(&TypeId::of::<T>())
    }
}

impl fmt::Debug for StepContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepContext").field("entries", &self.bag.len()).finish()
    }
}

/// A single step in a workflow's chain.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;
    fn kind(&self) -> StepKind {
        StepKind::Plain
    }
    async fn run(&self, ctx: &mut StepContext) -> Result<(), StepError>;
}

#[derive(Debug, Clone)]
pub struct StepError {
    pub step: String,
    pub exception: String,
    pub reason: String,
    pub stack_trace: Option<String>,
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step {} failed: {} ({})", self.step, self.exception, self.reason)
    }
}

impl std::error::Error for StepError {}

/// Outcome of a `Workflow::run` invocation: a sum value, success carrying a
/// result or failure carrying a captured exception.
pub enum WorkflowOutcome {
    Success(serde_json::Value),
    Failure(StepError),
}

/// The interface the executor invokes, resolved from the workflow registry
/// by input type name.
#[async_trait]
pub trait Workflow: Send + Sync {
    async fn run(&self, input: serde_json::Value) -> WorkflowOutcome;
}

/// A workflow built from an explicit, ordered list of steps, keyed by
/// their static input/output type pair, minus any reflection: the list is
/// supplied by the caller at construction.
pub struct ChainWorkflow {
    steps: Vec<Box<dyn Step>>,
}

impl ChainWorkflow {
    pub fn new(steps: Vec<Box<dyn Step>>) -> Self {
        Self { steps }
    }
}

#[async_trait]
impl Workflow for ChainWorkflow {
    async fn run(&self, input: serde_json::Value) -> WorkflowOutcome {
        let mut ctx = StepContext::new();
        ctx.insert(input);
        for step in &self.steps {
            if let Err(e) = step.run(&mut ctx).await {
                return WorkflowOutcome::Failure(e);
            }
            if step.kind() == StepKind::ShortCircuit {
                break;
            }
        }
        let output = ctx.take::<serde_json::Value>().unwrap_or(serde_json::Value::Null);
        WorkflowOutcome::Success(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysOk;

    #[async_trait]
    impl Step for AlwaysOk {
        fn name(&self) -> &str {
            "always_ok"
        }
        async fn run(&self, ctx: &mut StepContext) -> Result<(), StepError> {
            ctx.insert(serde_json::json!({"ran": true}));
            Ok(())
        }
    }

    struct AlwaysFail;

    #[async_trait]
    impl Step for AlwaysFail {
        fn name(&self) -> &str {
            "always_fail"
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

    #[tokio::test]
    async fn chain_workflow_success_carries_output() {
        let wf = ChainWorkflow::new(vec![Box::new(AlwaysOk)]);
        match wf.run(serde_json::json!({"x": 1})).await {
            WorkflowOutcome::Success(out) => assert_eq!(out, serde_json::json!({"ran": true})),
            WorkflowOutcome::Failure(_) => panic!("expected success"),
        }
    }

    #[tokio::test]
    async fn chain_workflow_failure_carries_step_and_exception() {
        let wf = ChainWorkflow::new(vec![Box::new(AlwaysFail)]);
        match wf.run(serde_json::json!({})).await {
            WorkflowOutcome::Success(_) => panic!("expected failure"),
            WorkflowOutcome::Failure(err) => {
                assert_eq!(err.step, "always_fail");
                assert_eq!(err.exception, "BoomException");
            }
        }
    }

    #[test]
    fn step_context_round_trips_typed_values() {
        let mut ctx = StepContext::new();
        ctx.insert(42u32);
        ctx.insert("hello".to_string());
        assert_eq!(ctx.get::<u32>(), Some(&42));
        assert_eq!(ctx.take::<String>(), Some("hello".to_string()));
        assert!(!ctx.contains::<String>());
    }
}
