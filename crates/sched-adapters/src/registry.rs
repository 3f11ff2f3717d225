// SPDX-License-Identifier: MIT

//! Workflow registry: resolves a user workflow by its declared input type
//! name. Registration is an explicit list supplied by the caller at
//! startup — there is no assembly scan or reflection, just a map built
//! once and looked up many times.

use std::collections::HashMap;
use std::sync::Arc;

use sched_core::workflow::Workflow;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("no workflow registered for input type {0:?}")]
    Unregistered(String),
    #[error("input type {0:?} is already registered")]
    DuplicateRegistration(String),
}

/// Maps `input_type_name` to the workflow that handles it.
#[derive(Clone, Default)]
pub struct WorkflowRegistry {
    workflows: HashMap<String, Arc<dyn Workflow>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `workflow` for `input_type_name`. Returns an error instead
    /// of silently overwriting an existing registration.
    pub fn register(
        &mut self,
        input_type_name: impl Into<String>,
        workflow: Arc<dyn Workflow>,
    ) -> Result<(), RegistryError> {
        let input_type_name = input_type_name.into();
        if self.workflows.contains_key(&input_type_name) {
            return Err(RegistryError::DuplicateRegistration(input_type_name));
        }
        self.workflows.insert(input_type_name, workflow);
        Ok(())
    }

    pub fn lookup(&self, input_type_name: &str) -> Result<Arc<dyn Workflow>, RegistryError> {
        self.workflows
            .get(input_type_name)
            .cloned()
            .ok_or_else(|| RegistryError::Unregistered(input_type_name.to_string()))
    }

    pub fn validate_registration(&self, input_type_name: &str) -> bool {
        self.workflows.contains_key(input_type_name)
    }

    pub fn registered_types(&self) -> Vec<&str> {
        self.workflows.keys().map(String::as_str).collect()
    }
}
