//! Workflow domain types and logic

// Make submodules public
pub mod condition;
pub mod definition;
pub mod environment;
pub mod errors;
pub mod matrix;
pub mod report;
pub mod steps;
pub mod trigger;
pub mod types;

use serde::{Deserialize, Serialize};

// Re-export public types from submodules
pub use condition::StepCondition;
pub use definition::{Job, JobBuilder, Jobs, WorkflowBuilder, WorkflowDefinition};
pub use environment::{REDACTED, ResolvedEnv, SecretStore, resolve};
pub use errors::{ValidationError, WorkflowError};
pub use matrix::{JobInstance, Matrix, MatrixAxis, Strategy, expand};
pub use report::{JobReport, RunReport, StepReport};
pub use steps::{Step, StepAction};
pub use trigger::{Event, TriggerContext};
pub use types::{JobStatus, RunStatus, StepStatus, Validate};

/// Defines environment variables at workflow, job, or step scope.
///
/// Values may carry `${{ secrets.NAME }}` references, resolved by
/// [`environment::resolve`] at the moment an instance starts running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Environment {
    /// Environment variables as key-value pairs.
    #[serde(flatten)]
    pub vars: std::collections::HashMap<String, String>,
}

impl Environment {
    /// Creates a new empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an environment variable.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Gets an environment variable by name.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&String> {
        self.vars.get(key)
    }

    /// Returns true if no variables are set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Iterates over the variables.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.vars.iter()
    }
}
