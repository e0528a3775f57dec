//! # Runline - A minimal CI workflow orchestrator
//!
//! Runline runs declarative CI workflows locally: named jobs made of shell
//! steps, matrix expansion into parallel instances, `needs` dependencies,
//! layered environments with secret injection and redaction, and fail-fast
//! policies at the job, matrix, and run level.
//!
//! ## Quick Start
//!
//! ```no_run
//! use runline::executor::Orchestrator;
//! use runline::infrastructure::RunnerConfig;
//! use runline::workflow::{Event, TriggerContext, WorkflowDefinition};
//!
//! # fn main() -> anyhow::Result<()> {
//! let workflow = WorkflowDefinition::from_yaml(r#"
//! name: ci
//! on: [push]
//! jobs:
//!   test:
//!     strategy:
//!       matrix:
//!         python-version: ["3.8", "3.9"]
//!       fail_fast: false
//!     steps:
//!       - run: echo testing on $MATRIX_PYTHON_VERSION
//! "#)?;
//!
//! let orchestrator = Orchestrator::new(RunnerConfig::default());
//! let trigger = TriggerContext::new(Event::Push);
//! let report = orchestrator.run(&workflow, &trigger)?;
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Declarative workflows**: YAML documents with jobs, steps, and triggers
//! - **Matrix expansion**: Cartesian product of axes minus explicit excludes
//! - **Dependency gating**: `needs` ordering with cycle detection at load time
//! - **Secret handling**: `${{ secrets.NAME }}` injection, output redaction
//! - **Fail-fast control**: per job, per matrix, and for the whole run
//!
//! ## License
//!
//! Licensed under either of
//! - Apache License, Version 2.0 (<https://www.apache.org/licenses/LICENSE-2.0>)
//! - MIT license (<https://opensource.org/licenses/MIT>)
//!
//! at your option.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod executor;
pub mod infrastructure;
pub mod workflow;

// Prelude module for common imports
pub mod prelude;

// Re-export commonly used types
pub use executor::{
    CancelFlag, JobRunner, Orchestrator, ShellCommand, ShellConfig, ShellResult, StepExecutor,
    expand_variables,
};
pub use infrastructure::{RunnerConfig, init_logging};
pub use workflow::{
    Environment, Event, Job, JobInstance, JobReport, JobStatus, Matrix, RunReport, RunStatus,
    SecretStore, Step, StepCondition, StepReport, StepStatus, Strategy, TriggerContext, Validate,
    ValidationError, WorkflowDefinition, WorkflowError,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
