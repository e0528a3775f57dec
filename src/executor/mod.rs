//! Execution engine
//!
//! Four layers, each owning one concern:
//!
//! - [`ShellCommand`] runs a single command with an explicit environment
//! - [`StepExecutor`] maps step declarations onto commands and reports
//! - [`JobRunner`] drives one job instance through its lifecycle
//! - [`Orchestrator`] schedules instances across dependency levels

pub mod orchestrator;
pub mod runner;
pub mod shell;
pub mod step;

pub use orchestrator::Orchestrator;
pub use runner::{CancelFlag, JobRunner};
pub use shell::{ShellCommand, ShellConfig, ShellResult, expand_variables};
pub use step::StepExecutor;
