//! Prelude module for common imports

// Re-export all workflow types with full paths
pub use crate::workflow::condition::StepCondition;
pub use crate::workflow::definition::{Job, JobBuilder, Jobs, WorkflowBuilder, WorkflowDefinition};
pub use crate::workflow::environment::{REDACTED, ResolvedEnv, SecretStore, resolve};
pub use crate::workflow::errors::{ValidationError, WorkflowError};
pub use crate::workflow::matrix::{JobInstance, Matrix, MatrixAxis, Strategy, expand};
pub use crate::workflow::report::{JobReport, RunReport, StepReport};
pub use crate::workflow::steps::{Step, StepAction};
pub use crate::workflow::trigger::{Event, TriggerContext};
pub use crate::workflow::types::{JobStatus, RunStatus, StepStatus, Validate};
pub use crate::workflow::Environment;

// Re-export executor types
pub use crate::executor::{
    CancelFlag, JobRunner, Orchestrator, ShellCommand, ShellConfig, ShellResult, StepExecutor,
};

// Re-export infrastructure types
pub use crate::infrastructure::RunnerConfig;
