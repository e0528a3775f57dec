//! Error types for the workflow domain

use thiserror::Error;

/// Errors that can occur while loading or executing a workflow
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    /// Workflow document failed validation
    #[error("Configuration error: {0}")]
    Validation(#[from] ValidationError),

    /// A matrix axis expanded to zero values
    #[error("Invalid matrix in job '{job}': axis '{axis}' has no values")]
    InvalidMatrix {
        /// Name of the job carrying the matrix.
        job: String,
        /// Name of the offending axis.
        axis: String,
    },

    /// A referenced secret has no bound value at run time
    #[error("Missing secret: no value bound for '{name}'")]
    MissingSecret {
        /// Name of the unresolved secret.
        name: String,
    },

    /// A step's command or action exited non-zero
    #[error("Step '{step}' failed with exit code {code}")]
    StepFailed {
        /// Name of the step that failed.
        step: String,
        /// Exit code returned by the command.
        code: i32,
    },

    /// A step or job exceeded its wall-clock bound
    #[error("Timeout after {duration:?}")]
    Timeout {
        /// Duration before timeout.
        duration: std::time::Duration,
    },

    /// Execution was cancelled externally
    #[error("Execution cancelled")]
    Cancelled,

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for WorkflowError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Validation errors for workflow documents
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Document could not be parsed
    #[error("Malformed workflow document: {message}")]
    Malformed {
        /// Parser error message.
        message: String,
    },

    /// Name cannot be empty
    #[error("Name cannot be empty")]
    EmptyName,

    /// Name too long
    #[error("Name too long: max {max} characters, got {len}")]
    NameTooLong {
        /// Maximum allowed length.
        max: usize,
        /// Actual length of the name.
        len: usize,
    },

    /// Workflow must declare at least one job
    #[error("Workflow must have at least one job")]
    EmptyWorkflow,

    /// Two jobs share the same name
    #[error("Duplicate job name: '{job}'")]
    DuplicateJob {
        /// The repeated job name.
        job: String,
    },

    /// Job must have at least one step
    #[error("Job '{job}' must have at least one step")]
    EmptyJob {
        /// Name of the empty job.
        job: String,
    },

    /// A step declares both `run` and `uses`
    #[error("Step '{step}' declares both 'run' and 'uses'")]
    AmbiguousStep {
        /// Name of the step.
        step: String,
    },

    /// A step declares neither `run` nor `uses`
    #[error("Step '{step}' declares neither 'run' nor 'uses'")]
    MissingCommand {
        /// Name of the step.
        step: String,
    },

    /// A `needs` entry references a job that does not exist
    #[error("Job '{job}' needs unknown job '{needs}'")]
    UnknownDependency {
        /// The dependent job.
        job: String,
        /// The missing predecessor.
        needs: String,
    },

    /// The job dependency graph contains a cycle
    #[error("Dependency cycle involving job '{job}'")]
    DependencyCycle {
        /// A job on the cycle.
        job: String,
    },

    /// A step condition could not be parsed
    #[error("Invalid condition expression: '{expression}'")]
    InvalidCondition {
        /// The unparseable expression.
        expression: String,
    },
}
