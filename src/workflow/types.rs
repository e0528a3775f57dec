//! Core status types for the workflow domain
//!
//! This module contains the status values that flow from step execution
//! up to the aggregate run result.

#![allow(clippy::must_use_candidate)]

use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal status of a single executed step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Step completed with exit code 0
    Succeeded,
    /// Step exited non-zero or timed out
    Failed,
    /// Step's condition evaluated false, or an earlier step failed
    Skipped,
    /// Step never ran because the instance was cancelled
    Cancelled,
}

impl StepStatus {
    /// Returns true if this status does not fail the owning job
    #[must_use]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Skipped)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "SUCCEEDED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Skipped => write!(f, "SKIPPED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// Lifecycle state of a job instance
///
/// Transitions: `Pending -> Running -> {Succeeded, Failed, Cancelled}`.
/// `Skipped` is terminal too and covers instances whose declared
/// predecessors never reached [`JobStatus::Succeeded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Instance has not been scheduled yet
    Pending,
    /// Instance is executing steps
    Running,
    /// All steps finished with non-failing status
    Succeeded,
    /// A step failed, a secret was missing, or a timeout was exceeded
    Failed,
    /// Instance was cancelled before reaching a terminal step
    Cancelled,
    /// Instance never started because a predecessor did not succeed
    Skipped,
}

impl JobStatus {
    /// Returns true once the state machine can no longer move
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Cancelled | Self::Skipped
        )
    }

    /// Returns true if this status counts against the run aggregate
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Running => write!(f, "RUNNING"),
            Self::Succeeded => write!(f, "SUCCEEDED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// Aggregate result of a whole workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Every non-optional job instance succeeded or was skipped
    Succeeded,
    /// At least one non-optional instance failed or was cancelled
    Failed,
}

impl RunStatus {
    /// Returns true if the run succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "SUCCEEDED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Trait for types that can be validated
#[allow(clippy::missing_errors_doc)]
pub trait Validate {
    /// Type of validation error
    type Error;

    /// Validates this type
    fn validate(&self) -> std::result::Result<(), Self::Error>;
}
