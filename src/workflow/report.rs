//! Execution reports
//!
//! Immutable records of what a run did: per-step exit status and redacted
//! output, per-instance terminal state, and the aggregate run result.

#![allow(clippy::must_use_candidate)]

use super::types::{JobStatus, RunStatus, StepStatus};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Outcome of one executed (or skipped) step
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    /// Step display name
    pub name: String,
    /// Terminal status
    pub status: StepStatus,
    /// Exit code, when the step actually ran a command
    pub exit_code: Option<i32>,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
    /// Captured output, secret-redacted
    pub output: String,
}

impl StepReport {
    /// A report for a step that never ran
    pub(crate) fn not_run(name: impl Into<String>, status: StepStatus, reason: &str) -> Self {
        Self {
            name: name.into(),
            status,
            exit_code: None,
            duration_ms: 0,
            output: reason.to_string(),
        }
    }
}

/// Outcome of one job instance
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    /// Name of the owning job
    pub job: String,
    /// Instance name (matrix cells carry their combination)
    pub instance: String,
    /// Terminal state
    pub status: JobStatus,
    /// Whether this job's failure counts against the run
    pub optional: bool,
    /// Step reports in execution order
    pub steps: Vec<StepReport>,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

impl JobReport {
    /// Steps that failed
    pub fn failed_steps(&self) -> impl Iterator<Item = &StepReport> {
        self.steps
            .iter()
            .filter(|s| matches!(s.status, StepStatus::Failed))
    }
}

impl fmt::Display for JobReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.instance, self.status)
    }
}

/// Aggregate result of a workflow run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Unique run id
    pub run_id: Uuid,
    /// Aggregate status
    pub status: RunStatus,
    /// False when the trigger event did not match the workflow's `on` list
    pub triggered: bool,
    /// All job instance reports
    pub jobs: Vec<JobReport>,
    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

impl RunReport {
    /// Builds the aggregate report from instance reports
    ///
    /// The run fails if any non-optional instance ended `Failed` or
    /// `Cancelled`.
    pub fn from_jobs(jobs: Vec<JobReport>, triggered: bool, duration: Duration) -> Self {
        let failed = jobs.iter().any(|j| !j.optional && j.status.is_failure());
        Self {
            run_id: Uuid::new_v4(),
            status: if failed {
                RunStatus::Failed
            } else {
                RunStatus::Succeeded
            },
            triggered,
            jobs,
            duration_ms: duration_ms(duration),
        }
    }

    /// Returns true if the run succeeded
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Instances that failed or were cancelled
    pub fn failures(&self) -> impl Iterator<Item = &JobReport> {
        self.jobs.iter().filter(|j| j.status.is_failure())
    }

    /// Looks up an instance report by its instance name
    pub fn instance(&self, name: &str) -> Option<&JobReport> {
        self.jobs.iter().find(|j| j.instance == name)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run {} - {}", self.run_id, self.status)?;
        for job in &self.jobs {
            writeln!(f, "  {job}")?;
            for step in &job.steps {
                writeln!(f, "    [{}] {}", step.status, step.name)?;
            }
        }
        Ok(())
    }
}

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
