//! Job instance execution
//!
//! Drives one job instance through its lifecycle:
//! `Pending -> Running -> {Succeeded, Failed, Cancelled}`. The environment
//! is resolved once, at the transition into `Running`, so every step of the
//! instance sees the same snapshot.

use super::step::StepExecutor;
use crate::infrastructure::RunnerConfig;
use crate::workflow::report::{JobReport, StepReport, duration_ms};
use crate::workflow::{
    Environment, JobInstance, JobStatus, SecretStore, StepCondition, StepStatus, WorkflowError,
    resolve,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// A one-way cancellation signal shared between threads
#[derive(Debug, Default)]
pub struct CancelFlag(AtomicBool);

impl CancelFlag {
    /// Creates a new, unset flag
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the flag; cannot be undone
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`CancelFlag::cancel`] has been called
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs job instances to a terminal state
#[derive(Debug, Clone)]
pub struct JobRunner<'a> {
    config: &'a RunnerConfig,
    workflow_env: &'a Environment,
    secrets: &'a SecretStore,
    process_env: &'a HashMap<String, String>,
}

impl<'a> JobRunner<'a> {
    /// Creates a runner sharing the run-wide context
    #[must_use]
    pub fn new(
        config: &'a RunnerConfig,
        workflow_env: &'a Environment,
        secrets: &'a SecretStore,
        process_env: &'a HashMap<String, String>,
    ) -> Self {
        Self {
            config,
            workflow_env,
            secrets,
            process_env,
        }
    }

    /// Runs one instance to completion
    ///
    /// Steps run strictly in order; the first failing step skips the rest
    /// of the instance unless the job disables fail-fast or a later step
    /// carries an `always`/`failure` condition. The cancellation flags are
    /// checked between steps and once more after the last one; a running
    /// command is never killed by cancellation.
    #[must_use]
    pub fn run(
        &self,
        instance: &JobInstance,
        job_cancel: &CancelFlag,
        run_cancel: &CancelFlag,
    ) -> JobReport {
        let start = Instant::now();
        let job = &instance.job;
        tracing::info!(instance = %instance.name, "Job starting");

        if job_cancel.is_cancelled() || run_cancel.is_cancelled() {
            return self.terminal(instance, JobStatus::Cancelled, Vec::new(), start);
        }

        // Pending -> Running: resolve the environment once for the whole
        // instance. A dangling secret reference fails the instance before
        // any step runs.
        let matrix_env = instance.matrix_env();
        let layers = [self.workflow_env, &job.env, &matrix_env];
        let base_env = match resolve(self.process_env, &layers, self.secrets) {
            Ok(env) => env,
            Err(err) => {
                tracing::error!(instance = %instance.name, error = %err, "Environment resolution failed");
                let steps = vec![StepReport::not_run(
                    "resolve environment",
                    StepStatus::Failed,
                    &err.to_string(),
                )];
                return self.terminal(instance, JobStatus::Failed, steps, start);
            }
        };

        let deadline = job
            .timeout_minutes
            .map(|minutes| start + Duration::from_secs(minutes * 60));

        let executor = StepExecutor::new(self.config);
        let mut steps = Vec::with_capacity(job.steps.len());
        let mut job_failed = false;
        let mut cancelled = false;

        for step in &job.steps {
            if job_cancel.is_cancelled() || run_cancel.is_cancelled() {
                cancelled = true;
                steps.push(StepReport::not_run(
                    step.display_name(),
                    StepStatus::Cancelled,
                    &WorkflowError::Cancelled.to_string(),
                ));
                continue;
            }

            let remaining = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        job_failed = true;
                        steps.push(StepReport::not_run(
                            step.display_name(),
                            StepStatus::Failed,
                            "job timeout exceeded",
                        ));
                        continue;
                    }
                    Some(deadline - now)
                }
                None => None,
            };

            // After a failure, only `always()` and `failure()` steps keep
            // running; every other condition is skipped with the rest.
            if job_failed && job.fail_fast {
                let opted_in = matches!(
                    step.condition,
                    Some(StepCondition::Always | StepCondition::Failure)
                );
                if !opted_in {
                    steps.push(StepReport::not_run(
                        step.display_name(),
                        StepStatus::Skipped,
                        "previous step failed",
                    ));
                    continue;
                }
            }

            // Step env is the highest-precedence layer, resolved on top of
            // the same stack the instance snapshot was built from.
            let env = if step.env.is_empty() {
                base_env.clone()
            } else {
                let layers = [self.workflow_env, &job.env, &matrix_env, &step.env];
                match resolve(self.process_env, &layers, self.secrets) {
                    Ok(env) => env,
                    Err(err) => {
                        job_failed = true;
                        steps.push(StepReport::not_run(
                            step.display_name(),
                            StepStatus::Failed,
                            &err.to_string(),
                        ));
                        continue;
                    }
                }
            };

            let step_timeout = step.timeout_secs.map(Duration::from_secs);
            let timeout = match (step_timeout, remaining) {
                (Some(step), Some(budget)) => Some(step.min(budget)),
                (one, other) => one.or(other),
            };

            let report = executor.execute(step, &env, &self.config.working_dir, job_failed, timeout);
            if report.status == StepStatus::Failed && !job_failed {
                job_failed = true;
            }
            steps.push(report);
        }

        // A flag raised while the final step was in flight must not let the
        // instance report Succeeded.
        if !job_failed && (job_cancel.is_cancelled() || run_cancel.is_cancelled()) {
            cancelled = true;
        }

        let status = if cancelled {
            JobStatus::Cancelled
        } else if job_failed {
            JobStatus::Failed
        } else {
            JobStatus::Succeeded
        };
        self.terminal(instance, status, steps, start)
    }

    fn terminal(
        &self,
        instance: &JobInstance,
        status: JobStatus,
        steps: Vec<StepReport>,
        start: Instant,
    ) -> JobReport {
        match status {
            JobStatus::Succeeded => tracing::info!(instance = %instance.name, "Job succeeded"),
            other => tracing::warn!(instance = %instance.name, status = %other, "Job finished"),
        }
        JobReport {
            job: instance.job_name.clone(),
            instance: instance.name.clone(),
            status,
            optional: instance.job.continue_on_error,
            steps,
            duration_ms: duration_ms(start.elapsed()),
        }
    }
}
