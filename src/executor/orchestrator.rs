//! Run orchestration
//!
//! Schedules a validated workflow: expands every matrix up front, orders
//! jobs by their `needs` depth, and runs each dependency level as a batch
//! of worker threads, one per job instance. Instances within a level share
//! nothing but their cancellation flags and the report sink.

use super::runner::{CancelFlag, JobRunner};
use crate::infrastructure::RunnerConfig;
use crate::workflow::{
    JobInstance, JobReport, JobStatus, Jobs, RunReport, TriggerContext, Validate,
    WorkflowDefinition, WorkflowError, expand,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Instant;

/// Schedules and runs whole workflows
#[derive(Debug)]
pub struct Orchestrator {
    config: RunnerConfig,
}

/// One job's schedulable unit: its expanded instances plus the flag a
/// failing sibling raises under matrix fail-fast.
struct JobPlan {
    name: String,
    needs: Vec<String>,
    level: usize,
    cancel_siblings: bool,
    instances: Vec<(usize, JobInstance)>,
    cancel: CancelFlag,
}

impl Orchestrator {
    /// Creates an orchestrator with the given configuration
    #[must_use]
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    /// The active configuration
    #[must_use]
    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Runs a workflow to completion
    ///
    /// # Errors
    ///
    /// Returns a validation or matrix expansion error before any step
    /// runs. Step and job failures are not errors; they are reported in
    /// the returned [`RunReport`].
    pub fn run(
        &self,
        workflow: &WorkflowDefinition,
        trigger: &TriggerContext,
    ) -> Result<RunReport, WorkflowError> {
        self.run_with_cancel(workflow, trigger, &CancelFlag::new())
    }

    /// Runs a workflow with an externally owned cancellation flag
    ///
    /// Raising `run_cancel` (from a signal handler, another thread) stops
    /// the run at the next step boundary; already-running commands finish
    /// or hit their timeout first.
    ///
    /// # Errors
    ///
    /// Same contract as [`Orchestrator::run`].
    pub fn run_with_cancel(
        &self,
        workflow: &WorkflowDefinition,
        trigger: &TriggerContext,
        run_cancel: &CancelFlag,
    ) -> Result<RunReport, WorkflowError> {
        let start = Instant::now();
        workflow.validate()?;

        if !workflow.triggered_by(trigger.event) {
            tracing::info!(event = %trigger.event, "Workflow not triggered by event");
            return Ok(RunReport::from_jobs(Vec::new(), false, start.elapsed()));
        }

        // Expand everything before anything runs; a bad matrix aborts the
        // whole run instead of failing halfway through.
        let plans = plan(&workflow.jobs)?;
        let total: usize = plans.iter().map(|p| p.instances.len()).sum();
        tracing::info!(
            workflow = workflow.name.as_deref().unwrap_or("unnamed"),
            jobs = plans.len(),
            instances = total,
            "Run starting"
        );

        let process_env: HashMap<String, String> = std::env::vars().collect();
        let runner = JobRunner::new(&self.config, &workflow.env, &trigger.secrets, &process_env);

        let max_level = plans.iter().map(|p| p.level).max().unwrap_or(0);
        let mut succeeded: HashMap<&str, bool> = HashMap::new();
        let mut reports: Vec<(usize, JobReport)> = Vec::with_capacity(total);

        for level in 0..=max_level {
            let mut runnable: Vec<&JobPlan> = Vec::new();
            for current in plans.iter().filter(|p| p.level == level) {
                let gated = !current
                    .needs
                    .iter()
                    .all(|n| succeeded.get(n.as_str()).copied().unwrap_or(false));
                if gated {
                    tracing::warn!(job = %current.name, "Job skipped, unmet dependencies");
                    for (ordinal, instance) in &current.instances {
                        reports.push((*ordinal, skipped_report(&current.name, instance)));
                    }
                    succeeded.insert(&current.name, false);
                } else {
                    runnable.push(current);
                }
            }

            let sink: Mutex<Vec<(usize, JobReport)>> = Mutex::new(Vec::new());
            std::thread::scope(|scope| {
                for current in &runnable {
                    for (ordinal, instance) in &current.instances {
                        let runner = &runner;
                        let sink = &sink;
                        let config = &self.config;
                        scope.spawn(move || {
                            let report = runner.run(instance, &current.cancel, run_cancel);
                            if report.status.is_failure() {
                                if current.cancel_siblings {
                                    current.cancel.cancel();
                                }
                                if config.fail_fast && !report.optional {
                                    run_cancel.cancel();
                                }
                            }
                            sink.lock().push((*ordinal, report));
                        });
                    }
                }
            });

            let finished = sink.into_inner();
            for current in &runnable {
                let all_ok = finished
                    .iter()
                    .filter(|(_, r)| r.job == current.name)
                    .all(|(_, r)| r.status == JobStatus::Succeeded);
                succeeded.insert(&current.name, all_ok);
            }
            reports.extend(finished);
        }

        reports.sort_by_key(|(ordinal, _)| *ordinal);
        let jobs = reports.into_iter().map(|(_, report)| report).collect();
        let report = RunReport::from_jobs(jobs, true, start.elapsed());
        tracing::info!(
            run_id = %report.run_id,
            status = %report.status,
            duration_ms = report.duration_ms,
            "Run finished"
        );
        Ok(report)
    }
}

fn skipped_report(job: &str, instance: &JobInstance) -> JobReport {
    JobReport {
        job: job.to_string(),
        instance: instance.name.clone(),
        status: JobStatus::Skipped,
        optional: instance.job.continue_on_error,
        steps: Vec::new(),
        duration_ms: 0,
    }
}

/// Expands every job and assigns each its dependency depth
fn plan(jobs: &Jobs) -> Result<Vec<JobPlan>, WorkflowError> {
    let mut memo = HashMap::new();
    let mut plans = Vec::new();
    let mut ordinal = 0;

    for (name, job) in jobs.iter() {
        let instances = expand(name, job)?
            .into_iter()
            .map(|instance| {
                let numbered = (ordinal, instance);
                ordinal += 1;
                numbered
            })
            .collect();
        plans.push(JobPlan {
            name: name.to_string(),
            needs: job.needs.clone(),
            level: depth(jobs, name, &mut memo),
            cancel_siblings: job.strategy.as_ref().is_some_and(|s| s.fail_fast),
            instances,
            cancel: CancelFlag::new(),
        });
    }
    Ok(plans)
}

// Depth 0 for jobs without predecessors; validation has already rejected
// cycles, so the recursion terminates.
fn depth(jobs: &Jobs, name: &str, memo: &mut HashMap<String, usize>) -> usize {
    if let Some(&known) = memo.get(name) {
        return known;
    }
    let level = match jobs.get(name) {
        Some(job) if !job.needs.is_empty() => {
            1 + job
                .needs
                .iter()
                .map(|n| depth(jobs, n, memo))
                .max()
                .unwrap_or(0)
        }
        _ => 0,
    };
    memo.insert(name.to_string(), level);
    level
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{Event, Job, Matrix, Step, Strategy, StepStatus};
    use pretty_assertions::assert_eq;

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(RunnerConfig::default())
    }

    fn trigger() -> TriggerContext {
        TriggerContext::new(Event::Push)
    }

    const GREEN_PIPELINE: &str = r#"
name: ci
on: [push]
jobs:
  linting:
    strategy:
      matrix:
        python-version: ["3.9"]
    steps:
      - run: echo lint ok
  pytest:
    strategy:
      matrix:
        python-version: ["3.7.12", "3.8.12", "3.9.7", "3.10.1", "3.11.0"]
      fail_fast: false
    steps:
      - run: echo install for $MATRIX_PYTHON_VERSION
      - run: echo tests pass
"#;

    #[test]
    fn test_all_green_run() {
        let workflow = WorkflowDefinition::from_yaml(GREEN_PIPELINE).unwrap();
        let report = orchestrator().run(&workflow, &trigger()).unwrap();

        assert!(report.is_success());
        assert!(report.triggered);
        assert_eq!(report.jobs.len(), 6);
        assert!(report.jobs.iter().all(|j| j.status == JobStatus::Succeeded));

        // Declaration order survives parallel completion
        assert_eq!(report.jobs[0].instance, "linting (3.9)");
        assert_eq!(report.jobs[1].instance, "pytest (3.7.12)");
        assert_eq!(report.jobs[5].instance, "pytest (3.11.0)");
    }

    #[test]
    fn test_one_matrix_instance_fails_without_fail_fast() {
        let yaml = r#"
on: [push]
jobs:
  pytest:
    strategy:
      matrix:
        python-version: ["3.7", "3.8", "3.9"]
      fail_fast: false
    steps:
      - run: '[ "$MATRIX_PYTHON_VERSION" != "3.9" ] || exit 1'
      - run: echo ran for $MATRIX_PYTHON_VERSION
"#;
        let workflow = WorkflowDefinition::from_yaml(yaml).unwrap();
        let report = orchestrator().run(&workflow, &trigger()).unwrap();

        assert!(!report.is_success());
        let failed = report.instance("pytest (3.9)").unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.steps[1].status, StepStatus::Skipped);

        for sibling in ["pytest (3.7)", "pytest (3.8)"] {
            assert_eq!(
                report.instance(sibling).unwrap().status,
                JobStatus::Succeeded
            );
        }
    }

    #[test]
    fn test_matrix_fail_fast_cancels_siblings() {
        let yaml = r#"
jobs:
  test:
    strategy:
      matrix:
        speed: [fast, slow]
    steps:
      - run: '[ "$MATRIX_SPEED" = "slow" ] && sleep 1; [ "$MATRIX_SPEED" != "fast" ] || exit 1'
      - run: echo second step
"#;
        let workflow = WorkflowDefinition::from_yaml(yaml).unwrap();
        let report = orchestrator().run(&workflow, &trigger()).unwrap();

        assert!(!report.is_success());
        assert_eq!(
            report.instance("test (fast)").unwrap().status,
            JobStatus::Failed
        );
        assert_eq!(
            report.instance("test (slow)").unwrap().status,
            JobStatus::Cancelled
        );
    }

    #[test]
    fn test_needs_gating_skips_dependents() {
        let yaml = r#"
jobs:
  build:
    steps:
      - run: exit 1
  deploy:
    needs: [build]
    steps:
      - run: echo unreachable
  notify:
    needs: [deploy]
    steps:
      - run: echo also unreachable
"#;
        let workflow = WorkflowDefinition::from_yaml(yaml).unwrap();
        let report = orchestrator().run(&workflow, &trigger()).unwrap();

        assert!(!report.is_success());
        assert_eq!(report.instance("build").unwrap().status, JobStatus::Failed);
        assert_eq!(report.instance("deploy").unwrap().status, JobStatus::Skipped);
        assert_eq!(report.instance("notify").unwrap().status, JobStatus::Skipped);
    }

    #[test]
    fn test_needs_chain_runs_in_order() {
        let yaml = r#"
jobs:
  first:
    steps:
      - run: echo first
  second:
    needs: [first]
    steps:
      - run: echo second
"#;
        let workflow = WorkflowDefinition::from_yaml(yaml).unwrap();
        let report = orchestrator().run(&workflow, &trigger()).unwrap();
        assert!(report.is_success());
        assert_eq!(report.jobs.len(), 2);
    }

    #[test]
    fn test_global_fail_fast_cancels_other_jobs() {
        let yaml = r#"
jobs:
  fast:
    steps:
      - run: exit 1
  slow:
    steps:
      - run: sleep 1
      - run: echo second step
"#;
        let workflow = WorkflowDefinition::from_yaml(yaml).unwrap();
        let orchestrator = Orchestrator::new(RunnerConfig::default().with_fail_fast(true));
        let report = orchestrator.run(&workflow, &trigger()).unwrap();

        assert!(!report.is_success());
        assert_eq!(report.instance("fast").unwrap().status, JobStatus::Failed);
        assert_eq!(
            report.instance("slow").unwrap().status,
            JobStatus::Cancelled
        );
    }

    #[test]
    fn test_untriggered_event_runs_nothing() {
        let workflow = WorkflowDefinition::from_yaml(GREEN_PIPELINE).unwrap();
        let report = orchestrator()
            .run(&workflow, &TriggerContext::new(Event::Schedule))
            .unwrap();
        assert!(report.is_success());
        assert!(!report.triggered);
        assert!(report.jobs.is_empty());
    }

    #[test]
    fn test_optional_job_failure_keeps_run_green() {
        let yaml = r#"
jobs:
  flaky:
    continue_on_error: true
    steps:
      - run: exit 1
  solid:
    steps:
      - run: echo ok
"#;
        let workflow = WorkflowDefinition::from_yaml(yaml).unwrap();
        let report = orchestrator().run(&workflow, &trigger()).unwrap();
        assert!(report.is_success());
        assert_eq!(report.instance("flaky").unwrap().status, JobStatus::Failed);
    }

    #[test]
    fn test_secret_flows_and_is_redacted() {
        let yaml = r#"
jobs:
  pytest:
    env:
      CLIENT_SECRETS: ${{ secrets.CLIENT_SECRETS }}
    steps:
      - run: echo got $CLIENT_SECRETS
"#;
        let workflow = WorkflowDefinition::from_yaml(yaml).unwrap();
        let trigger = trigger().with_secret("CLIENT_SECRETS", "gcp-credentials-blob");
        let report = orchestrator().run(&workflow, &trigger).unwrap();

        assert!(report.is_success());
        let output = &report.instance("pytest").unwrap().steps[0].output;
        assert!(!output.contains("gcp-credentials-blob"));
        assert!(output.contains("***"));
    }

    #[test]
    fn test_missing_secret_scoped_to_its_instance() {
        let yaml = r#"
jobs:
  bad:
    env:
      TOKEN: ${{ secrets.UNBOUND }}
    steps:
      - run: echo unreachable
  good:
    steps:
      - run: echo fine
"#;
        let workflow = WorkflowDefinition::from_yaml(yaml).unwrap();
        let report = orchestrator().run(&workflow, &trigger()).unwrap();

        assert!(!report.is_success());
        assert_eq!(report.instance("bad").unwrap().status, JobStatus::Failed);
        assert_eq!(report.instance("good").unwrap().status, JobStatus::Succeeded);
    }

    #[test]
    fn test_external_cancellation() {
        let yaml = r#"
jobs:
  a:
    steps:
      - run: echo hi
"#;
        let workflow = WorkflowDefinition::from_yaml(yaml).unwrap();
        let cancel = CancelFlag::new();
        cancel.cancel();
        let report = orchestrator()
            .run_with_cancel(&workflow, &trigger(), &cancel)
            .unwrap();
        assert!(!report.is_success());
        assert_eq!(report.instance("a").unwrap().status, JobStatus::Cancelled);
    }

    #[test]
    fn test_invalid_matrix_aborts_before_running() {
        let job = Job::builder()
            .step(Step::run("echo never"))
            .strategy(Strategy {
                matrix: Matrix::new().axis("python", vec![]),
                exclude: Vec::new(),
                fail_fast: true,
            })
            .build_unchecked();
        let workflow = WorkflowDefinition::builder()
            .job("test", job)
            .build_unchecked();
        let err = orchestrator().run(&workflow, &trigger()).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidMatrix { .. }));
    }

    #[test]
    fn test_depth_levels() {
        let yaml = r#"
jobs:
  a:
    steps: [{run: echo a}]
  b:
    needs: [a]
    steps: [{run: echo b}]
  c:
    needs: [a, b]
    steps: [{run: echo c}]
"#;
        let workflow = WorkflowDefinition::from_yaml(yaml).unwrap();
        let mut memo = HashMap::new();
        assert_eq!(depth(&workflow.jobs, "a", &mut memo), 0);
        assert_eq!(depth(&workflow.jobs, "b", &mut memo), 1);
        assert_eq!(depth(&workflow.jobs, "c", &mut memo), 2);
    }
}
