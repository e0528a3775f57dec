//! Step execution
//!
//! Runs a single step to completion with a resolved environment snapshot.
//! All captured output is secret-redacted before it leaves this module.

use super::shell::{ShellCommand, ShellConfig, ShellResult};
use crate::infrastructure::RunnerConfig;
use crate::workflow::report::{StepReport, duration_ms};
use crate::workflow::{ResolvedEnv, Step, StepAction, StepStatus, WorkflowError};
use std::path::Path;
use std::time::Duration;

/// Executes individual steps
#[derive(Debug, Clone)]
pub struct StepExecutor<'a> {
    config: &'a RunnerConfig,
}

impl<'a> StepExecutor<'a> {
    /// Creates a new step executor
    #[must_use]
    pub fn new(config: &'a RunnerConfig) -> Self {
        Self { config }
    }

    /// Runs one step synchronously and reports its outcome
    ///
    /// A step whose condition evaluates false is reported `Skipped`.
    /// Non-zero exit codes and timeouts are reported as `Failed`; they are
    /// not errors at this layer, so the captured (redacted) output is
    /// preserved for diagnosis. No retries happen here.
    #[must_use]
    pub fn execute(
        &self,
        step: &Step,
        env: &ResolvedEnv,
        cwd: &Path,
        step_failed: bool,
        timeout: Option<Duration>,
    ) -> StepReport {
        let name = step.display_name();

        if let Some(ref condition) = step.condition
            && !condition.evaluate(env.vars(), step_failed)
        {
            tracing::info!(step = %name, condition = %condition, "Step skipped");
            return StepReport::not_run(
                name,
                StepStatus::Skipped,
                &format!("condition '{condition}' evaluated false"),
            );
        }

        let cwd = match step.working_directory {
            Some(ref dir) => cwd.join(dir),
            None => cwd.to_path_buf(),
        };
        let shell_config = ShellConfig {
            cwd,
            shell: self.config.shell.clone(),
            timeout,
        };
        let shell = ShellCommand::new(&shell_config);

        let outcome = match step.action() {
            Some(StepAction::Run(command)) => shell.run(command, env.vars()),
            Some(StepAction::Uses(reference)) => self.run_action(&shell, reference, env),
            // Unreachable for validated definitions
            None => Err(WorkflowError::Io("step has no command".to_string())),
        };

        match outcome {
            Ok(result) => self.report(&name, &result, env),
            Err(WorkflowError::Timeout { duration }) => {
                tracing::error!(step = %name, ?duration, "Step timed out");
                StepReport::not_run(
                    name,
                    StepStatus::Failed,
                    &format!("timed out after {duration:?}"),
                )
            }
            Err(err) => {
                tracing::error!(step = %name, error = %err, "Step could not be executed");
                StepReport::not_run(name, StepStatus::Failed, &env.redact(&err.to_string()))
            }
        }
    }

    fn run_action(
        &self,
        shell: &ShellCommand<'_>,
        reference: &str,
        env: &ResolvedEnv,
    ) -> Result<ShellResult, WorkflowError> {
        let Some(command) = self.config.actions.get(reference) else {
            return Err(WorkflowError::Io(format!(
                "no action mapping for '{reference}'"
            )));
        };
        let argv = shell_words::split(command)
            .map_err(|e| WorkflowError::Io(format!("action '{reference}': {e}")))?;
        shell.run_argv(&argv, env.vars())
    }

    fn report(&self, name: &str, result: &ShellResult, env: &ResolvedEnv) -> StepReport {
        let mut output = env.redact(&result.stdout);
        if !result.stderr.is_empty() {
            if !output.is_empty() && !output.ends_with('\n') {
                output.push('\n');
            }
            output.push_str(&env.redact(&result.stderr));
        }

        let status = if result.is_success() {
            tracing::info!(
                step = %name,
                duration_ms = result.duration.as_millis(),
                "Step succeeded"
            );
            StepStatus::Succeeded
        } else {
            let err = WorkflowError::StepFailed {
                step: name.to_string(),
                code: result.exit_code,
            };
            tracing::error!(step = %name, error = %err, output = %output, "Step failed");
            StepStatus::Failed
        };

        StepReport {
            name: name.to_string(),
            status,
            exit_code: Some(result.exit_code),
            duration_ms: duration_ms(result.duration),
            output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::condition::StepCondition;
    use crate::workflow::{Environment, SecretStore, resolve};
    use std::collections::HashMap;

    fn resolved(layers: &[&Environment], secrets: &SecretStore) -> ResolvedEnv {
        resolve(&HashMap::new(), layers, secrets).unwrap()
    }

    fn empty_env() -> ResolvedEnv {
        resolved(&[], &SecretStore::new())
    }

    #[test]
    fn test_execute_run_step() {
        let config = RunnerConfig::default();
        let executor = StepExecutor::new(&config);
        let report = executor.execute(
            &Step::run("echo hello"),
            &empty_env(),
            Path::new("."),
            false,
            None,
        );
        assert_eq!(report.status, StepStatus::Succeeded);
        assert_eq!(report.exit_code, Some(0));
        assert_eq!(report.output.trim(), "hello");
    }

    #[test]
    fn test_execute_failing_step() {
        let config = RunnerConfig::default();
        let executor = StepExecutor::new(&config);
        let report = executor.execute(
            &Step::run("echo broken >&2; exit 1"),
            &empty_env(),
            Path::new("."),
            false,
            None,
        );
        assert_eq!(report.status, StepStatus::Failed);
        assert_eq!(report.exit_code, Some(1));
        assert!(report.output.contains("broken"));
    }

    #[test]
    fn test_condition_false_skips() {
        let config = RunnerConfig::default();
        let executor = StepExecutor::new(&config);
        let step = Step::run("echo never").with_condition(StepCondition::Never);
        let report = executor.execute(&step, &empty_env(), Path::new("."), false, None);
        assert_eq!(report.status, StepStatus::Skipped);
        assert_eq!(report.exit_code, None);
    }

    #[test]
    fn test_output_is_redacted() {
        let env = Environment::new().set("TOKEN", "${{ secrets.TOKEN }}");
        let secrets = SecretStore::new().set("TOKEN", "super-secret-57");
        let resolved = resolved(&[&env], &secrets);

        let config = RunnerConfig::default();
        let executor = StepExecutor::new(&config);
        // The step leaks the secret on stdout and stderr
        let step = Step::run("echo $TOKEN; echo $TOKEN >&2");
        let report = executor.execute(&step, &resolved, Path::new("."), false, None);

        assert_eq!(report.status, StepStatus::Succeeded);
        assert!(!report.output.contains("super-secret-57"));
        assert!(report.output.contains("***"));
    }

    #[test]
    fn test_uses_step_with_mapped_action() {
        let config = RunnerConfig::default().with_action("actions/checkout@v2", "echo checked-out");
        let executor = StepExecutor::new(&config);
        let report = executor.execute(
            &Step::uses("actions/checkout@v2"),
            &empty_env(),
            Path::new("."),
            false,
            None,
        );
        assert_eq!(report.status, StepStatus::Succeeded);
        assert_eq!(report.output.trim(), "checked-out");
    }

    #[test]
    fn test_uses_step_without_mapping_fails() {
        let config = RunnerConfig::default();
        let executor = StepExecutor::new(&config);
        let report = executor.execute(
            &Step::uses("actions/unknown@v1"),
            &empty_env(),
            Path::new("."),
            false,
            None,
        );
        assert_eq!(report.status, StepStatus::Failed);
        assert!(report.output.contains("no action mapping"));
    }

    #[test]
    fn test_timeout_reports_failed() {
        let config = RunnerConfig::default();
        let executor = StepExecutor::new(&config);
        let report = executor.execute(
            &Step::run("sleep 5"),
            &empty_env(),
            Path::new("."),
            false,
            Some(Duration::from_millis(100)),
        );
        assert_eq!(report.status, StepStatus::Failed);
        assert!(report.output.contains("timed out"));
    }
}
