//! Step types
//!
//! A step is the smallest unit of work: exactly one inline `run` command
//! or one opaque `uses` action reference.

#![allow(clippy::must_use_candidate, clippy::return_self_not_must_use)]

use super::Environment;
use super::condition::StepCondition;
use super::errors::ValidationError;
use super::types::Validate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a step executes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction<'a> {
    /// Inline shell command
    Run(&'a str),
    /// Reusable action reference, resolved externally
    Uses(&'a str),
}

/// A single step in a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Step {
    /// Optional display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Inline shell command (mutually exclusive with `uses`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,

    /// Action reference (mutually exclusive with `run`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uses: Option<String>,

    /// Step-level environment overrides
    #[serde(default, skip_serializing_if = "Environment::is_empty")]
    pub env: Environment,

    /// Optional condition controlling whether the step executes
    #[serde(rename = "if", skip_serializing_if = "Option::is_none")]
    pub condition: Option<StepCondition>,

    /// Optional wall-clock bound for this step, in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Optional working directory, relative to the run's working dir
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
}

impl Step {
    /// Creates a step that runs an inline shell command
    pub fn run(command: impl Into<String>) -> Self {
        Self {
            name: None,
            run: Some(command.into()),
            uses: None,
            env: Environment::new(),
            condition: None,
            timeout_secs: None,
            working_directory: None,
        }
    }

    /// Creates a step that invokes a reusable action
    pub fn uses(reference: impl Into<String>) -> Self {
        Self {
            name: None,
            run: None,
            uses: Some(reference.into()),
            env: Environment::new(),
            condition: None,
            timeout_secs: None,
            working_directory: None,
        }
    }

    /// Sets the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds a step-level environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env = self.env.set(key, value);
        self
    }

    /// Sets the execution condition
    pub fn with_condition(mut self, condition: StepCondition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Sets the step timeout in seconds
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Returns what this step executes, if exactly one action is declared
    pub fn action(&self) -> Option<StepAction<'_>> {
        match (&self.run, &self.uses) {
            (Some(run), None) => Some(StepAction::Run(run)),
            (None, Some(uses)) => Some(StepAction::Uses(uses)),
            _ => None,
        }
    }

    /// Name used for logs and reports
    pub fn display_name(&self) -> String {
        if let Some(ref name) = self.name {
            return name.clone();
        }
        match (&self.run, &self.uses) {
            (Some(run), _) => run.lines().next().unwrap_or(run).to_string(),
            (_, Some(uses)) => uses.clone(),
            _ => "<invalid step>".to_string(),
        }
    }
}

impl Validate for Step {
    type Error = ValidationError;

    fn validate(&self) -> Result<(), Self::Error> {
        match (&self.run, &self.uses) {
            (Some(_), Some(_)) => {
                return Err(ValidationError::AmbiguousStep {
                    step: self.display_name(),
                });
            }
            (None, None) => {
                return Err(ValidationError::MissingCommand {
                    step: self.name.clone().unwrap_or_else(|| "<unnamed>".to_string()),
                });
            }
            _ => {}
        }

        if let Some(ref name) = self.name {
            if name.is_empty() {
                return Err(ValidationError::EmptyName);
            }
            if name.len() > 100 {
                return Err(ValidationError::NameTooLong {
                    max: 100,
                    len: name.len(),
                });
            }
        }

        Ok(())
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.action() {
            Some(StepAction::Run(run)) => write!(f, "run({})", self.redacted_first_line(run)),
            Some(StepAction::Uses(uses)) => write!(f, "uses({uses})"),
            None => write!(f, "<invalid step>"),
        }
    }
}

impl Step {
    fn redacted_first_line<'a>(&self, command: &'a str) -> &'a str {
        command.lines().next().unwrap_or(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_run() {
        let step = Step::run("cargo test");
        assert!(matches!(step.action(), Some(StepAction::Run("cargo test"))));
        assert!(step.validate().is_ok());
    }

    #[test]
    fn test_step_uses() {
        let step = Step::uses("actions/checkout@v4");
        assert!(matches!(
            step.action(),
            Some(StepAction::Uses("actions/checkout@v4"))
        ));
        assert!(step.validate().is_ok());
    }

    #[test]
    fn test_step_both_actions_invalid() {
        let mut step = Step::run("echo hi");
        step.uses = Some("actions/checkout@v4".to_string());
        assert!(matches!(
            step.validate(),
            Err(ValidationError::AmbiguousStep { .. })
        ));
        assert!(step.action().is_none());
    }

    #[test]
    fn test_step_neither_action_invalid() {
        let mut step = Step::run("x");
        step.run = None;
        assert!(matches!(
            step.validate(),
            Err(ValidationError::MissingCommand { .. })
        ));
    }

    #[test]
    fn test_display_name_prefers_explicit_name() {
        let step = Step::run("pip install .").with_name("Install");
        assert_eq!(step.display_name(), "Install");

        let step = Step::run("line one\nline two");
        assert_eq!(step.display_name(), "line one");
    }

    #[test]
    fn test_deserialize_step() {
        let yaml = r#"
name: Run tests
run: pytest -v
env:
  PYTHONDONTWRITEBYTECODE: "1"
if: "env.SKIP_TESTS != 'true'"
timeout_secs: 600
"#;
        let step: Step = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(step.name.as_deref(), Some("Run tests"));
        assert_eq!(step.run.as_deref(), Some("pytest -v"));
        assert_eq!(step.timeout_secs, Some(600));
        assert!(step.condition.is_some());
        assert_eq!(
            step.env.get("PYTHONDONTWRITEBYTECODE").map(String::as_str),
            Some("1")
        );
    }

    #[test]
    fn test_deserialize_rejects_unknown_fields() {
        let yaml = "run: echo hi\nshell: bash\n";
        assert!(serde_yaml::from_str::<Step>(yaml).is_err());
    }
}
