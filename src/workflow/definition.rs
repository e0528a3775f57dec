//! Workflow definition and builder
//!
//! The declarative document: trigger events plus an ordered set of named
//! jobs. Parsed once at load time, validated eagerly, and treated as
//! immutable configuration for the duration of a run.

#![allow(clippy::must_use_candidate, clippy::return_self_not_must_use)]

use super::Environment;
use super::errors::{ValidationError, WorkflowError};
use super::matrix::Strategy;
use super::steps::Step;
use super::trigger::Event;
use super::types::Validate;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

/// A named, independently schedulable unit of workflow work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Job {
    /// Optional display name (the map key is the job's identity)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Runner label, informational only for a local run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runs_on: Option<String>,

    /// Job-level environment overrides
    #[serde(default, skip_serializing_if = "Environment::is_empty")]
    pub env: Environment,

    /// Jobs that must reach `Succeeded` before this one starts
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub needs: Vec<String>,

    /// When true, this job's failure does not fail the run
    #[serde(default)]
    pub continue_on_error: bool,

    /// Optional wall-clock bound for the whole job, in minutes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_minutes: Option<u64>,

    /// Matrix strategy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,

    /// When true (default), the first failing step skips the rest of the job
    #[serde(default = "default_true")]
    pub fail_fast: bool,

    /// Ordered steps
    pub steps: Vec<Step>,
}

fn default_true() -> bool {
    true
}

impl Job {
    /// Creates a new job builder
    pub fn builder() -> JobBuilder {
        JobBuilder::new()
    }
}

impl Validate for Job {
    type Error = ValidationError;

    fn validate(&self) -> Result<(), Self::Error> {
        if self.steps.is_empty() {
            return Err(ValidationError::EmptyJob {
                job: self.name.clone().unwrap_or_else(|| "<unnamed>".to_string()),
            });
        }
        for step in &self.steps {
            step.validate()?;
        }
        Ok(())
    }
}

/// Builder for jobs, mostly used by tests and embedding code
#[derive(Debug, Clone, Default)]
pub struct JobBuilder {
    job: Option<Job>,
}

impl JobBuilder {
    /// Creates an empty builder
    pub fn new() -> Self {
        Self {
            job: Some(Job {
                name: None,
                runs_on: None,
                env: Environment::new(),
                needs: Vec::new(),
                continue_on_error: false,
                timeout_minutes: None,
                strategy: None,
                fail_fast: true,
                steps: Vec::new(),
            }),
        }
    }

    fn job_mut(&mut self) -> &mut Job {
        self.job.as_mut().expect("builder already consumed")
    }

    /// Sets the display name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.job_mut().name = Some(name.into());
        self
    }

    /// Adds an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let job = self.job_mut();
        job.env = job.env.clone().set(key, value);
        self
    }

    /// Adds a predecessor job
    pub fn needs(mut self, job: impl Into<String>) -> Self {
        self.job_mut().needs.push(job.into());
        self
    }

    /// Marks this job optional for the run aggregate
    pub fn continue_on_error(mut self, value: bool) -> Self {
        self.job_mut().continue_on_error = value;
        self
    }

    /// Sets the job timeout in minutes
    pub fn timeout_minutes(mut self, minutes: u64) -> Self {
        self.job_mut().timeout_minutes = Some(minutes);
        self
    }

    /// Sets the matrix strategy
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.job_mut().strategy = Some(strategy);
        self
    }

    /// Disables fail-fast within the job
    pub fn fail_fast(mut self, value: bool) -> Self {
        self.job_mut().fail_fast = value;
        self
    }

    /// Adds a step
    pub fn step(mut self, step: Step) -> Self {
        self.job_mut().steps.push(step);
        self
    }

    /// Builds the job, validating it
    #[allow(clippy::missing_errors_doc)]
    pub fn build(mut self) -> Result<Job, ValidationError> {
        let job = self.job.take().expect("builder already consumed");
        job.validate()?;
        Ok(job)
    }

    /// Builds the job without validation (for internal use)
    pub fn build_unchecked(mut self) -> Job {
        self.job.take().expect("builder already consumed")
    }
}

/// Ordered, uniquely named jobs
///
/// Preserves document declaration order; rejects duplicate names at parse
/// time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Jobs {
    entries: Vec<(String, Job)>,
}

impl Jobs {
    /// Creates an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no jobs are declared
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates jobs in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Job)> {
        self.entries.iter().map(|(name, job)| (name.as_str(), job))
    }

    /// Looks up a job by name
    pub fn get(&self, name: &str) -> Option<&Job> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, job)| job)
    }

    /// Job names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Inserts a job, rejecting duplicates
    #[allow(clippy::missing_errors_doc)]
    pub fn insert(&mut self, name: impl Into<String>, job: Job) -> Result<(), ValidationError> {
        let name = name.into();
        if self.get(&name).is_some() {
            return Err(ValidationError::DuplicateJob { job: name });
        }
        self.entries.push((name, job));
        Ok(())
    }
}

impl<'de> Deserialize<'de> for Jobs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct JobsVisitor;

        impl<'de> Visitor<'de> for JobsVisitor {
            type Value = Jobs;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a mapping of job names to job definitions")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Jobs, A::Error> {
                let mut jobs = Jobs::new();
                while let Some((name, job)) = map.next_entry::<String, Job>()? {
                    jobs.insert(name, job).map_err(de::Error::custom)?;
                }
                Ok(jobs)
            }
        }

        deserializer.deserialize_map(JobsVisitor)
    }
}

impl Serialize for Jobs {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, job) in &self.entries {
            map.serialize_entry(name, job)?;
        }
        map.end()
    }
}

/// The complete declarative workflow document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowDefinition {
    /// Workflow name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Trigger events; empty means any event triggers the workflow
    #[serde(
        rename = "on",
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub on: Vec<Event>,

    /// Workflow-level environment, lowest declarative layer
    #[serde(default, skip_serializing_if = "Environment::is_empty")]
    pub env: Environment,

    /// Jobs, in declaration order
    pub jobs: Jobs,
}

impl WorkflowDefinition {
    /// Creates a new workflow builder
    pub fn builder() -> WorkflowBuilder {
        WorkflowBuilder::new()
    }

    /// Parses a workflow from a YAML document
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError::Malformed`] wrapped in
    /// [`WorkflowError::Validation`] for syntax errors, or the specific
    /// validation error for semantic ones.
    pub fn from_yaml(source: &str) -> Result<Self, WorkflowError> {
        let definition: Self =
            serde_yaml::from_str(source).map_err(|e| ValidationError::Malformed {
                message: e.to_string(),
            })?;
        definition.validate()?;
        Ok(definition)
    }

    /// Loads and parses a workflow file
    #[allow(clippy::missing_errors_doc)]
    pub fn from_file(path: &Path) -> Result<Self, WorkflowError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_yaml(&source)
    }

    /// Returns true if this workflow reacts to the given event
    pub fn triggered_by(&self, event: Event) -> bool {
        self.on.is_empty() || self.on.contains(&event)
    }

    fn check_dependencies(&self) -> Result<(), ValidationError> {
        let names: HashSet<&str> = self.jobs.names().collect();

        for (job_name, job) in self.jobs.iter() {
            for needed in &job.needs {
                if !names.contains(needed.as_str()) {
                    return Err(ValidationError::UnknownDependency {
                        job: job_name.to_string(),
                        needs: needed.clone(),
                    });
                }
            }
        }

        // Cycle detection by DFS with an in-progress set
        let mut done: HashSet<&str> = HashSet::new();
        for (job_name, _) in self.jobs.iter() {
            let mut in_progress = HashSet::new();
            self.visit(job_name, &mut in_progress, &mut done)?;
        }
        Ok(())
    }

    fn visit<'a>(
        &'a self,
        job_name: &'a str,
        in_progress: &mut HashSet<&'a str>,
        done: &mut HashSet<&'a str>,
    ) -> Result<(), ValidationError> {
        if done.contains(job_name) {
            return Ok(());
        }
        if !in_progress.insert(job_name) {
            return Err(ValidationError::DependencyCycle {
                job: job_name.to_string(),
            });
        }
        if let Some(job) = self.jobs.get(job_name) {
            for needed in &job.needs {
                self.visit(needed, in_progress, done)?;
            }
        }
        in_progress.remove(job_name);
        done.insert(job_name);
        Ok(())
    }
}

impl Validate for WorkflowDefinition {
    type Error = ValidationError;

    fn validate(&self) -> Result<(), Self::Error> {
        if self.jobs.is_empty() {
            return Err(ValidationError::EmptyWorkflow);
        }
        for (job_name, job) in self.jobs.iter() {
            if job_name.is_empty() {
                return Err(ValidationError::EmptyName);
            }
            job.validate().map_err(|e| match e {
                ValidationError::EmptyJob { .. } => ValidationError::EmptyJob {
                    job: job_name.to_string(),
                },
                other => other,
            })?;
        }
        self.check_dependencies()
    }
}

impl fmt::Display for WorkflowDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Workflow({}): {} jobs",
            self.name.as_deref().unwrap_or("unnamed"),
            self.jobs.len()
        )
    }
}

/// Builder for creating workflow definitions in code
#[derive(Debug, Clone)]
pub struct WorkflowBuilder {
    definition: WorkflowDefinition,
}

impl WorkflowBuilder {
    /// Creates a new builder
    pub fn new() -> Self {
        Self {
            definition: WorkflowDefinition {
                name: None,
                on: Vec::new(),
                env: Environment::new(),
                jobs: Jobs::new(),
            },
        }
    }

    /// Sets the workflow name
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.definition.name = Some(name.into());
        self
    }

    /// Adds a trigger event
    pub fn on(mut self, event: Event) -> Self {
        self.definition.on.push(event);
        self
    }

    /// Adds a workflow-level environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.definition.env = self.definition.env.set(key, value);
        self
    }

    /// Adds a job
    ///
    /// # Panics
    ///
    /// Panics on a duplicate name; builders are for code-defined workflows
    /// where that is a programming error.
    pub fn job(mut self, name: impl Into<String>, job: Job) -> Self {
        self.definition
            .jobs
            .insert(name, job)
            .expect("duplicate job name in builder");
        self
    }

    /// Builds the workflow, validating it
    #[allow(clippy::missing_errors_doc)]
    pub fn build(self) -> Result<WorkflowDefinition, ValidationError> {
        self.definition.validate()?;
        Ok(self.definition)
    }

    /// Builds the workflow without validation (for internal use)
    pub fn build_unchecked(self) -> WorkflowDefinition {
        self.definition
    }
}

impl Default for WorkflowBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Event>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(Event),
        Many(Vec<Event>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(event) => vec![event],
        OneOrMany::Many(events) => events,
    })
}
