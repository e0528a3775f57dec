//! Runner configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Configuration for the orchestrator and its executors
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Shell used for `run` steps
    pub shell: String,
    /// Working directory for all steps
    pub working_dir: PathBuf,
    /// Log level
    pub log_level: String,
    /// Global fail-fast policy: first failing instance cancels the whole run
    pub fail_fast: bool,
    /// Local command bound to each `uses` action reference
    ///
    /// Actions are opaque to the orchestrator; this table is how a local
    /// run resolves them. An unmapped reference fails the step.
    pub actions: HashMap<String, String>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
            working_dir: PathBuf::from("."),
            log_level: "info".to_string(),
            fail_fast: false,
            actions: HashMap::new(),
        }
    }
}

impl RunnerConfig {
    /// Sets the working directory
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    /// Enables the global fail-fast policy
    #[must_use]
    pub fn with_fail_fast(mut self, value: bool) -> Self {
        self.fail_fast = value;
        self
    }

    /// Binds an action reference to a local command
    #[must_use]
    pub fn with_action(mut self, reference: impl Into<String>, command: impl Into<String>) -> Self {
        self.actions.insert(reference.into(), command.into());
        self
    }
}
