//! Trigger events and the run-time context they carry

use super::environment::SecretStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Event kinds a workflow can be triggered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    /// A push to the repository
    Push,
    /// A pull request was opened or updated
    PullRequest,
    /// A scheduled run
    Schedule,
    /// A manual invocation
    Manual,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Push => write!(f, "push"),
            Self::PullRequest => write!(f, "pull_request"),
            Self::Schedule => write!(f, "schedule"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

impl FromStr for Event {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "push" => Ok(Self::Push),
            "pull_request" => Ok(Self::PullRequest),
            "schedule" => Ok(Self::Schedule),
            "manual" => Ok(Self::Manual),
            other => Err(format!("unknown event: '{other}'")),
        }
    }
}

/// The external event that starts a run, plus its secret bindings
///
/// Secrets are owned here and handed read-only into environment
/// resolution; they do not outlive the run.
#[derive(Debug, Clone)]
pub struct TriggerContext {
    /// The event kind
    pub event: Event,
    /// Repository reference, if the trigger carries one
    pub repository: Option<String>,
    /// Secret bindings supplied by the triggering context
    pub secrets: SecretStore,
}

impl TriggerContext {
    /// Creates a context for the given event with no secrets
    #[must_use]
    pub fn new(event: Event) -> Self {
        Self {
            event,
            repository: None,
            secrets: SecretStore::new(),
        }
    }

    /// Sets the repository reference
    #[must_use]
    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    /// Binds a secret
    #[must_use]
    pub fn with_secret(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets = self.secrets.clone().set(name, value);
        self
    }

    /// Replaces the whole secret store
    #[must_use]
    pub fn with_secrets(mut self, secrets: SecretStore) -> Self {
        self.secrets = secrets;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_roundtrip() {
        for raw in ["push", "pull_request", "schedule", "manual"] {
            let event: Event = raw.parse().unwrap();
            assert_eq!(event.to_string(), raw);
        }
        assert!("poke".parse::<Event>().is_err());
    }

    #[test]
    fn test_event_deserialize() {
        let events: Vec<Event> = serde_yaml::from_str("[push, pull_request]").unwrap();
        assert_eq!(events, vec![Event::Push, Event::PullRequest]);
    }

    #[test]
    fn test_trigger_context_secrets() {
        let ctx = TriggerContext::new(Event::Push)
            .with_repository("org/repo")
            .with_secret("TOKEN", "value");
        assert_eq!(ctx.repository.as_deref(), Some("org/repo"));
        assert_eq!(ctx.secrets.get("TOKEN"), Some("value"));
    }
}
