//! Step conditions
//!
//! A step may carry an `if` expression controlling whether it executes.
//! Supported forms mirror the common CI expression subset:
//!
//! - `always()` / `never()`
//! - `success()` / `failure()` (status of earlier steps in the instance)
//! - `env.NAME == 'value'` / `env.NAME != 'value'`

use crate::workflow::errors::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

static ENV_COMPARISON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^env\.([A-Za-z_][A-Za-z0-9_]*)\s*(==|!=)\s*'([^']*)'$").unwrap()
});

/// Condition controlling whether a step executes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepCondition {
    /// Step always runs
    Always,
    /// Step never runs
    Never,
    /// Step runs only while no earlier step in the instance has failed
    Success,
    /// Step runs only after an earlier step in the instance failed
    Failure,
    /// Step runs when the named variable equals the given value
    EnvEquals {
        /// Variable name
        name: String,
        /// Expected value
        value: String,
    },
    /// Step runs when the named variable differs from the given value
    EnvNotEquals {
        /// Variable name
        name: String,
        /// Rejected value
        value: String,
    },
}

impl StepCondition {
    /// Evaluates the condition against a resolved environment
    ///
    /// `step_failed` reports whether an earlier step in the same instance
    /// has already failed.
    #[must_use]
    pub fn evaluate(&self, env: &HashMap<String, String>, step_failed: bool) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Success => !step_failed,
            Self::Failure => step_failed,
            Self::EnvEquals { name, value } => env.get(name).is_some_and(|v| v == value),
            Self::EnvNotEquals { name, value } => !env.get(name).is_some_and(|v| v == value),
        }
    }
}

impl FromStr for StepCondition {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "always()" => return Ok(Self::Always),
            "never()" => return Ok(Self::Never),
            "success()" => return Ok(Self::Success),
            "failure()" => return Ok(Self::Failure),
            _ => {}
        }

        if let Some(caps) = ENV_COMPARISON.captures(s.trim()) {
            let name = caps[1].to_string();
            let value = caps[3].to_string();
            return Ok(match &caps[2] {
                "==" => Self::EnvEquals { name, value },
                _ => Self::EnvNotEquals { name, value },
            });
        }

        Err(ValidationError::InvalidCondition {
            expression: s.to_string(),
        })
    }
}

impl fmt::Display for StepCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => write!(f, "always()"),
            Self::Never => write!(f, "never()"),
            Self::Success => write!(f, "success()"),
            Self::Failure => write!(f, "failure()"),
            Self::EnvEquals { name, value } => write!(f, "env.{name} == '{value}'"),
            Self::EnvNotEquals { name, value } => write!(f, "env.{name} != '{value}'"),
        }
    }
}

impl Serialize for StepCondition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StepCondition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}
