//! `runline run` - Execute a workflow file
//!
//! Loads the workflow, binds secrets from the command line and/or a YAML
//! file, and runs it to completion. The process exits non-zero when any
//! non-optional job instance fails.
//!
//! ## Usage
//!
//! ```bash
//! runline run ci.yml --event push --secret CLIENT_SECRETS=... --format json
//! ```

use anyhow::{Context, Result};
use runline::executor::Orchestrator;
use runline::infrastructure::RunnerConfig;
use runline::workflow::{Event, RunReport, SecretStore, TriggerContext, WorkflowDefinition};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Report rendering format
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable summary
    Text,
    /// Full report as JSON
    Json,
}

/// Options for the `run` command
#[derive(Debug)]
pub struct RunOptions {
    /// Trigger event
    pub event: Event,
    /// `NAME=VALUE` secret bindings
    pub secrets: Vec<String>,
    /// YAML file of secret bindings
    pub secrets_file: Option<PathBuf>,
    /// Runner configuration file
    pub config: Option<PathBuf>,
    /// Working directory override
    pub cwd: Option<PathBuf>,
    /// Cancel the whole run on the first failing instance
    pub fail_fast: bool,
    /// Report format
    pub format: OutputFormat,
}

/// Execute a workflow file and print its report
///
/// # Errors
///
/// Fails on unreadable or invalid input files; job failures are not
/// errors here, they are visible in the returned report.
pub fn run_workflow(file: &Path, options: &RunOptions) -> Result<RunReport> {
    let workflow = WorkflowDefinition::from_file(file)
        .with_context(|| format!("Failed to load workflow: {}", file.display()))?;

    let secrets = build_secrets(options)?;
    let trigger = TriggerContext::new(options.event).with_secrets(secrets);

    let mut config = load_config(options.config.as_deref())?;
    if let Some(ref cwd) = options.cwd {
        config = config.with_working_dir(cwd.clone());
    }
    if options.fail_fast {
        config = config.with_fail_fast(true);
    }
    runline::init_logging(&config.log_level);

    let orchestrator = Orchestrator::new(config);
    let report = orchestrator.run(&workflow, &trigger)?;

    println!("{}", format_report(&report, options.format)?);
    Ok(report)
}

fn load_config(path: Option<&Path>) -> Result<RunnerConfig> {
    let Some(path) = path else {
        return Ok(RunnerConfig::default());
    };
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    serde_yaml::from_str(&source)
        .with_context(|| format!("Invalid config file: {}", path.display()))
}

fn build_secrets(options: &RunOptions) -> Result<SecretStore> {
    let mut store = SecretStore::new();

    if let Some(ref path) = options.secrets_file {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read secrets file: {}", path.display()))?;
        let bindings: HashMap<String, String> = serde_yaml::from_str(&source)
            .with_context(|| format!("Invalid secrets file: {}", path.display()))?;
        for (name, value) in bindings {
            store = store.set(name, value);
        }
    }

    // Command-line bindings win over the file
    for raw in &options.secrets {
        let (name, value) = parse_secret(raw)?;
        store = store.set(name, value);
    }

    Ok(store)
}

/// Parses a `NAME=VALUE` secret binding
pub fn parse_secret(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once('=')
        .with_context(|| format!("Invalid secret '{raw}', expected NAME=VALUE"))?;
    anyhow::ensure!(!name.is_empty(), "Invalid secret '{raw}', empty name");
    Ok((name.to_string(), value.to_string()))
}

/// Renders a run report in the requested format
///
/// # Errors
///
/// Fails only if JSON serialization fails.
pub fn format_report(report: &RunReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(report).context("Failed to serialize report")
        }
        OutputFormat::Text => {
            let mut out = report.to_string();
            for job in report.failures() {
                for step in job.failed_steps() {
                    out.push_str(&format!("\n--- {} / {} ---\n", job.instance, step.name));
                    out.push_str(step.output.trim_end());
                    out.push('\n');
                }
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_secret() {
        assert_eq!(
            parse_secret("TOKEN=abc=def").unwrap(),
            ("TOKEN".to_string(), "abc=def".to_string())
        );
        assert!(parse_secret("NOVALUE").is_err());
        assert!(parse_secret("=value").is_err());
    }

    #[test]
    fn test_run_workflow_end_to_end() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "on: [push]\njobs:\n  greet:\n    steps:\n      - run: echo hello\n"
        )
        .unwrap();

        let options = RunOptions {
            event: Event::Push,
            secrets: Vec::new(),
            secrets_file: None,
            config: None,
            cwd: None,
            fail_fast: false,
            format: OutputFormat::Text,
        };
        let report = run_workflow(file.path(), &options).unwrap();
        assert!(report.is_success());
    }

    #[test]
    fn test_secrets_file_and_flag_precedence() {
        let mut secrets = tempfile::NamedTempFile::new().unwrap();
        write!(secrets, "TOKEN: from-file\nOTHER: kept\n").unwrap();

        let options = RunOptions {
            event: Event::Push,
            secrets: vec!["TOKEN=from-flag".to_string()],
            secrets_file: Some(secrets.path().to_path_buf()),
            config: None,
            cwd: None,
            fail_fast: false,
            format: OutputFormat::Text,
        };
        let store = build_secrets(&options).unwrap();
        assert_eq!(store.get("TOKEN"), Some("from-flag"));
        assert_eq!(store.get("OTHER"), Some("kept"));
    }

    #[test]
    fn test_format_report_json() {
        let report = RunReport::from_jobs(Vec::new(), true, std::time::Duration::ZERO);
        let json = format_report(&report, OutputFormat::Json).unwrap();
        assert!(json.contains("\"run_id\""));
    }
}
