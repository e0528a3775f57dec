//! runline - A minimal CI workflow orchestrator
//!
//! Runs declarative workflow files locally: jobs, steps, matrices, secrets.
//!
//! ## Commands
//!
//! - `runline run` - Execute a workflow file
//! - `runline check` - Validate a workflow file without running it
//! - `runline completions` - Generate shell completions
//!
//! ## Quick Start
//!
//! ```bash
//! # Validate a workflow
//! runline check ci.yml
//!
//! # Run it, binding a secret
//! runline run ci.yml --event push --secret CLIENT_SECRETS=...
//!
//! # Machine-readable report
//! runline run ci.yml --format json
//! ```

use std::process::ExitCode;

mod cli;

fn main() -> ExitCode {
    if std::env::var("RUNLINE_DEBUG").is_ok() {
        runline::init_logging("debug");
    }

    match cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            if std::env::var("RUNLINE_VERBOSE").is_ok() {
                eprintln!("{:?}", e);
            }
            ExitCode::FAILURE
        }
    }
}
