//! `runline check` - Validate a workflow file without running it
//!
//! Parses the document, runs full semantic validation (duplicate jobs,
//! unknown or cyclic `needs`, malformed steps) and expands every matrix so
//! bad axes surface before anything executes.
//!
//! ## Usage
//!
//! ```bash
//! runline check ci.yml
//! # Exit code 0: workflow is valid
//! # Exit code 1: parse or validation error
//! ```

use anyhow::{Context, Result};
use runline::workflow::{WorkflowDefinition, expand};
use std::path::Path;

/// Validate a workflow file
///
/// # Errors
///
/// Returns the underlying parse, validation, or matrix expansion error.
pub fn check_workflow(file: &Path) -> Result<()> {
    let workflow = WorkflowDefinition::from_file(file)
        .with_context(|| format!("Invalid workflow: {}", file.display()))?;

    let mut instances = 0;
    for (name, job) in workflow.jobs.iter() {
        instances += expand(name, job)
            .with_context(|| format!("Invalid matrix in job '{name}'"))?
            .len();
    }

    println!(
        "OK: {} ({} jobs, {} instances)",
        workflow.name.as_deref().unwrap_or("unnamed"),
        workflow.jobs.len(),
        instances
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{content}").unwrap();
        file
    }

    #[test]
    fn test_check_valid_workflow() {
        let file = write_temp(
            "name: ci\njobs:\n  test:\n    strategy:\n      matrix:\n        v: [1, 2]\n    steps:\n      - run: echo hi\n",
        );
        assert!(check_workflow(file.path()).is_ok());
    }

    #[test]
    fn test_check_rejects_cycle() {
        let file = write_temp(
            "jobs:\n  a:\n    needs: [b]\n    steps: [{run: echo a}]\n  b:\n    needs: [a]\n    steps: [{run: echo b}]\n",
        );
        assert!(check_workflow(file.path()).is_err());
    }

    #[test]
    fn test_check_missing_file() {
        assert!(check_workflow(Path::new("/nonexistent/ci.yml")).is_err());
    }
}
