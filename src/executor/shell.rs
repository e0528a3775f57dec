//! Command execution
//!
//! Runs one command synchronously with an explicit environment snapshot
//! and working directory. The environment is passed in whole, never read
//! from ambient process state, so job instances stay isolated from each
//! other.
//!
//! ## Variable Expansion
//!
//! `run` commands may reference merged environment variables with the
//! `${VAR_NAME}` syntax; unknown variables are left untouched:
//!
//! ```rust
//! use runline::executor::expand_variables;
//! use std::collections::HashMap;
//!
//! let env = HashMap::from([("PY".to_string(), "3.9".to_string())]);
//! assert_eq!(expand_variables("pyenv local ${PY}", &env), "pyenv local 3.9");
//! ```

use crate::workflow::WorkflowError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Shell execution configuration
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// Working directory
    pub cwd: PathBuf,

    /// Shell to use for `run` commands (default: sh)
    pub shell: String,

    /// Timeout for commands (None = no timeout)
    pub timeout: Option<Duration>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            cwd: std::env::current_dir().unwrap_or_default(),
            shell: "sh".to_string(),
            timeout: None,
        }
    }
}

/// Result of command execution
#[derive(Debug, Clone)]
pub struct ShellResult {
    /// Standard output
    pub stdout: String,

    /// Standard error
    pub stderr: String,

    /// Exit code
    pub exit_code: i32,

    /// Duration of execution
    pub duration: Duration,
}

impl ShellResult {
    /// Returns true if command succeeded (exit code 0)
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Returns true if command failed
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.exit_code != 0
    }
}

/// Executes commands against one configuration
#[derive(Debug, Clone)]
pub struct ShellCommand<'a> {
    config: &'a ShellConfig,
}

impl<'a> ShellCommand<'a> {
    /// Creates a new command executor
    #[must_use]
    pub fn new(config: &'a ShellConfig) -> Self {
        Self { config }
    }

    /// Runs a shell command string through `<shell> -c`
    ///
    /// A non-zero exit code is NOT an error here; callers map it to a step
    /// failure so the captured output survives for diagnosis.
    ///
    /// # Errors
    ///
    /// Returns `WorkflowError::Io` if the process cannot be spawned and
    /// `WorkflowError::Timeout` if the configured bound is exceeded.
    pub fn run(
        &self,
        command: &str,
        env: &HashMap<String, String>,
    ) -> Result<ShellResult, WorkflowError> {
        let expanded = expand_variables(command, env);
        // Log the raw command: expansion may have substituted secret-derived
        // values, which must never reach the log stream.
        tracing::debug!(command = %command, "Executing shell command");

        let mut cmd = Command::new(&self.config.shell);
        cmd.arg("-c");
        cmd.arg(&expanded);
        self.spawn(cmd, env)
    }

    /// Runs an argv directly, without a shell
    ///
    /// Used for resolved action commands.
    ///
    /// # Errors
    ///
    /// Same contract as [`ShellCommand::run`].
    pub fn run_argv(
        &self,
        argv: &[String],
        env: &HashMap<String, String>,
    ) -> Result<ShellResult, WorkflowError> {
        let Some((program, args)) = argv.split_first() else {
            return Err(WorkflowError::Io("empty command".to_string()));
        };
        tracing::debug!(program = %program, "Executing action command");

        let mut cmd = Command::new(program);
        cmd.args(args);
        self.spawn(cmd, env)
    }

    fn spawn(
        &self,
        mut cmd: Command,
        env: &HashMap<String, String>,
    ) -> Result<ShellResult, WorkflowError> {
        cmd.current_dir(&self.config.cwd);
        cmd.env_clear();
        cmd.envs(env);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|e| WorkflowError::Io(e.to_string()))?;

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let stdout_thread = std::thread::spawn(move || read_all(stdout_pipe));
        let stderr_thread = std::thread::spawn(move || read_all(stderr_pipe));

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if let Some(timeout) = self.config.timeout
                        && start.elapsed() >= timeout
                    {
                        let _ = child.kill();
                        let _ = child.wait();
                        let _ = stdout_thread.join();
                        let _ = stderr_thread.join();
                        return Err(WorkflowError::Timeout { duration: timeout });
                    }
                    std::thread::sleep(Duration::from_millis(10));
                }
                Err(e) => return Err(WorkflowError::Io(e.to_string())),
            }
        };

        let stdout = stdout_thread.join().unwrap_or_default();
        let stderr = stderr_thread.join().unwrap_or_default();

        Ok(ShellResult {
            stdout,
            stderr,
            exit_code: status.code().unwrap_or(-1),
            duration: start.elapsed(),
        })
    }
}

fn read_all(pipe: Option<impl Read>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    String::from_utf8_lossy(&buf).to_string()
}

/// Expands environment variables in a command string
///
/// Variables are expanded using the `${VAR_NAME}` syntax.
/// If a variable is not found, it remains unchanged in the output.
pub fn expand_variables(input: &str, env: &HashMap<String, String>) -> String {
    static VAR_PATTERN: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

    VAR_PATTERN
        .replace_all(input, |caps: &regex::Captures| {
            let var_name = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            if let Some(value) = env.get(var_name) {
                value.clone()
            } else {
                // Keep the original if not found
                caps.get(0)
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default()
            }
        })
        .to_string()
}
