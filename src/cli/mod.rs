//! CLI for runline
//!
//! Provides the command-line surface over the workflow engine:
//! - `run`: Execute a workflow file
//! - `check`: Validate a workflow file without running it
//! - `completions`: Generate shell completions

pub mod check;
pub mod completions;
pub mod run;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use runline::workflow::Event;
use std::path::PathBuf;

/// CLI arguments for runline
#[derive(Parser, Debug)]
#[command(name = "runline")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute a workflow file
    Run {
        /// Workflow file to run
        file: PathBuf,
        /// Trigger event
        #[arg(short, long, value_enum, default_value = "push")]
        event: EventArg,
        /// Secret binding, NAME=VALUE (repeatable)
        #[arg(short, long = "secret", value_name = "NAME=VALUE")]
        secret: Vec<String>,
        /// YAML file of secret bindings
        #[arg(long, value_name = "FILE")]
        secrets_file: Option<PathBuf>,
        /// Runner configuration file
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,
        /// Working directory for all steps
        #[arg(short = 'C', long)]
        cwd: Option<PathBuf>,
        /// Cancel the whole run on the first failing job instance
        #[arg(long)]
        fail_fast: bool,
        /// Report format
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,
    },

    /// Validate a workflow file without running it
    Check {
        /// Workflow file to validate
        file: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: ShellArg,
        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum EventArg {
    Push,
    PullRequest,
    Schedule,
    Manual,
}

impl From<EventArg> for Event {
    fn from(arg: EventArg) -> Self {
        match arg {
            EventArg::Push => Event::Push,
            EventArg::PullRequest => Event::PullRequest,
            EventArg::Schedule => Event::Schedule,
            EventArg::Manual => Event::Manual,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ShellArg {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

/// Build the CLI command for completion generation
pub fn build_cli() -> clap::Command {
    use clap::CommandFactory;
    Args::command()
}

/// Parse and execute CLI arguments
pub fn run() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Run {
            file,
            event,
            secret,
            secrets_file,
            config,
            cwd,
            fail_fast,
            format,
        } => {
            let options = run::RunOptions {
                event: event.into(),
                secrets: secret,
                secrets_file,
                config,
                cwd,
                fail_fast,
                format: match format {
                    Some(FormatArg::Json) => run::OutputFormat::Json,
                    Some(FormatArg::Text) | None => run::OutputFormat::Text,
                },
            };

            let report = run::run_workflow(&file, &options)?;
            if !report.is_success() {
                let failed = report.failures().count();
                anyhow::bail!("{failed} job instance(s) did not succeed");
            }
        }
        Command::Check { file } => {
            check::check_workflow(&file)?;
        }
        Command::Completions { shell, output } => {
            use clap_complete::Shell;

            let shell_enum = match shell {
                ShellArg::Bash => Shell::Bash,
                ShellArg::Zsh => Shell::Zsh,
                ShellArg::Fish => Shell::Fish,
                ShellArg::PowerShell => Shell::PowerShell,
            };

            let completions = completions::generate_completions(shell_enum)?;

            if let Some(output_path) = output {
                completions::save_completions(&completions, &output_path)?;
            } else {
                println!("{}", completions);
            }
        }
    }

    Ok(())
}
