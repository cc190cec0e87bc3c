//! CLI commands.

mod allocs;
mod plan;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use convoy_reconcile::Snapshot;

use crate::error::CliError;
use crate::output::OutputFormat;

/// convoyctl - Inspect what the reconciler would do with a cluster snapshot.
#[derive(Debug, Parser)]
#[command(name = "convoyctl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format (table or json).
    #[arg(long, global = true, default_value = "table", env = "CONVOY_FORMAT")]
    format: String,

    /// Snapshot file (.json or .toml).
    #[arg(long, global = true, env = "CONVOY_SNAPSHOT")]
    snapshot: Option<PathBuf>,

    /// Restrict output to one job.
    #[arg(long, global = true)]
    job: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show the reconciliation plan for each job.
    Plan(plan::PlanCommand),

    /// List allocations with the category the reconciler assigns them.
    Allocs(allocs::AllocsCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    /// Run the CLI command.
    pub fn run(self) -> Result<()> {
        let ctx = CommandContext {
            format: OutputFormat::parse(&self.format),
            snapshot: self.snapshot,
            job: self.job,
        };

        match self.command {
            Commands::Plan(cmd) => cmd.run(ctx),
            Commands::Allocs(cmd) => cmd.run(ctx),
            Commands::Version => {
                println!("convoyctl {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub format: OutputFormat,
    pub snapshot: Option<PathBuf>,
    pub job: Option<String>,
}

impl CommandContext {
    /// Load the snapshot named on the command line.
    pub fn load_snapshot(&self) -> Result<Snapshot, CliError> {
        let path = self.snapshot.as_deref().ok_or(CliError::MissingSnapshot)?;
        crate::snapshot::load(path)
    }

    /// Jobs to act on: the `--job` filter, or every job in the snapshot.
    pub fn job_ids(&self, snapshot: &Snapshot) -> Result<Vec<String>, CliError> {
        let known = snapshot.job_ids();
        match self.job.as_deref() {
            Some(job) if known.contains(job) => Ok(vec![job.to_string()]),
            Some(job) => Err(CliError::UnknownJob(job.to_string())),
            None => Ok(known.into_iter().map(str::to_string).collect()),
        }
    }
}
