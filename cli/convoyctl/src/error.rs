//! Error handling and display for the CLI.

use colored::Colorize;
use convoy_reconcile::SnapshotFileError;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("No snapshot given. Pass --snapshot or set CONVOY_SNAPSHOT.")]
    MissingSnapshot,

    #[error(transparent)]
    Snapshot(#[from] SnapshotFileError),

    #[error("Job not found in snapshot: {0}")]
    UnknownJob(String),
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    if let Some(cli_err) = err.downcast_ref::<CliError>() {
        match cli_err {
            CliError::Snapshot(SnapshotFileError::UnsupportedFormat(_)) => {
                eprintln!(
                    "\n{}",
                    "Hint: Snapshots must end in .json or .toml.".yellow()
                );
            }
            CliError::UnknownJob(_) => {
                eprintln!(
                    "\n{}",
                    "Hint: Run `convoyctl allocs` without --job to list every job.".yellow()
                );
            }
            CliError::Snapshot(SnapshotFileError::Parse { .. }) => {
                eprintln!(
                    "\n{}",
                    "Hint: Enum values are snake_case, e.g. `client_status = \"running\"`.".yellow()
                );
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_snapshot_errors_display_as_is() {
        let err = CliError::from(SnapshotFileError::UnsupportedFormat(PathBuf::from(
            "cluster.yaml",
        )));
        assert_eq!(
            err.to_string(),
            "unsupported snapshot format: cluster.yaml (expected .json or .toml)"
        );
    }
}
