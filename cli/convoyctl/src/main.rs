//! convoyctl - offline CLI for convoy
//!
//! Reads a cluster snapshot from disk and shows what the reconciler would
//! do with it.

use anyhow::Result;
use clap::Parser;

mod commands;
mod error;
mod output;
mod snapshot;

use commands::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = cli.run() {
        error::print_error(&e);
        std::process::exit(1);
    }

    Ok(())
}
