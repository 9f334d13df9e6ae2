//! Inspect subcommand for legacy-bridge
//!
//! Prints the structure of a legacy source as JSON.

use clap::Args;
use std::path::PathBuf;

/// Arguments for the inspect subcommand
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Legacy SQLite file or directory of CSV exports (overrides config)
    #[arg(long, value_name = "PATH")]
    pub source: Option<PathBuf>,

    /// Write the JSON here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}
