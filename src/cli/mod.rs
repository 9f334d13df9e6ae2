//! Command line surface.
//!
//! `migrate` copies the legacy database into the target store, `scrape`
//! merges company registry data into it, and `inspect` dumps the legacy
//! schema with sample rows. Global flags pick the config file, target store
//! and log destination; each subcommand's args are folded into the loaded
//! `MigrationConfig` before the run starts.

pub mod inspect;
pub mod migrate;
pub mod scrape;

use clap::{Parser, Subcommand};
use inspect::InspectArgs;
use migrate::MigrateArgs;
use scrape::ScrapeArgs;

/// Legacy database migration and company registry scraping
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to target database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Migrate the legacy database into the target store
    Migrate(MigrateArgs),

    /// Scrape companies from the business registry
    Scrape(ScrapeArgs),

    /// Dump tables, columns and sample rows of a legacy source
    Inspect(InspectArgs),
}
