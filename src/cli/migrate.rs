//! Migrate subcommand for legacy-bridge
//!
//! Reads the legacy database and upserts companies, products, invoices,
//! work orders and their relationship tables into the target store.

use crate::config::MigrationConfig;
use crate::mapping::EntityType;
use clap::Args;
use std::path::PathBuf;

/// Arguments for the migrate subcommand
#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Legacy SQLite file or directory of CSV exports (overrides config)
    #[arg(long, value_name = "PATH")]
    pub source: Option<PathBuf>,

    /// Actually write to the target store
    ///
    /// Without this flag the run is a dry run: everything is read, mapped,
    /// validated and counted, but nothing is written.
    #[arg(long)]
    pub live: bool,

    /// Records per write batch (overrides config)
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Only migrate these entity types (repeatable)
    ///
    /// Stages still run in dependency order. Relationship tables resolve
    /// against whatever the target store already holds.
    #[arg(long, value_name = "ENTITY")]
    pub only: Vec<EntityType>,

    /// Directory for the run report (overrides config)
    #[arg(long, value_name = "DIR")]
    pub report_dir: Option<PathBuf>,
}

impl MigrateArgs {
    /// Apply the flags on top of the loaded configuration.
    pub fn apply(&self, config: &mut MigrationConfig) {
        if let Some(source) = &self.source {
            config.source_path = source.clone();
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(dir) = &self.report_dir {
            config.report_dir = dir.clone();
        }
        config.dry_run = !self.live;
    }
}
