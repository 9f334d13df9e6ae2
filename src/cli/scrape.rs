//! Scrape subcommand for legacy-bridge
//!
//! Fetches company data from the business registry (detail pages or the
//! listing API) and merges it into the target `companies` table.

use crate::config::{MigrationConfig, ScrapeMode};
use clap::{Args, ValueEnum};
use std::path::PathBuf;

/// Scrape mode as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliScrapeMode {
    /// One detail page per company id
    Detail,
    /// Paged JSON listing endpoint
    Listing,
}

impl From<CliScrapeMode> for ScrapeMode {
    fn from(mode: CliScrapeMode) -> Self {
        match mode {
            CliScrapeMode::Detail => ScrapeMode::Detail,
            CliScrapeMode::Listing => ScrapeMode::Listing,
        }
    }
}

/// Arguments for the scrape subcommand
#[derive(Args, Debug)]
pub struct ScrapeArgs {
    /// Actually write to the target store
    #[arg(long)]
    pub live: bool,

    /// Number of companies to fetch in detail mode
    #[arg(long)]
    pub limit: Option<usize>,

    /// First company id; detail mode walks downward from here
    #[arg(long)]
    pub start: Option<u64>,

    /// Maximum requests in flight (overrides config)
    #[arg(long)]
    pub concurrent: Option<usize>,

    /// Scrape mode (overrides config)
    #[arg(long, value_enum)]
    pub mode: Option<CliScrapeMode>,

    /// Read a saved listing dump instead of fetching
    #[arg(long, value_name = "FILE")]
    pub dump: Option<PathBuf>,

    /// Directory for the run report (overrides config)
    #[arg(long, value_name = "DIR")]
    pub report_dir: Option<PathBuf>,
}

impl ScrapeArgs {
    /// Apply the flags on top of the loaded configuration.
    pub fn apply(&self, config: &mut MigrationConfig) {
        if let Some(limit) = self.limit {
            config.scrape.limit = limit;
        }
        if let Some(start) = self.start {
            config.scrape.start_id = start;
        }
        if let Some(concurrent) = self.concurrent {
            config.max_concurrent_requests = concurrent.max(1);
        }
        if let Some(mode) = self.mode {
            config.scrape.mode = mode.into();
        }
        if let Some(dir) = &self.report_dir {
            config.report_dir = dir.clone();
        }
        config.dry_run = !self.live;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_overrides() {
        let args = ScrapeArgs {
            live: false,
            limit: Some(50),
            start: Some(70000),
            concurrent: Some(0),
            mode: Some(CliScrapeMode::Listing),
            dump: None,
            report_dir: None,
        };
        let mut config = MigrationConfig::default();
        args.apply(&mut config);
        assert_eq!(config.scrape.limit, 50);
        assert_eq!(config.scrape.start_id, 70000);
        assert_eq!(config.max_concurrent_requests, 1);
        assert_eq!(config.scrape.mode, ScrapeMode::Listing);
        assert!(config.dry_run);
    }
}
