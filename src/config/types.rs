//! Configuration types.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How the registry is scraped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeMode {
    /// One company detail page per id, walking downward from `start_id`.
    #[default]
    Detail,
    /// Paged JSON listing endpoint (or an offline dump of it).
    Listing,
}

/// Run configuration, built once at start-up and immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Legacy SQLite file, or a directory of `<TABLE>.csv` exports.
    #[serde(default = "default_source_path")]
    pub source_path: PathBuf,

    /// Target SQLite store.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Records per write window.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Writes are skipped unless the run was started with `--live`.
    /// Never read from config files or the environment.
    #[serde(skip_deserializing, default = "default_dry_run")]
    pub dry_run: bool,

    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,

    /// Delay before every request after the first.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    /// Retries after the first attempt on transient fetch failures.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Batches between progress log lines.
    #[serde(default = "default_progress_every")]
    pub progress_every: usize,

    /// Directory for run report files.
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,

    /// Error details kept per entity in the report.
    #[serde(default = "default_max_errors")]
    pub max_errors_per_entity: usize,

    /// Fallback encoding for CSV exports that are not valid UTF-8.
    #[serde(default = "default_legacy_encoding")]
    pub legacy_encoding: String,

    #[serde(default)]
    pub scrape: ScrapeConfig,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            source_path: default_source_path(),
            db_path: default_db_path(),
            batch_size: default_batch_size(),
            dry_run: default_dry_run(),
            max_concurrent_requests: default_max_concurrent_requests(),
            request_delay_ms: default_request_delay_ms(),
            retry_attempts: default_retry_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            progress_every: default_progress_every(),
            report_dir: default_report_dir(),
            max_errors_per_entity: default_max_errors(),
            legacy_encoding: default_legacy_encoding(),
            scrape: ScrapeConfig::default(),
        }
    }
}

/// Registry scraping configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub mode: ScrapeMode,

    /// First company id in detail mode.
    #[serde(default = "default_start_id")]
    pub start_id: u64,

    /// Companies to fetch in detail mode.
    #[serde(default = "default_limit")]
    pub limit: usize,

    #[serde(default = "default_page_size")]
    pub page_size: usize,

    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    /// Session cookie header sent with every request.
    #[serde(default, skip_serializing)]
    pub cookies: Option<String>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Fiscal year column read from business result tables.
    #[serde(default)]
    pub results_year: Option<i32>,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            mode: ScrapeMode::default(),
            start_id: default_start_id(),
            limit: default_limit(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            cookies: None,
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            results_year: None,
        }
    }
}

fn default_source_path() -> PathBuf {
    PathBuf::from("legacy/legacy.db")
}

fn default_db_path() -> PathBuf {
    PathBuf::from("legacy-bridge/target.db")
}

fn default_batch_size() -> usize {
    100
}

fn default_dry_run() -> bool {
    true
}

fn default_max_concurrent_requests() -> usize {
    10
}

fn default_request_delay_ms() -> u64 {
    1000
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    5000
}

fn default_progress_every() -> usize {
    10
}

fn default_report_dir() -> PathBuf {
    PathBuf::from("legacy-bridge/reports")
}

fn default_max_errors() -> usize {
    50
}

fn default_legacy_encoding() -> String {
    "windows-1250".to_string()
}

fn default_base_url() -> String {
    "https://www.companywall.me".to_string()
}

fn default_start_id() -> u64 {
    65000
}

fn default_limit() -> usize {
    10
}

fn default_page_size() -> usize {
    500
}

fn default_max_pages() -> usize {
    1
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl MigrationConfig {
    /// Load configuration from a single YAML file, without tier merging.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: MigrationConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Batch size with the lower bound applied.
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.max(1)
    }

    /// Ensure the target database directory exists.
    pub fn ensure_db_dir(&self) -> Result<()> {
        if let Some(parent) = self.db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}
