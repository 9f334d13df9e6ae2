//! Configuration loader with tier-based merging.
//!
//! Loads configuration from multiple tiers and merges them field-by-field.

use super::merge::merge_tiers;
use super::types::MigrationConfig;
use crate::error::MigrationError;
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, warn};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "LEGACY_BRIDGE_CONFIG_PATH";

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    Defaults = 0,
    /// `$CWD/legacy-bridge/config.yaml`
    Project = 1,
    /// `~/.legacy-bridge/config.yaml`
    User = 2,
    Environment = 3,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Directories searched for `config.yaml`.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub project_dir: Option<PathBuf>,
    pub user_dir: Option<PathBuf>,
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::discover()
    }
}

impl ConfigPaths {
    /// Discover configuration paths from environment and defaults.
    pub fn discover() -> Self {
        let user_dir = std::env::var("LEGACY_BRIDGE_USER_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".legacy-bridge")));

        let project_dir = std::env::var("LEGACY_BRIDGE_PROJECT_DIR")
            .ok()
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from("legacy-bridge")));

        Self {
            project_dir,
            user_dir,
        }
    }

    pub fn with_dirs(project_dir: Option<PathBuf>, user_dir: Option<PathBuf>) -> Self {
        Self {
            project_dir,
            user_dir,
        }
    }

    fn tier_file(&self, tier: ConfigTier) -> Option<PathBuf> {
        let dir = match tier {
            ConfigTier::Project => self.project_dir.as_ref(),
            ConfigTier::User => self.user_dir.as_ref(),
            _ => None,
        }?;
        let file = dir.join("config.yaml");
        file.exists().then_some(file)
    }
}

/// Configuration loader that handles tier-based merging.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    pub paths: ConfigPaths,
    config: MigrationConfig,
    /// Files that contributed, lowest tier first.
    sources: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Load configuration from all tiers with proper merging.
    pub fn load() -> Result<Self> {
        Self::load_with_paths(ConfigPaths::discover())
    }

    /// Load configuration with explicit paths, reading overrides from the
    /// process environment.
    pub fn load_with_paths(paths: ConfigPaths) -> Result<Self> {
        Self::load_with(paths, |name| std::env::var(name).ok())
    }

    /// Load configuration with explicit paths and an environment lookup.
    pub fn load_with<F>(paths: ConfigPaths, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut tiers: Vec<Value> = vec![serde_json::to_value(MigrationConfig::default())?];
        let mut sources = Vec::new();

        if let Some(explicit) = env(CONFIG_PATH_ENV) {
            // An explicit file replaces the project and user tiers.
            let path = PathBuf::from(explicit);
            tiers.push(read_tier(&path)?);
            sources.push(path);
        } else {
            for tier in [ConfigTier::Project, ConfigTier::User] {
                let Some(file) = paths.tier_file(tier) else {
                    continue;
                };
                match read_tier(&file) {
                    Ok(value) => {
                        debug!(%tier, path = %file.display(), "loaded config tier");
                        tiers.push(value);
                        sources.push(file);
                    }
                    Err(e) => warn!(%tier, path = %file.display(), "ignoring config tier: {e:#}"),
                }
            }
        }

        let merged = merge_tiers(tiers);
        let mut config: MigrationConfig =
            serde_json::from_value(merged).context("Invalid merged configuration")?;

        apply_env_overrides(&mut config, env)?;

        Ok(Self {
            paths,
            config,
            sources,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &MigrationConfig {
        &self.config
    }

    /// Get mutable access to the configuration.
    pub fn config_mut(&mut self) -> &mut MigrationConfig {
        &mut self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> MigrationConfig {
        self.config
    }

    /// Config files that were merged, lowest tier first.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }
}

fn read_tier(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(value)
}

fn env_parse<T, F>(env: &F, name: &str) -> Result<Option<T>, MigrationError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match env(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| MigrationError::Config(format!("{name}={raw:?}: {e}"))),
    }
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides<F>(config: &mut MigrationConfig, env: F) -> Result<(), MigrationError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = env("LEGACY_BRIDGE_SOURCE_PATH") {
        config.source_path = PathBuf::from(path);
    }
    if let Some(path) = env("LEGACY_BRIDGE_DB_PATH") {
        config.db_path = PathBuf::from(path);
    }
    if let Some(path) = env("LEGACY_BRIDGE_REPORT_DIR") {
        config.report_dir = PathBuf::from(path);
    }
    if let Some(v) = env_parse(&env, "BATCH_SIZE")? {
        config.batch_size = v;
    }
    if let Some(v) = env_parse(&env, "MAX_CONCURRENT_REQUESTS")? {
        config.max_concurrent_requests = v;
    }
    if let Some(v) = env_parse(&env, "REQUEST_DELAY_MS")? {
        config.request_delay_ms = v;
    }
    if let Some(v) = env_parse(&env, "RETRY_ATTEMPTS")? {
        config.retry_attempts = v;
    }
    if let Some(v) = env_parse(&env, "RETRY_DELAY_MS")? {
        config.retry_delay_ms = v;
    }
    if let Some(cookies) = env("REGISTRY_COOKIES").filter(|c| !c.trim().is_empty()) {
        config.scrape.cookies = Some(cookies);
    }
    Ok(())
}
