//! Run configuration.
//!
//! Consolidates configuration from tiers with field-by-field YAML merging:
//! 1. **Defaults** - compiled in
//! 2. **Project** - `$CWD/legacy-bridge/config.yaml`
//! 3. **User** - `~/.legacy-bridge/config.yaml`
//! 4. **Environment** - variables listed below
//!
//! CLI flags are applied last by the binary.
//!
//! ## Environment Variables
//! - `LEGACY_BRIDGE_CONFIG_PATH` - Explicit config file (replaces project and user tiers)
//! - `LEGACY_BRIDGE_PROJECT_DIR` / `LEGACY_BRIDGE_USER_DIR` - Tier directories
//! - `LEGACY_BRIDGE_SOURCE_PATH` - Legacy database file or CSV directory
//! - `LEGACY_BRIDGE_DB_PATH` - Target database
//! - `LEGACY_BRIDGE_REPORT_DIR` - Report directory
//! - `BATCH_SIZE`, `MAX_CONCURRENT_REQUESTS`, `REQUEST_DELAY_MS`,
//!   `RETRY_ATTEMPTS`, `RETRY_DELAY_MS` - Numeric tuning
//! - `REGISTRY_COOKIES` - Session cookie header for the registry site
//!
//! `dry_run` is deliberately absent: only `--live` turns writes on.

mod loader;
mod merge;
mod types;

pub use loader::{CONFIG_PATH_ENV, ConfigLoader, ConfigPaths, ConfigTier, apply_env_overrides};
pub use merge::{merge_into, merge_tiers};
pub use types::*;
