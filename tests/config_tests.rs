//! Integration tests for tiered configuration loading.

use legacy_bridge::config::{CONFIG_PATH_ENV, ConfigLoader, ConfigPaths, ScrapeMode};
use std::collections::HashMap;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_tier(dir: &std::path::Path, yaml: &str) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join("config.yaml"), yaml).unwrap();
    dir.to_path_buf()
}

#[test]
fn config_files_cannot_turn_off_dry_run() {
    let temp = TempDir::new().unwrap();
    let project = write_tier(&temp.path().join("project"), "dry_run: false\nbatch_size: 10\n");

    let loader =
        ConfigLoader::load_with(ConfigPaths::with_dirs(Some(project), None), |_| None).unwrap();
    assert!(loader.config().dry_run);
    assert_eq!(loader.config().batch_size, 10);
}

#[test]
fn environment_beats_file_tiers() {
    let temp = TempDir::new().unwrap();
    let project = write_tier(
        &temp.path().join("project"),
        "batch_size: 10\nmax_concurrent_requests: 2\nscrape:\n  mode: listing\n",
    );
    let env: HashMap<&str, &str> = HashMap::from([
        ("BATCH_SIZE", "500"),
        ("LEGACY_BRIDGE_DB_PATH", "/tmp/target.db"),
    ]);

    let loader = ConfigLoader::load_with(ConfigPaths::with_dirs(Some(project), None), |name| {
        env.get(name).map(|v| v.to_string())
    })
    .unwrap();
    let config = loader.config();
    assert_eq!(config.batch_size, 500);
    assert_eq!(config.max_concurrent_requests, 2);
    assert_eq!(config.scrape.mode, ScrapeMode::Listing);
    assert_eq!(config.db_path, PathBuf::from("/tmp/target.db"));
}

#[test]
fn invalid_numeric_environment_value_is_rejected() {
    let temp = TempDir::new().unwrap();
    let result = ConfigLoader::load_with(
        ConfigPaths::with_dirs(Some(temp.path().join("none")), None),
        |name| (name == "RETRY_ATTEMPTS").then(|| "many".to_string()),
    );
    assert!(result.is_err());
}

#[test]
fn missing_explicit_config_file_is_an_error() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("nope.yaml").to_string_lossy().to_string();
    let result = ConfigLoader::load_with(ConfigPaths::with_dirs(None, None), move |name| {
        (name == CONFIG_PATH_ENV).then(|| missing.clone())
    });
    assert!(result.is_err());
}
