//! Legacy database readers.
//!
//! A legacy source is either a SQLite file converted from the old desktop
//! database or a directory of per-table CSV exports. Both expose table
//! enumeration and lazy row iteration as [`LegacyRecord`]s.

pub mod csv_dir;
pub mod sqlite;

use crate::error::{MigrationError, MigrationResult};
use crate::record::LegacyRecord;
use std::path::Path;
use tracing::{info, warn};

pub use csv_dir::CsvDirSource;
pub use sqlite::SqliteSource;

/// Lazy row sequence. Each call to `read_table` re-reads from the source.
pub type RecordIter<'a> = Box<dyn Iterator<Item = MigrationResult<LegacyRecord>> + 'a>;

pub trait LegacySource {
    /// Human-readable location, for logs and reports.
    fn describe(&self) -> String;

    fn list_tables(&self) -> MigrationResult<Vec<String>>;

    fn columns(&self, table: &str) -> MigrationResult<Vec<String>>;

    fn row_count(&self, table: &str) -> MigrationResult<u64>;

    fn read_table<'a>(&'a self, table: &str) -> MigrationResult<RecordIter<'a>>;
}

/// Open a legacy source. Directories are read as CSV exports, files as SQLite.
pub fn open_source(path: &Path, legacy_encoding: &str) -> MigrationResult<Box<dyn LegacySource>> {
    if !path.exists() {
        return Err(MigrationError::source_unavailable(
            path.display(),
            "path does not exist",
        ));
    }
    if path.is_dir() {
        Ok(Box::new(CsvDirSource::open(path, legacy_encoding)?))
    } else {
        Ok(Box::new(SqliteSource::open(path)?))
    }
}

/// Pick the first table matching one of `candidates`: exact name first, then
/// case-insensitive. The decision is logged either way.
pub fn find_table(
    source: &dyn LegacySource,
    entity: &str,
    candidates: &[&str],
) -> MigrationResult<Option<String>> {
    let tables = source.list_tables()?;
    for (i, candidate) in candidates.iter().enumerate() {
        let hit = tables
            .iter()
            .find(|t| t.as_str() == *candidate)
            .or_else(|| tables.iter().find(|t| t.eq_ignore_ascii_case(candidate)));
        if let Some(table) = hit {
            if i == 0 && table == candidate {
                info!(entity, table = %table, "source table resolved");
            } else {
                info!(entity, table = %table, tried = ?&candidates[..i], "source table resolved via fallback name");
            }
            return Ok(Some(table.clone()));
        }
    }
    warn!(entity, candidates = ?candidates, "no source table matched");
    Ok(None)
}
