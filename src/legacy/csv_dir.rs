//! Directory of per-table CSV exports (`FIRME.csv`, `ARTIKLI.csv`, ...).
//!
//! Desktop exports are frequently Windows-1250 rather than UTF-8. Each field
//! is decoded as UTF-8 when valid and with the configured legacy encoding
//! otherwise, so mixed files still read.

use super::{LegacySource, RecordIter};
use crate::error::{MigrationError, MigrationResult};
use crate::record::{LegacyRecord, LegacyValue};
use encoding_rs::{Encoding, WINDOWS_1250};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::warn;

pub struct CsvDirSource {
    dir: PathBuf,
    encoding: &'static Encoding,
}

impl CsvDirSource {
    pub fn open(dir: &Path, legacy_encoding: &str) -> MigrationResult<Self> {
        std::fs::read_dir(dir).map_err(|e| MigrationError::source_unavailable(dir.display(), e))?;
        let encoding = Encoding::for_label(legacy_encoding.as_bytes()).unwrap_or_else(|| {
            warn!(
                label = legacy_encoding,
                "unknown legacy encoding, using windows-1250"
            );
            WINDOWS_1250
        });
        Ok(Self {
            dir: dir.to_path_buf(),
            encoding,
        })
    }

    fn table_path(&self, table: &str) -> MigrationResult<PathBuf> {
        let exact = self.dir.join(format!("{table}.csv"));
        if exact.is_file() {
            return Ok(exact);
        }
        self.list_tables()?
            .into_iter()
            .find(|t| t.eq_ignore_ascii_case(table))
            .map(|t| self.dir.join(format!("{t}.csv")))
            .ok_or_else(|| MigrationError::table_unreadable(table, "no such export file"))
    }

    fn reader(&self, table: &str) -> MigrationResult<csv::Reader<File>> {
        let path = self.table_path(table)?;
        csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&path)
            .map_err(|e| MigrationError::table_unreadable(table, e))
    }

    fn decode(&self, bytes: &[u8]) -> String {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            Err(_) => {
                let (decoded, _, _) = self.encoding.decode(bytes);
                decoded.into_owned()
            }
        }
    }

    fn headers(&self, reader: &mut csv::Reader<File>, table: &str) -> MigrationResult<Vec<String>> {
        let headers = reader
            .byte_headers()
            .map_err(|e| MigrationError::table_unreadable(table, e))?;
        Ok(headers.iter().map(|h| self.decode(h).trim().to_string()).collect())
    }
}

impl LegacySource for CsvDirSource {
    fn describe(&self) -> String {
        format!("csv:{}", self.dir.display())
    }

    fn list_tables(&self) -> MigrationResult<Vec<String>> {
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| MigrationError::source_unavailable(self.dir.display(), e))?;
        let mut tables: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
            })
            .filter_map(|path| path.file_stem().map(|s| s.to_string_lossy().to_string()))
            .collect();
        tables.sort();
        Ok(tables)
    }

    fn columns(&self, table: &str) -> MigrationResult<Vec<String>> {
        let mut reader = self.reader(table)?;
        self.headers(&mut reader, table)
    }

    fn row_count(&self, table: &str) -> MigrationResult<u64> {
        let mut reader = self.reader(table)?;
        let mut record = csv::ByteRecord::new();
        let mut count = 0u64;
        while reader
            .read_byte_record(&mut record)
            .map_err(|e| MigrationError::table_unreadable(table, e))?
        {
            count += 1;
        }
        Ok(count)
    }

    fn read_table<'a>(&'a self, table: &str) -> MigrationResult<RecordIter<'a>> {
        let mut reader = self.reader(table)?;
        let headers = self.headers(&mut reader, table)?;
        let table = table.to_string();
        let mut failed = false;

        let rows = reader.into_byte_records().map_while(move |result| {
            if failed {
                return None;
            }
            Some(match result {
                Ok(raw) => {
                    let mut record = LegacyRecord::new();
                    for (i, name) in headers.iter().enumerate() {
                        let value = raw
                            .get(i)
                            .map(|bytes| LegacyValue::text(&self.decode(bytes)))
                            .unwrap_or(LegacyValue::Null);
                        record.insert(name.clone(), value);
                    }
                    Ok(record)
                }
                Err(e) => {
                    failed = true;
                    Err(MigrationError::table_unreadable(&table, e))
                }
            })
        });
        Ok(Box::new(rows))
    }
}
