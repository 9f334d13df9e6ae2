//! Read-only SQLite legacy source.

use super::{LegacySource, RecordIter};
use crate::error::{MigrationError, MigrationResult};
use crate::record::{LegacyRecord, LegacyValue};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// Rows fetched per page while iterating a table.
const PAGE_SIZE: i64 = 500;

pub struct SqliteSource {
    path: PathBuf,
    conn: Connection,
}

impl SqliteSource {
    /// Open the file read-only. A file that is not a database fails here,
    /// not on the first read.
    pub fn open(path: &Path) -> MigrationResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| MigrationError::source_unavailable(path.display(), e))?;

        conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        })
        .map_err(|e| MigrationError::source_unavailable(path.display(), e))?;

        Ok(Self {
            path: path.to_path_buf(),
            conn,
        })
    }

    fn quoted(table: &str) -> String {
        format!("\"{}\"", table.replace('"', "\"\""))
    }
}

impl LegacySource for SqliteSource {
    fn describe(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }

    fn list_tables(&self) -> MigrationResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name FROM sqlite_master
                 WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%'
                 ORDER BY name",
            )
            .map_err(|e| MigrationError::source_unavailable(self.path.display(), e))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .and_then(|rows| rows.collect::<Result<Vec<_>, _>>())
            .map_err(|e| MigrationError::source_unavailable(self.path.display(), e))?;
        Ok(names)
    }

    fn columns(&self, table: &str) -> MigrationResult<Vec<String>> {
        let stmt = self
            .conn
            .prepare(&format!("SELECT * FROM {} LIMIT 0", Self::quoted(table)))
            .map_err(|e| MigrationError::table_unreadable(table, e))?;
        Ok(stmt.column_names().into_iter().map(String::from).collect())
    }

    fn row_count(&self, table: &str) -> MigrationResult<u64> {
        self.conn
            .query_row(
                &format!("SELECT count(*) FROM {}", Self::quoted(table)),
                [],
                |row| row.get::<_, i64>(0),
            )
            .map(|n| n.max(0) as u64)
            .map_err(|e| MigrationError::table_unreadable(table, e))
    }

    fn read_table<'a>(&'a self, table: &str) -> MigrationResult<RecordIter<'a>> {
        // Surface an unreadable table before handing out an iterator.
        let columns = self.columns(table)?;
        Ok(Box::new(Pager {
            conn: &self.conn,
            table: table.to_string(),
            columns,
            offset: 0,
            buffer: VecDeque::new(),
            done: false,
        }))
    }
}

/// Pages through a table with LIMIT/OFFSET so large tables never sit in memory.
struct Pager<'a> {
    conn: &'a Connection,
    table: String,
    columns: Vec<String>,
    offset: i64,
    buffer: VecDeque<LegacyRecord>,
    done: bool,
}

impl Pager<'_> {
    fn fill(&mut self) -> MigrationResult<()> {
        let sql = format!(
            "SELECT * FROM {} LIMIT ?1 OFFSET ?2",
            SqliteSource::quoted(&self.table)
        );
        let mut stmt = self
            .conn
            .prepare_cached(&sql)
            .map_err(|e| MigrationError::table_unreadable(&self.table, e))?;
        let mut rows = stmt
            .query([PAGE_SIZE, self.offset])
            .map_err(|e| MigrationError::table_unreadable(&self.table, e))?;

        let mut fetched = 0;
        while let Some(row) = rows
            .next()
            .map_err(|e| MigrationError::table_unreadable(&self.table, e))?
        {
            let mut record = LegacyRecord::new();
            for (i, name) in self.columns.iter().enumerate() {
                let value = row
                    .get_ref(i)
                    .map_err(|e| MigrationError::table_unreadable(&self.table, e))?;
                record.insert(name.clone(), convert(value));
            }
            self.buffer.push_back(record);
            fetched += 1;
        }

        self.offset += fetched;
        if fetched < PAGE_SIZE {
            self.done = true;
        }
        Ok(())
    }
}

impl Iterator for Pager<'_> {
    type Item = MigrationResult<LegacyRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.done {
            if let Err(e) = self.fill() {
                self.done = true;
                return Some(Err(e));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

fn convert(value: ValueRef<'_>) -> LegacyValue {
    match value {
        ValueRef::Null => LegacyValue::Null,
        ValueRef::Integer(i) => LegacyValue::Integer(i),
        ValueRef::Real(r) => LegacyValue::from(r),
        ValueRef::Text(bytes) => LegacyValue::text(&String::from_utf8_lossy(bytes)),
        // Attachments and OLE objects carry nothing the mapper can use.
        ValueRef::Blob(_) => LegacyValue::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture(dir: &TempDir, rows: usize) -> PathBuf {
        let path = dir.path().join("legacy.db");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE FIRME (FIRMA_ID INTEGER, NAZIV TEXT, MATICNI TEXT, DUG REAL);",
        )
        .unwrap();
        for i in 0..rows {
            conn.execute(
                "INSERT INTO FIRME VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![i as i64, format!("  Firma {i} "), "", 1.5],
            )
            .unwrap();
        }
        path
    }

    #[test]
    fn test_reads_all_rows_across_pages() {
        let dir = TempDir::new().unwrap();
        let path = fixture(&dir, 1203);
        let source = SqliteSource::open(&path).unwrap();

        assert_eq!(source.list_tables().unwrap(), vec!["FIRME".to_string()]);
        assert_eq!(source.row_count("FIRME").unwrap(), 1203);

        let rows: Vec<_> = source
            .read_table("FIRME")
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows.len(), 1203);
        assert_eq!(rows[5].get("NAZIV"), Some(&LegacyValue::Text("Firma 5".into())));
        assert_eq!(rows[5].get("MATICNI"), Some(&LegacyValue::Null));
        assert_eq!(rows[5].get("DUG"), Some(&LegacyValue::Decimal(1.5)));
    }

    #[test]
    fn test_rereading_starts_over() {
        let dir = TempDir::new().unwrap();
        let source = SqliteSource::open(&fixture(&dir, 3)).unwrap();
        assert_eq!(source.read_table("FIRME").unwrap().count(), 3);
        assert_eq!(source.read_table("FIRME").unwrap().count(), 3);
    }

    #[test]
    fn test_missing_table_is_unreadable_not_fatal() {
        let dir = TempDir::new().unwrap();
        let source = SqliteSource::open(&fixture(&dir, 1)).unwrap();
        let err = match source.read_table("NALOG") {
            Ok(_) => panic!("expected failure"),
            Err(e) => e,
        };
        assert!(matches!(err, MigrationError::TableUnreadable { .. }));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_not_a_database() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("garbage.db");
        std::fs::write(&path, b"this is not sqlite at all, just some bytes").unwrap();
        assert!(matches!(
            SqliteSource::open(&path),
            Err(MigrationError::SourceUnavailable { .. })
        ));
    }
}
