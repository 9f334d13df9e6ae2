//! Structure dump of a legacy source: tables, columns, row counts and a
//! couple of sample rows. Used to find out which name variants an unknown
//! legacy database actually uses before migrating it.

use crate::error::MigrationResult;
use crate::legacy::LegacySource;
use crate::record::LegacyRecord;
use chrono::Utc;
use serde::Serialize;
use tracing::warn;

const SAMPLE_ROWS: usize = 2;

#[derive(Debug, Clone, Serialize)]
pub struct SourceInspection {
    pub source: String,
    pub generated_at: String,
    pub tables: Vec<TableInspection>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableInspection {
    pub name: String,
    pub columns: Vec<String>,
    pub row_count: Option<u64>,
    pub sample: Vec<LegacyRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Inspect every table. A table that cannot be read is reported with its
/// error instead of failing the whole dump.
pub fn inspect(source: &dyn LegacySource) -> MigrationResult<SourceInspection> {
    let mut tables = Vec::new();
    for name in source.list_tables()? {
        tables.push(inspect_table(source, name));
    }
    Ok(SourceInspection {
        source: source.describe(),
        generated_at: Utc::now().to_rfc3339(),
        tables,
    })
}

fn inspect_table(source: &dyn LegacySource, name: String) -> TableInspection {
    let mut table = TableInspection {
        columns: Vec::new(),
        row_count: None,
        sample: Vec::new(),
        error: None,
        name,
    };

    let read = || -> MigrationResult<(Vec<String>, u64, Vec<LegacyRecord>)> {
        let columns = source.columns(&table.name)?;
        let count = source.row_count(&table.name)?;
        let sample = source
            .read_table(&table.name)?
            .take(SAMPLE_ROWS)
            .collect::<MigrationResult<Vec<_>>>()?;
        Ok((columns, count, sample))
    };

    match read() {
        Ok((columns, count, sample)) => {
            table.columns = columns;
            table.row_count = Some(count);
            table.sample = sample;
        }
        Err(err) => {
            warn!(table = %table.name, error = %err, "table could not be inspected");
            table.error = Some(err.to_string());
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::legacy::open_source;
    use tempfile::TempDir;

    #[test]
    fn test_inspect_csv_source() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("ARTIKLI.csv"),
            "SF_ARTIKLA,NAZIV\n1,Kabl\n2,Cijev\n3,Vijak\n",
        )
        .unwrap();
        let source = open_source(temp.path(), "windows-1250").unwrap();

        let inspection = inspect(source.as_ref()).unwrap();
        assert_eq!(inspection.tables.len(), 1);
        let table = &inspection.tables[0];
        assert_eq!(table.name, "ARTIKLI");
        assert_eq!(table.columns, vec!["SF_ARTIKLA", "NAZIV"]);
        assert_eq!(table.row_count, Some(3));
        assert_eq!(table.sample.len(), 2);

        let json = serde_json::to_value(&inspection).unwrap();
        assert_eq!(json["tables"][0]["sample"][0]["NAZIV"], "Kabl");
        assert!(json["tables"][0].get("error").is_none());
    }
}
