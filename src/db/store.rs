//! The operations the pipeline needs from a target store, and their SQLite
//! implementation.
//!
//! Rows travel as JSON objects. Inserts bind the whole row once and pull each
//! column out with `json_extract`, so a single statement shape serves every
//! table without per-type parameter plumbing.

use super::{Database, now_rfc3339};
use crate::error::{MigrationError, MigrationResult};
use anyhow::{Context, anyhow, bail};
use rusqlite::OptionalExtension;
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use uuid::Uuid;

/// One row in the target vocabulary.
pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertOutcome {
    pub inserted: usize,
    /// Rows that merged into an existing row (only when duplicates are not ignored).
    pub updated: usize,
    /// Rows dropped because their conflict key already existed.
    pub ignored: usize,
}

pub trait TargetStore: Send + Sync {
    /// Write `rows` into `table` as one unit. With `ignore_duplicates`, rows
    /// whose `conflict_column` already exists are left untouched; otherwise
    /// their non-null fields are merged into the existing row, keeping its id
    /// and the `source` it was first written from.
    fn upsert(
        &self,
        table: &str,
        rows: &[Row],
        conflict_column: &str,
        ignore_duplicates: bool,
    ) -> MigrationResult<UpsertOutcome>;

    /// Equality-filtered projection. Empty `columns` selects everything.
    fn select(
        &self,
        table: &str,
        columns: &[&str],
        filters: &[(&str, Value)],
        limit: Option<usize>,
    ) -> MigrationResult<Vec<Row>>;

    fn count(&self, table: &str) -> MigrationResult<u64>;
}

/// Validate and quote a table or column name.
fn ident(name: &str) -> anyhow::Result<String> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        bail!("invalid identifier '{name}'");
    }
    Ok(format!("\"{name}\""))
}

fn json_column(column: &str) -> String {
    format!("json_extract(?1, '$.\"{column}\"')")
}

fn upsert_sql(
    table: &str,
    row: &Row,
    conflict_column: &str,
    ignore_duplicates: bool,
) -> anyhow::Result<String> {
    let table_ident = ident(table)?;
    let conflict = ident(conflict_column)?;

    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());
    let mut updates = Vec::new();
    for key in row.keys() {
        let column = ident(key)?;
        values.push(json_column(key));
        match key.as_str() {
            "id" | "created_at" | "source" => {}
            "updated_at" => updates.push(format!("{column} = excluded.{column}")),
            k if k == conflict_column => {}
            _ => updates.push(format!(
                "{column} = COALESCE(excluded.{column}, {table_ident}.{column})"
            )),
        }
        columns.push(column);
    }

    let action = if ignore_duplicates || updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };

    Ok(format!(
        "INSERT INTO {table_ident} ({}) VALUES ({}) ON CONFLICT({conflict}) {action}",
        columns.join(", "),
        values.join(", "),
    ))
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn from_sql_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null | ValueRef::Blob(_) => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}

impl TargetStore for Database {
    fn upsert(
        &self,
        table: &str,
        rows: &[Row],
        conflict_column: &str,
        ignore_duplicates: bool,
    ) -> MigrationResult<UpsertOutcome> {
        if rows.is_empty() {
            return Ok(UpsertOutcome::default());
        }
        let exists_sql = format!(
            "SELECT 1 FROM {} WHERE {} = ?1",
            ident(table).map_err(MigrationError::store)?,
            ident(conflict_column).map_err(MigrationError::store)?,
        );
        let now = now_rfc3339();

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut outcome = UpsertOutcome::default();

            for row in rows {
                let key = row
                    .get(conflict_column)
                    .filter(|v| !v.is_null())
                    .ok_or_else(|| anyhow!("row has no value for {conflict_column}"))?;

                let existed = !ignore_duplicates
                    && tx
                        .prepare_cached(&exists_sql)?
                        .query_row([to_sql_value(key)], |_| Ok(()))
                        .optional()?
                        .is_some();

                let mut full = row.clone();
                full.entry("id")
                    .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
                full.entry("created_at")
                    .or_insert_with(|| Value::String(now.clone()));
                full.insert("updated_at".to_string(), Value::String(now.clone()));

                let sql = upsert_sql(table, &full, conflict_column, ignore_duplicates)?;
                let payload = serde_json::to_string(&full).context("serialize row")?;
                let changed = tx.prepare_cached(&sql)?.execute([payload])?;

                if changed == 0 {
                    outcome.ignored += 1;
                } else if existed {
                    outcome.updated += 1;
                } else {
                    outcome.inserted += 1;
                }
            }

            tx.commit()?;
            Ok(outcome)
        })
        .map_err(MigrationError::store)
    }

    fn select(
        &self,
        table: &str,
        columns: &[&str],
        filters: &[(&str, Value)],
        limit: Option<usize>,
    ) -> MigrationResult<Vec<Row>> {
        self.with_conn(|conn| {
            let projection = if columns.is_empty() {
                "*".to_string()
            } else {
                columns
                    .iter()
                    .map(|c| ident(c))
                    .collect::<anyhow::Result<Vec<_>>>()?
                    .join(", ")
            };
            let mut sql = format!("SELECT {projection} FROM {}", ident(table)?);
            if !filters.is_empty() {
                let clauses = filters
                    .iter()
                    .enumerate()
                    .map(|(i, (column, _))| Ok(format!("{} = ?{}", ident(column)?, i + 1)))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                sql.push_str(" WHERE ");
                sql.push_str(&clauses.join(" AND "));
            }
            sql.push_str(" ORDER BY rowid");
            if let Some(limit) = limit {
                sql.push_str(&format!(" LIMIT {limit}"));
            }

            let mut stmt = conn.prepare(&sql)?;
            let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
            let params: Vec<SqlValue> = filters.iter().map(|(_, v)| to_sql_value(v)).collect();
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                    let mut out = Row::new();
                    for (i, name) in names.iter().enumerate() {
                        out.insert(name.clone(), from_sql_value(row.get_ref(i)?));
                    }
                    Ok(out)
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .map_err(MigrationError::store)
    }

    fn count(&self, table: &str) -> MigrationResult<u64> {
        self.with_conn(|conn| {
            let sql = format!("SELECT COUNT(*) FROM {}", ident(table)?);
            let n: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
            Ok(u64::try_from(n).unwrap_or(0))
        })
        .map_err(MigrationError::store)
    }
}
