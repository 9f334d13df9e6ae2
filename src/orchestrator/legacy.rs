//! Legacy database pipeline: companies, products, invoices, work orders, then
//! the relationship tables.

use super::{RunContext, verify};
use crate::db::IdMaps;
use crate::error::{ErrorRecord, MigrationError, MigrationResult};
use crate::legacy::{LegacySource, find_table, open_source};
use crate::mapping::{EntityType, column_plan, map};
use crate::report::{EntityState, RunMode, RunReport};
use crate::upsert::BatchUpsertEngine;
use std::collections::BTreeSet;
use tracing::{debug, error, info, warn};

/// Id maps a stage reads through during foreign-key resolution.
fn dependencies(entity: EntityType) -> &'static [EntityType] {
    match entity {
        EntityType::Invoices | EntityType::WorkOrders => &[EntityType::Companies],
        EntityType::InvoiceWorkOrderLinks => &[EntityType::Invoices, EntityType::WorkOrders],
        EntityType::WorkOrderAdditionalItems => &[EntityType::WorkOrders],
        EntityType::Companies | EntityType::Products => &[],
    }
}

/// Whether later stages look this entity up by its legacy key.
fn is_fk_target(entity: EntityType) -> bool {
    matches!(
        entity,
        EntityType::Companies | EntityType::Invoices | EntityType::WorkOrders
    )
}

/// Run the legacy migration for `selected` entity types (all when empty).
///
/// Never fails: fatal errors end up as an aborted report.
pub fn run_legacy(ctx: &RunContext, selected: &[EntityType]) -> RunReport {
    let selected: BTreeSet<EntityType> = if selected.is_empty() {
        EntityType::ALL.into_iter().collect()
    } else {
        selected.iter().copied().collect()
    };

    let mut report = RunReport::new(RunMode::Legacy, ctx.config.dry_run);
    report.start();
    for entity in EntityType::ALL {
        let state = if selected.contains(&entity) {
            EntityState::Pending
        } else {
            EntityState::Skipped
        };
        report.set_state(entity, state);
    }

    info!(
        source = %ctx.config.source_path.display(),
        dry_run = ctx.config.dry_run,
        batch_size = ctx.config.effective_batch_size(),
        "starting legacy migration"
    );

    match migrate(ctx, &selected, &mut report) {
        Ok(()) => match verify(ctx.store.as_ref()) {
            Ok(verification) => {
                report.verification = Some(verification);
                report.settle_entities(true);
            }
            Err(err) => {
                warn!(error = %err, "verification failed");
                report.errors.push(ErrorRecord::from(&err));
                report.settle_entities(false);
            }
        },
        Err(err) => {
            error!(error = %err, "migration aborted");
            report.abort(&err);
            report.settle_entities(false);
        }
    }

    report.finish();
    report
}

fn migrate(
    ctx: &RunContext,
    selected: &BTreeSet<EntityType>,
    report: &mut RunReport,
) -> MigrationResult<()> {
    let source = open_source(&ctx.config.source_path, &ctx.config.legacy_encoding)?;
    info!(source = %source.describe(), "legacy source opened");

    let store = ctx.store.as_ref();
    let engine =
        BatchUpsertEngine::new(store, ctx.batch_options(true)).with_cancellation(ctx.cancel.clone());
    let mut maps = IdMaps::default();
    let mut built = BTreeSet::new();

    for entity in EntityType::ALL {
        if !selected.contains(&entity) {
            continue;
        }

        let needed: Vec<_> = dependencies(entity)
            .iter()
            .filter(|dep| !built.contains(*dep))
            .copied()
            .collect();
        if !needed.is_empty() {
            report.set_state(entity, EntityState::ResolvingKeys);
            for dep in needed {
                maps.refresh(store, dep)?;
                built.insert(dep);
            }
        }

        run_stage(ctx, source.as_ref(), entity, &engine, &mut maps, report)?;

        if is_fk_target(entity) {
            maps.refresh(store, entity)?;
            built.insert(entity);
        }
        if ctx.cancel.is_cancelled() {
            return Err(MigrationError::Aborted("cancelled".into()));
        }
    }

    Ok(())
}

fn run_stage(
    ctx: &RunContext,
    source: &dyn LegacySource,
    entity: EntityType,
    engine: &BatchUpsertEngine<'_>,
    maps: &mut IdMaps,
    report: &mut RunReport,
) -> MigrationResult<()> {
    let cap = ctx.config.max_errors_per_entity;
    report.set_state(entity, EntityState::Reading);

    let table = match find_table(source, entity.as_str(), entity.source_tables()) {
        Ok(Some(table)) => table,
        Ok(None) => {
            report.set_state(entity, EntityState::Skipped);
            return Ok(());
        }
        Err(err) if err.is_fatal() => return Err(err),
        Err(err) => {
            skip_unreadable(report, entity, &err, cap);
            return Ok(());
        }
    };
    report.entity_mut(entity).source_table = Some(table.clone());

    let columns = match source.columns(&table) {
        Ok(columns) => columns,
        Err(err) => {
            skip_unreadable(report, entity, &err, cap);
            return Ok(());
        }
    };
    log_column_plan(entity, &table, &columns);

    let total = match source.row_count(&table) {
        Ok(n) => Some(n),
        Err(err) => {
            debug!(table = %table, error = %err, "row count unavailable");
            None
        }
    };
    report.entity_mut(entity).total = total;

    let rows = match source.read_table(&table) {
        Ok(rows) => rows,
        Err(err) => {
            skip_unreadable(report, entity, &err, cap);
            return Ok(());
        }
    };

    report.set_state(entity, EntityState::Mapping);
    let mapped = rows.map(|row| row.map(|record| map(&record, entity)));
    report.set_state(entity, EntityState::Writing);
    let run = engine.upsert_batches(entity, mapped, maps, total);

    let entity_report = report.entity_mut(entity);
    entity_report.absorb(&run, cap);
    info!(
        entity = %entity,
        table = %table,
        processed = entity_report.processed,
        succeeded = entity_report.succeeded,
        failed = entity_report.failed,
        ignored = entity_report.ignored_duplicates,
        "stage finished"
    );

    if run.cancelled {
        return Err(MigrationError::Aborted("cancelled".into()));
    }
    Ok(())
}

fn skip_unreadable(report: &mut RunReport, entity: EntityType, err: &MigrationError, cap: usize) {
    warn!(entity = %entity, error = %err, "skipping unreadable table");
    let entity_report = report.entity_mut(entity);
    entity_report.state = EntityState::Skipped;
    entity_report.record_error(ErrorRecord::from(err).with_entity(entity.as_str()), cap);
}

fn log_column_plan(entity: EntityType, table: &str, columns: &[String]) {
    for choice in column_plan(entity, columns) {
        match (&choice.column, choice.fallback) {
            (Some(column), true) => {
                info!(entity = %entity, table, field = choice.field, column = %column, "field mapped from fallback column")
            }
            (Some(column), false) => {
                debug!(entity = %entity, table, field = choice.field, column = %column, "field mapped")
            }
            (None, _) => debug!(entity = %entity, table, field = choice.field, "no source column"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MigrationConfig;
    use crate::db::{Database, TargetStore};
    use crate::report::RunStatus;
    use rusqlite::Connection;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn legacy_db(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE FIRME (FIRMA_ID INTEGER, NAZIV TEXT, MATICNI TEXT);
             INSERT INTO FIRME VALUES (1, 'Alfa d.o.o.', '02000001');
             CREATE TABLE NALOG (ID_NALOGA INTEGER, NAZIV TEXT, FIRMA_ID INTEGER, ST_NALOGA TEXT);
             INSERT INTO NALOG VALUES (7, 'Servis', 1, 'Z');",
        )
        .unwrap();
    }

    fn context(source: &Path, dry_run: bool) -> (RunContext, Database) {
        let db = Database::open_in_memory().unwrap();
        let config = MigrationConfig {
            source_path: source.to_path_buf(),
            dry_run,
            ..Default::default()
        };
        (RunContext::new(config, Arc::new(db.clone())), db)
    }

    #[test]
    fn test_missing_source_aborts() {
        let temp = TempDir::new().unwrap();
        let (ctx, _db) = context(&temp.path().join("missing.db"), true);
        let report = run_legacy(&ctx, &[]);
        assert!(report.is_aborted());
        assert!(report.verification.is_none());
        assert_eq!(report.exit_code(), 2);
    }

    #[test]
    fn test_missing_tables_are_skipped() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("legacy.db");
        legacy_db(&path);
        let (ctx, db) = context(&path, false);

        let report = run_legacy(&ctx, &[]);
        assert_eq!(report.status, RunStatus::Completed { with_failures: false });
        assert_eq!(report.entities[&EntityType::Products].state, EntityState::Skipped);
        assert_eq!(report.entities[&EntityType::WorkOrders].state, EntityState::Verified);
        assert_eq!(db.count("work_orders").unwrap(), 1);

        let rows = db
            .select("work_orders", &["company_id", "status"], &[], None)
            .unwrap();
        assert!(rows[0]["company_id"].is_string());
        assert_eq!(rows[0]["status"], "completed");
    }

    #[test]
    fn test_only_selection() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("legacy.db");
        legacy_db(&path);
        let (ctx, db) = context(&path, false);

        let report = run_legacy(&ctx, &[EntityType::WorkOrders]);
        assert_eq!(report.entities[&EntityType::Companies].state, EntityState::Skipped);
        assert_eq!(db.count("companies").unwrap(), 0);
        assert_eq!(db.count("work_orders").unwrap(), 1);
    }

    #[test]
    fn test_cancelled_run_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("legacy.db");
        legacy_db(&path);
        let (ctx, db) = context(&path, false);
        ctx.cancel.cancel();

        let report = run_legacy(&ctx, &[]);
        assert_eq!(
            report.status,
            RunStatus::Aborted {
                reason: "run aborted: cancelled".into()
            }
        );
        assert_eq!(db.count("companies").unwrap(), 0);
        // No verification pass ran, so nothing may claim to be verified.
        assert!(report.verification.is_none());
        assert!(
            report
                .entities
                .values()
                .all(|e| e.state != EntityState::Verified)
        );
        assert_eq!(report.entities[&EntityType::Companies].state, EntityState::Writing);
    }
}
