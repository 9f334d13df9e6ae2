//! Batch upsert engine.
//!
//! Consumes mapped records in fixed-size windows. Each record is validated
//! and has its foreign keys resolved on its own; whatever survives is written
//! as a single upsert. A window whose write fails is counted as failed in
//! full and never retried. Cancellation is only observed between windows.

use crate::db::{IdMaps, TargetStore, resolve};
use crate::error::{ErrorRecord, MigrationError, MigrationResult};
use crate::mapping::{EntityType, MappedEntity, validate};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub batch_size: usize,
    pub dry_run: bool,
    /// Conflict-ignore (`true`) or merge into the existing row (`false`).
    pub ignore_duplicates: bool,
    /// Log progress every N windows.
    pub progress_every: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            dry_run: true,
            ignore_duplicates: true,
            progress_every: 10,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchResult {
    pub index: usize,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Succeeded rows whose conflict key already existed.
    pub ignored: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorRecord>,
}

/// All windows of one entity stage.
#[derive(Debug, Clone, Default)]
pub struct UpsertRun {
    pub batches: Vec<BatchResult>,
    /// True when cancellation stopped the stage before the input ran out.
    pub cancelled: bool,
}

impl UpsertRun {
    pub fn attempted(&self) -> usize {
        self.batches.iter().map(|b| b.attempted).sum()
    }

    pub fn succeeded(&self) -> usize {
        self.batches.iter().map(|b| b.succeeded).sum()
    }

    pub fn failed(&self) -> usize {
        self.batches.iter().map(|b| b.failed).sum()
    }

    pub fn ignored(&self) -> usize {
        self.batches.iter().map(|b| b.ignored).sum()
    }

    pub fn errors(&self) -> impl Iterator<Item = &ErrorRecord> {
        self.batches.iter().flat_map(|b| b.errors.iter())
    }
}

pub struct BatchUpsertEngine<'a> {
    store: &'a dyn TargetStore,
    options: BatchOptions,
    cancel: CancellationToken,
}

impl<'a> BatchUpsertEngine<'a> {
    pub fn new(store: &'a dyn TargetStore, options: BatchOptions) -> Self {
        Self {
            store,
            options,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn options(&self) -> &BatchOptions {
        &self.options
    }

    /// Write `records` for `entity`. `Err` items (unreadable rows) are
    /// counted as failed in the window they fall into. `expected` is only
    /// used for progress lines.
    pub fn upsert_batches<I>(
        &self,
        entity: EntityType,
        records: I,
        maps: &mut IdMaps,
        expected: Option<u64>,
    ) -> UpsertRun
    where
        I: IntoIterator<Item = MigrationResult<MappedEntity>>,
    {
        let batch_size = self.options.batch_size.max(1);
        let progress_every = self.options.progress_every.max(1);
        let mut records = records.into_iter();
        let mut run = UpsertRun::default();
        let mut processed = 0usize;

        loop {
            if self.cancel.is_cancelled() {
                info!(entity = %entity, batches = run.batches.len(), "cancelled, stopping before next batch");
                run.cancelled = true;
                break;
            }

            let window: Vec<_> = records.by_ref().take(batch_size).collect();
            if window.is_empty() {
                break;
            }

            let result = self.write_window(entity, run.batches.len(), window, maps);
            processed += result.attempted;
            run.batches.push(result);

            if run.batches.len() % progress_every == 0 {
                info!(
                    entity = %entity,
                    batch = run.batches.len(),
                    processed,
                    total = ?expected,
                    failed = run.failed(),
                    "progress"
                );
            }
        }

        run
    }

    fn write_window(
        &self,
        entity: EntityType,
        index: usize,
        window: Vec<MigrationResult<MappedEntity>>,
        maps: &mut IdMaps,
    ) -> BatchResult {
        let mut result = BatchResult {
            index,
            ..Default::default()
        };
        let mut rows = Vec::with_capacity(window.len());
        let mut keys = Vec::with_capacity(window.len());
        let mut planned = Vec::new();

        for item in window {
            result.attempted += 1;
            let mut record = match item {
                Ok(record) => record,
                Err(err) => {
                    result.failed += 1;
                    result.errors.push(ErrorRecord::from(&err).with_entity(entity.as_str()));
                    continue;
                }
            };

            let key = record.business_key().map(str::to_string);
            let prepared = validate(&record)
                .and_then(|()| resolve(&mut record, maps))
                .and_then(|()| {
                    record
                        .to_row()
                        .map_err(|e| MigrationError::skipped(entity, e.to_string()))
                });
            match prepared {
                Ok(row) => {
                    if let (Some(legacy), Some(key)) = (record.legacy_key(), &key) {
                        planned.push((legacy, key.clone()));
                    }
                    keys.extend(key);
                    rows.push(row);
                }
                Err(err) => {
                    debug!(entity = %entity, key = ?key, error = %err, "record skipped");
                    result.failed += 1;
                    result.errors.push(
                        ErrorRecord::from(&err)
                            .with_entity(entity.as_str())
                            .with_keys(key.into_iter().collect()),
                    );
                }
            }
        }

        if rows.is_empty() {
            return result;
        }

        if self.options.dry_run {
            result.succeeded += rows.len();
            if let Some(map) = maps.get_mut(entity) {
                for (legacy, key) in planned {
                    map.plan(legacy, &key);
                }
            }
            return result;
        }

        match self.store.upsert(
            entity.table(),
            &rows,
            entity.conflict_column(),
            self.options.ignore_duplicates,
        ) {
            Ok(outcome) => {
                result.succeeded += rows.len();
                result.ignored += outcome.ignored;
            }
            Err(err) => {
                let err = MigrationError::BatchWriteFailed {
                    entity: entity.to_string(),
                    index,
                    reason: err.to_string(),
                };
                warn!(entity = %entity, batch = index, rows = rows.len(), error = %err, "batch write failed");
                result.failed += rows.len();
                result
                    .errors
                    .push(ErrorRecord::from(&err).with_entity(entity.as_str()).with_keys(keys));
            }
        }

        result
    }
}
