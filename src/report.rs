//! Run report: the per-run record of what happened, written as JSON on every
//! exit path and summarized on the console.

use crate::error::{ErrorRecord, MigrationError};
use crate::fetch::FetchStats;
use crate::mapping::EntityType;
use crate::upsert::UpsertRun;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Legacy,
    Scrape,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Legacy => "legacy",
            RunMode::Scrape => "scrape",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    NotStarted,
    Running,
    Completed { with_failures: bool },
    Aborted { reason: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    #[default]
    Pending,
    Reading,
    Mapping,
    ResolvingKeys,
    Writing,
    Verified,
    PartiallyFailed,
    /// No source table, or deselected with `--only`.
    Skipped,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityReport {
    pub state: EntityState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_table: Option<String>,
    /// Rows in the source, when the source can count them up front.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub ignored_duplicates: u64,
    pub batches: u64,
    #[serde(default)]
    pub errors: Vec<ErrorRecord>,
    #[serde(default)]
    pub errors_truncated: u64,
}

impl EntityReport {
    /// Keep at most `cap` error details; count the rest.
    pub fn record_error(&mut self, error: ErrorRecord, cap: usize) {
        if self.errors.len() < cap {
            self.errors.push(error);
        } else {
            self.errors_truncated += 1;
        }
    }

    pub fn absorb(&mut self, run: &UpsertRun, cap: usize) {
        self.processed += run.attempted() as u64;
        self.succeeded += run.succeeded() as u64;
        self.failed += run.failed() as u64;
        self.ignored_duplicates += run.ignored() as u64;
        self.batches += run.batches.len() as u64;
        for error in run.errors() {
            self.record_error(error.clone(), cap);
        }
    }

    /// Settle the final state from the counters. An entity without failures
    /// only becomes `Verified` once the run's verification pass succeeded;
    /// otherwise it stays in the state it reached.
    pub fn settle(&mut self, verified: bool) {
        if matches!(self.state, EntityState::Skipped | EntityState::Pending) {
            return;
        }
        if self.failed > 0 {
            self.state = EntityState::PartiallyFailed;
        } else if verified {
            self.state = EntityState::Verified;
        }
    }
}

/// Post-run sanity check of the relationship tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub invoice_work_order_items: u64,
    pub work_order_additional_items: u64,
    /// Up to five resolved links, as `invoice_number -> order_number`.
    pub samples: Vec<String>,
    pub entity_counts: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub mode: RunMode,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub status: RunStatus,
    pub entities: IndexMap<EntityType, EntityReport>,
    pub errors: Vec<ErrorRecord>,
    pub verification: Option<Verification>,
    pub fetch: Option<FetchStats>,
    pub success: bool,
}

impl RunReport {
    pub fn new(mode: RunMode, dry_run: bool) -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            mode,
            dry_run,
            started_at: Utc::now(),
            finished_at: None,
            duration_ms: None,
            status: RunStatus::NotStarted,
            entities: IndexMap::new(),
            errors: Vec::new(),
            verification: None,
            fetch: None,
            success: false,
        }
    }

    pub fn start(&mut self) {
        self.started_at = Utc::now();
        self.status = RunStatus::Running;
    }

    pub fn entity_mut(&mut self, entity: EntityType) -> &mut EntityReport {
        self.entities.entry(entity).or_default()
    }

    pub fn set_state(&mut self, entity: EntityType, state: EntityState) {
        let entity_report = self.entity_mut(entity);
        if entity_report.state != state {
            debug!(entity = %entity, from = ?entity_report.state, to = ?state, "entity state");
            entity_report.state = state;
        }
    }

    /// Settle every entity once the run is over.
    pub fn settle_entities(&mut self, verified: bool) {
        for entity_report in self.entities.values_mut() {
            entity_report.settle(verified);
        }
    }

    pub fn abort(&mut self, error: &MigrationError) {
        self.errors.push(ErrorRecord::from(error));
        self.status = RunStatus::Aborted {
            reason: error.to_string(),
        };
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.status, RunStatus::Aborted { .. })
    }

    pub fn total_failed(&self) -> u64 {
        self.entities.values().map(|e| e.failed).sum()
    }

    /// Stamp the end time and settle the run status.
    pub fn finish(&mut self) {
        let now = Utc::now();
        self.finished_at = Some(now);
        self.duration_ms = Some((now - self.started_at).num_milliseconds());
        if matches!(self.status, RunStatus::Running | RunStatus::NotStarted) {
            self.status = RunStatus::Completed {
                with_failures: self.total_failed() > 0,
            };
        }
        self.success = matches!(
            self.status,
            RunStatus::Completed {
                with_failures: false
            }
        );
    }

    /// 0 when everything succeeded, 1 when records failed, 2 when aborted.
    pub fn exit_code(&self) -> u8 {
        match self.status {
            RunStatus::Completed {
                with_failures: false,
            } => 0,
            RunStatus::Completed {
                with_failures: true,
            } => 1,
            _ => 2,
        }
    }

    /// Write the report as `run-report-{mode}-{timestamp}.json` under `dir`.
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .with_context(|| format!("create report directory {}", dir.display()))?;

        let stamp = self.started_at.format("%Y%m%d-%H%M%S");
        let path = dir.join(format!("run-report-{}-{stamp}.json", self.mode.as_str()));
        let json = serde_json::to_string_pretty(self).context("serialize run report")?;
        fs::write(&path, json).with_context(|| format!("write run report {}", path.display()))?;
        Ok(path)
    }

    /// Console summary table.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let mode = if self.dry_run { "DRY RUN" } else { "LIVE" };
        let _ = writeln!(out, "Run {} ({}, {mode})", self.run_id, self.mode.as_str());
        let _ = writeln!(
            out,
            "  {:<28} {:>10} {:>10} {:>8} {:>10}  state",
            "entity", "processed", "succeeded", "failed", "ignored"
        );
        for (entity, report) in &self.entities {
            let _ = writeln!(
                out,
                "  {:<28} {:>10} {:>10} {:>8} {:>10}  {:?}",
                entity.as_str(),
                report.processed,
                report.succeeded,
                report.failed,
                report.ignored_duplicates,
                report.state,
            );
        }
        if let Some(fetch) = &self.fetch {
            let _ = writeln!(
                out,
                "  fetch: {} requests, {} retries, {} not found, {} failed",
                fetch.requests, fetch.retries, fetch.not_found, fetch.failures
            );
        }
        if let Some(verification) = &self.verification {
            let _ = writeln!(
                out,
                "  links: {} invoice/work order, {} additional items",
                verification.invoice_work_order_items, verification.work_order_additional_items
            );
            for sample in &verification.samples {
                let _ = writeln!(out, "    {sample}");
            }
        }
        let status = match &self.status {
            RunStatus::Completed {
                with_failures: false,
            } => "completed".to_string(),
            RunStatus::Completed {
                with_failures: true,
            } => format!("completed with {} failure(s)", self.total_failed()),
            RunStatus::Aborted { reason } => format!("ABORTED: {reason}"),
            RunStatus::Running => "running".to_string(),
            RunStatus::NotStarted => "not started".to_string(),
        };
        let _ = writeln!(out, "Status: {status}");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use tempfile::TempDir;

    #[test]
    fn test_error_cap() {
        let mut report = EntityReport::default();
        for i in 0..5 {
            report.record_error(ErrorRecord::new(ErrorCode::RecordMappingSkipped, format!("e{i}")), 3);
        }
        assert_eq!(report.errors.len(), 3);
        assert_eq!(report.errors_truncated, 2);
    }

    #[test]
    fn test_settle_waits_for_verification() {
        let mut report = RunReport::new(RunMode::Legacy, false);
        report.set_state(EntityType::Companies, EntityState::Writing);
        report.entity_mut(EntityType::Companies).succeeded = 2;
        report.set_state(EntityType::Invoices, EntityState::Writing);
        report.entity_mut(EntityType::Invoices).failed = 1;
        report.set_state(EntityType::Products, EntityState::Skipped);

        report.settle_entities(false);
        assert_eq!(report.entities[&EntityType::Companies].state, EntityState::Writing);
        assert_eq!(report.entities[&EntityType::Invoices].state, EntityState::PartiallyFailed);

        report.settle_entities(true);
        assert_eq!(report.entities[&EntityType::Companies].state, EntityState::Verified);
        assert_eq!(report.entities[&EntityType::Products].state, EntityState::Skipped);
    }

    #[test]
    fn test_status_and_exit_codes() {
        let mut report = RunReport::new(RunMode::Legacy, true);
        report.start();
        report.entity_mut(EntityType::Products).succeeded = 3;
        report.finish();
        assert!(report.success);
        assert_eq!(report.exit_code(), 0);

        let mut report = RunReport::new(RunMode::Legacy, true);
        report.start();
        report.entity_mut(EntityType::Companies).failed = 1;
        report.finish();
        assert!(!report.success);
        assert_eq!(report.status, RunStatus::Completed { with_failures: true });
        assert_eq!(report.exit_code(), 1);

        let mut report = RunReport::new(RunMode::Scrape, false);
        report.start();
        report.abort(&MigrationError::Aborted("cancelled".into()));
        report.finish();
        assert!(report.is_aborted());
        assert_eq!(report.exit_code(), 2);
        assert_eq!(report.errors[0].code, ErrorCode::Cancelled);
    }

    #[test]
    fn test_write_report_file() {
        let temp = TempDir::new().unwrap();
        let mut report = RunReport::new(RunMode::Legacy, true);
        report.start();
        report.set_state(EntityType::Invoices, EntityState::Skipped);
        report.finish();

        let path = report.write(&temp.path().join("reports")).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("run-report-legacy-"));
        assert!(name.ends_with(".json"));

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["mode"], "legacy");
        assert_eq!(json["status"]["state"], "completed");
        assert_eq!(json["entities"]["invoices"]["state"], "skipped");
        assert_eq!(json["success"], true);
    }
}
