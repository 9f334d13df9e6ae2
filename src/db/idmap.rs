//! Legacy natural key to target surrogate key maps.
//!
//! Maps are built in bulk from one query per entity type. During a dry run
//! nothing reaches the store, so each stage registers `planned:<key>`
//! placeholders instead, letting later stages exercise resolution anyway.

use super::store::{Row, TargetStore};
use crate::error::{MigrationError, MigrationResult};
use crate::mapping::invoice::{invoice_key, key_from_invoice_number};
use crate::mapping::{EntityType, MappedEntity};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, warn};

const PLANNED_PREFIX: &str = "planned:";

#[derive(Debug, Clone, Default)]
pub struct IdMap {
    real: HashMap<String, String>,
    planned: HashMap<String, String>,
}

impl IdMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, legacy_key: impl Into<String>, id: impl Into<String>) {
        self.real.insert(legacy_key.into(), id.into());
    }

    /// Register a placeholder for a row a dry run would have written.
    pub fn plan(&mut self, legacy_key: impl Into<String>, business_key: &str) {
        self.planned
            .insert(legacy_key.into(), format!("{PLANNED_PREFIX}{business_key}"));
    }

    /// Real entries win over planned ones.
    pub fn get(&self, legacy_key: &str) -> Option<&str> {
        self.real
            .get(legacy_key)
            .or_else(|| self.planned.get(legacy_key))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.real.len()
    }

    pub fn planned_len(&self) -> usize {
        self.planned.keys().filter(|k| !self.real.contains_key(*k)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.real.is_empty() && self.planned.is_empty()
    }

    pub fn is_planned(id: &str) -> bool {
        id.starts_with(PLANNED_PREFIX)
    }
}

/// The id maps of one run: built once per entity, read by every later stage.
#[derive(Debug, Clone, Default)]
pub struct IdMaps {
    pub companies: IdMap,
    pub invoices: IdMap,
    pub work_orders: IdMap,
}

impl IdMaps {
    pub fn get_mut(&mut self, entity: EntityType) -> Option<&mut IdMap> {
        match entity {
            EntityType::Companies => Some(&mut self.companies),
            EntityType::Invoices => Some(&mut self.invoices),
            EntityType::WorkOrders => Some(&mut self.work_orders),
            _ => None,
        }
    }

    /// Replace the real entries for `entity`, keeping its planned overlay.
    pub fn refresh(&mut self, store: &dyn TargetStore, entity: EntityType) -> MigrationResult<()> {
        let fresh = build_id_map(store, entity)?;
        if let Some(map) = self.get_mut(entity) {
            map.real = fresh.real;
        }
        Ok(())
    }
}

fn text(row: &Row, column: &str) -> Option<String> {
    match row.get(column)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn year(row: &Row) -> Option<i64> {
    match row.get("invoice_year")? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Query the target store for every row of `entity` and index its surrogate
/// key by legacy natural key. A failed query is fatal for the run.
pub fn build_id_map(store: &dyn TargetStore, entity: EntityType) -> MigrationResult<IdMap> {
    let columns: &[&str] = match entity {
        EntityType::Companies | EntityType::WorkOrders => &["id", "original_id"],
        EntityType::Invoices => &["id", "original_id", "invoice_year", "invoice_number"],
        other => {
            return Err(MigrationError::fk_resolution(
                other,
                "entity is never a foreign-key target",
            ));
        }
    };

    let rows = store
        .select(entity.table(), columns, &[], None)
        .map_err(|e| MigrationError::fk_resolution(entity, e))?;

    let mut map = IdMap::new();
    for row in &rows {
        let Some(id) = text(row, "id") else { continue };
        let key = match entity {
            EntityType::Invoices => match (text(row, "original_id"), year(row)) {
                (Some(number), Some(year)) => Some(invoice_key(&number, year)),
                _ => text(row, "invoice_number").and_then(|n| key_from_invoice_number(&n)),
            },
            _ => text(row, "original_id"),
        };
        if let Some(key) = key {
            map.insert(key, id);
        }
    }
    debug!(entity = %entity, rows = rows.len(), keys = map.len(), "id map built");
    Ok(map)
}

/// Replace legacy references with surrogate keys.
///
/// Company references are optional: a miss leaves `company_id` empty. The
/// invoice and work-order references of link tables are required, and a miss
/// rejects the record.
pub fn resolve(entity: &mut MappedEntity, maps: &IdMaps) -> MigrationResult<()> {
    let kind = entity.entity_type();
    let required = |map: &IdMap, what: &str, key: &Option<String>| -> MigrationResult<String> {
        let key = key
            .as_deref()
            .ok_or_else(|| MigrationError::skipped(kind, format!("missing {what} reference")))?;
        map.get(key)
            .map(str::to_string)
            .ok_or_else(|| MigrationError::skipped(kind, format!("{what} {key} not found")))
    };

    match entity {
        MappedEntity::Invoice(invoice) => {
            invoice.company_id = optional(&maps.companies, kind, &invoice.company_ref);
        }
        MappedEntity::WorkOrder(order) => {
            order.company_id = optional(&maps.companies, kind, &order.company_ref);
        }
        MappedEntity::InvoiceWorkOrderLink(link) => {
            link.invoice_id = Some(required(&maps.invoices, "invoice", &link.invoice_ref)?);
            link.work_order_id = Some(required(&maps.work_orders, "work order", &link.work_order_ref)?);
        }
        MappedEntity::WorkOrderAdditionalItem(item) => {
            item.work_order_id = Some(required(&maps.work_orders, "work order", &item.work_order_ref)?);
        }
        MappedEntity::Company(_) | MappedEntity::Product(_) => {}
    }
    Ok(())
}

fn optional(map: &IdMap, kind: EntityType, key: &Option<String>) -> Option<String> {
    let key = key.as_deref()?;
    match map.get(key) {
        Some(id) => Some(id.to_string()),
        None => {
            warn!(entity = %kind, company = key, "company reference not found, leaving company_id empty");
            None
        }
    }
}
