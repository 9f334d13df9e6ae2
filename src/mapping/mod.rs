//! Field mapping from legacy and registry records into the target vocabulary.
//!
//! Mapping is a pure, total function: it never fails and never touches I/O.
//! Records that cannot be written (no business key, unresolved references)
//! are caught by [`validate`] and by foreign-key resolution, not here.

pub mod codes;
pub mod company;
pub mod invoice;
pub mod links;
pub mod product;
pub mod work_order;

mod validate;

use crate::record::{LegacyRecord, resolve_column};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

pub use codes::{InvoiceStatus, WorkOrderStatus};
pub use company::Company;
pub use invoice::Invoice;
pub use links::{InvoiceWorkOrderLink, WorkOrderAdditionalItem};
pub use product::Product;
pub use validate::validate;
pub use work_order::WorkOrder;

/// Target entity types, declared in stage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Companies,
    Products,
    Invoices,
    WorkOrders,
    InvoiceWorkOrderLinks,
    WorkOrderAdditionalItems,
}

impl EntityType {
    pub const ALL: [EntityType; 6] = [
        EntityType::Companies,
        EntityType::Products,
        EntityType::Invoices,
        EntityType::WorkOrders,
        EntityType::InvoiceWorkOrderLinks,
        EntityType::WorkOrderAdditionalItems,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Companies => "companies",
            EntityType::Products => "products",
            EntityType::Invoices => "invoices",
            EntityType::WorkOrders => "work_orders",
            EntityType::InvoiceWorkOrderLinks => "invoice_work_order_links",
            EntityType::WorkOrderAdditionalItems => "work_order_additional_items",
        }
    }

    /// Target table.
    pub fn table(&self) -> &'static str {
        match self {
            EntityType::InvoiceWorkOrderLinks => "invoice_work_order_items",
            other => other.as_str(),
        }
    }

    /// Unique column used as the upsert conflict target.
    pub fn conflict_column(&self) -> &'static str {
        match self {
            EntityType::Companies => "tax_number",
            EntityType::Products => "code",
            EntityType::Invoices => "invoice_number",
            EntityType::WorkOrders => "order_number",
            EntityType::InvoiceWorkOrderLinks => "link_key",
            EntityType::WorkOrderAdditionalItems => "item_key",
        }
    }

    /// Known historical names of the legacy table, most likely first.
    pub fn source_tables(&self) -> &'static [&'static str] {
        match self {
            EntityType::Companies => &[
                "FIRME", "Firme", "Firma", "Companies", "Kompanije", "Klijenti", "Kupci",
            ],
            EntityType::Products => &["ARTIKLI", "Artikli", "Artikal", "Products", "Proizvodi", "Roba"],
            EntityType::Invoices => &[
                "FAKTURE", "Fakture", "Faktura", "Invoices", "Racuni", "Racun", "FaktureList",
            ],
            EntityType::WorkOrders => &["NALOG", "Nalozi", "Nalog", "RadniNalozi", "WorkOrders"],
            EntityType::InvoiceWorkOrderLinks => &["FAKTURE_NALOG", "FaktureNalog"],
            EntityType::WorkOrderAdditionalItems => &["NALOG_OSALO", "NalogOstalo"],
        }
    }

    /// Target field to legacy column candidates, for logging column decisions.
    pub fn columns(&self) -> &'static [(&'static str, &'static [&'static str])] {
        match self {
            EntityType::Companies => company::COLUMNS,
            EntityType::Products => product::COLUMNS,
            EntityType::Invoices => invoice::COLUMNS,
            EntityType::WorkOrders => work_order::COLUMNS,
            EntityType::InvoiceWorkOrderLinks => links::LINK_COLUMNS,
            EntityType::WorkOrderAdditionalItems => links::ITEM_COLUMNS,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        EntityType::ALL
            .into_iter()
            .find(|e| e.as_str() == wanted || e.table() == wanted)
            .ok_or_else(|| {
                let names: Vec<_> = EntityType::ALL.iter().map(|e| e.as_str()).collect();
                format!("unknown entity '{s}', expected one of: {}", names.join(", "))
            })
    }
}

/// A record in the target vocabulary, one variant per entity type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "entity", rename_all = "snake_case")]
pub enum MappedEntity {
    Company(Company),
    Product(Product),
    Invoice(Invoice),
    WorkOrder(WorkOrder),
    InvoiceWorkOrderLink(InvoiceWorkOrderLink),
    WorkOrderAdditionalItem(WorkOrderAdditionalItem),
}

impl MappedEntity {
    pub fn entity_type(&self) -> EntityType {
        match self {
            MappedEntity::Company(_) => EntityType::Companies,
            MappedEntity::Product(_) => EntityType::Products,
            MappedEntity::Invoice(_) => EntityType::Invoices,
            MappedEntity::WorkOrder(_) => EntityType::WorkOrders,
            MappedEntity::InvoiceWorkOrderLink(_) => EntityType::InvoiceWorkOrderLinks,
            MappedEntity::WorkOrderAdditionalItem(_) => EntityType::WorkOrderAdditionalItems,
        }
    }

    /// Value of the conflict column, if the mapper could produce one.
    pub fn business_key(&self) -> Option<&str> {
        match self {
            MappedEntity::Company(c) => c.tax_number.as_deref(),
            MappedEntity::Product(p) => p.code.as_deref(),
            MappedEntity::Invoice(i) => i.invoice_number.as_deref(),
            MappedEntity::WorkOrder(w) => w.order_number.as_deref(),
            MappedEntity::InvoiceWorkOrderLink(l) => l.link_key.as_deref(),
            MappedEntity::WorkOrderAdditionalItem(i) => i.item_key.as_deref(),
        }
    }

    /// Key later stages use to find this entity through an id map.
    pub fn legacy_key(&self) -> Option<String> {
        match self {
            MappedEntity::Company(c) => c.original_id.clone(),
            MappedEntity::Invoice(i) => i.legacy_key(),
            MappedEntity::WorkOrder(w) => w.original_id.clone(),
            _ => None,
        }
    }

    /// Column map for the target store. Legacy references are not columns
    /// and never appear here.
    pub fn to_row(&self) -> serde_json::Result<Map<String, Value>> {
        let value = match self {
            MappedEntity::Company(c) => serde_json::to_value(c)?,
            MappedEntity::Product(p) => serde_json::to_value(p)?,
            MappedEntity::Invoice(i) => serde_json::to_value(i)?,
            MappedEntity::WorkOrder(w) => serde_json::to_value(w)?,
            MappedEntity::InvoiceWorkOrderLink(l) => serde_json::to_value(l)?,
            MappedEntity::WorkOrderAdditionalItem(i) => serde_json::to_value(i)?,
        };
        match value {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }
}

/// Map one legacy record into the target vocabulary.
pub fn map(record: &LegacyRecord, entity: EntityType) -> MappedEntity {
    match entity {
        EntityType::Companies => MappedEntity::Company(company::from_legacy(record)),
        EntityType::Products => MappedEntity::Product(product::from_legacy(record)),
        EntityType::Invoices => MappedEntity::Invoice(invoice::from_legacy(record)),
        EntityType::WorkOrders => MappedEntity::WorkOrder(work_order::from_legacy(record)),
        EntityType::InvoiceWorkOrderLinks => {
            MappedEntity::InvoiceWorkOrderLink(links::link_from_legacy(record))
        }
        EntityType::WorkOrderAdditionalItems => {
            MappedEntity::WorkOrderAdditionalItem(links::item_from_legacy(record))
        }
    }
}

/// How one target field is served by a source table's columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnChoice {
    pub field: &'static str,
    pub column: Option<String>,
    pub fallback: bool,
}

/// Resolve every mapped field of `entity` against a table's column list.
pub fn column_plan(entity: EntityType, columns: &[String]) -> Vec<ColumnChoice> {
    entity
        .columns()
        .iter()
        .map(|(field, candidates)| match resolve_column(columns, candidates) {
            Some((column, fallback)) => ColumnChoice {
                field,
                column: Some(column.to_string()),
                fallback,
            },
            None => ColumnChoice {
                field,
                column: None,
                fallback: false,
            },
        })
        .collect()
}

/// Round money to cents.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_catalogue() {
        assert_eq!(EntityType::InvoiceWorkOrderLinks.table(), "invoice_work_order_items");
        assert_eq!(EntityType::Companies.conflict_column(), "tax_number");
        assert_eq!("work-orders".parse::<EntityType>().unwrap(), EntityType::WorkOrders);
        assert_eq!(
            "invoice_work_order_items".parse::<EntityType>().unwrap(),
            EntityType::InvoiceWorkOrderLinks
        );
        assert!("customers".parse::<EntityType>().is_err());

        let mut sorted = EntityType::ALL.to_vec();
        sorted.reverse();
        sorted.sort();
        assert_eq!(sorted, EntityType::ALL.to_vec());
    }

    #[test]
    fn test_column_plan_marks_fallbacks() {
        let columns = vec!["Sifra".to_string(), "NAZIV".to_string()];
        let plan = column_plan(EntityType::Products, &columns);
        let code = plan.iter().find(|c| c.field == "code").unwrap();
        assert_eq!(code.column.as_deref(), Some("Sifra"));
        assert!(code.fallback);
        let name = plan.iter().find(|c| c.field == "name").unwrap();
        assert!(!name.fallback);
        let price = plan.iter().find(|c| c.field == "selling_price").unwrap();
        assert!(price.column.is_none());
    }

    #[test]
    fn test_to_row_hides_legacy_refs() {
        let record = LegacyRecord::new()
            .with("ID_FAKTURA", 12i64)
            .with("GODINA", 2021i64)
            .with("ID_NALOGA", 7i64);
        let row = map(&record, EntityType::InvoiceWorkOrderLinks).to_row().unwrap();
        assert!(row.contains_key("link_key"));
        assert!(row.contains_key("invoice_id"));
        assert!(!row.contains_key("invoice_ref"));
        assert!(!row.contains_key("work_order_ref"));
    }
}
