//! Relationship tables: invoice/work-order links (`FAKTURE_NALOG`) and
//! additional work-order items (`NALOG_OSALO`).
//!
//! Both carry legacy references that must resolve through the id maps before
//! the row can be written. Their conflict keys are derived from the legacy
//! references so a rerun hits the same rows.

use super::invoice::invoice_key;
use crate::record::LegacyRecord;
use serde::Serialize;

const LINK_INVOICE: &[&str] = &["ID_FAKTURA", "IdFakture"];
const LINK_YEAR: &[&str] = &["GODINA", "Godina"];
const LINK_WORK_ORDER: &[&str] = &["ID_NALOGA", "IdNaloga"];
const LINK_ITEM: &[&str] = &["ID_NALOGA_STAVKE", "IdStavke"];

pub(crate) const LINK_COLUMNS: &[(&str, &[&str])] = &[
    ("invoice_id", LINK_INVOICE),
    ("invoice_year", LINK_YEAR),
    ("work_order_id", LINK_WORK_ORDER),
    ("work_order_item_id", LINK_ITEM),
];

const ITEM_WORK_ORDER: &[&str] = &["ID_NALOGA", "IdNaloga"];
const ITEM_NUMBER: &[&str] = &["RBR", "RedniBroj"];
const ITEM_DESCRIPTION: &[&str] = &["OPIS", "Opis"];
const ITEM_COMMENT: &[&str] = &["R_KOMENTAR", "Komentar"];
const ITEM_PRICE: &[&str] = &["R_CIJENA", "Cijena"];
const ITEM_QUANTITY: &[&str] = &["KOLICINA", "Kolicina"];
const ITEM_UNIT: &[&str] = &["MJERA", "JM"];

pub(crate) const ITEM_COLUMNS: &[(&str, &[&str])] = &[
    ("work_order_id", ITEM_WORK_ORDER),
    ("item_number", ITEM_NUMBER),
    ("description", ITEM_DESCRIPTION),
    ("comment", ITEM_COMMENT),
    ("price", ITEM_PRICE),
    ("quantity", ITEM_QUANTITY),
    ("unit", ITEM_UNIT),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceWorkOrderLink {
    pub link_key: Option<String>,
    pub invoice_id: Option<String>,
    pub work_order_id: Option<String>,
    pub work_order_item_id: Option<String>,
    /// `{number}_{year}` of the legacy invoice.
    #[serde(skip_serializing)]
    pub invoice_ref: Option<String>,
    /// Legacy work order id.
    #[serde(skip_serializing)]
    pub work_order_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkOrderAdditionalItem {
    pub item_key: Option<String>,
    pub work_order_id: Option<String>,
    #[serde(skip_serializing)]
    pub work_order_ref: Option<String>,
    pub item_number: Option<i64>,
    pub description: Option<String>,
    pub comment: Option<String>,
    pub price: f64,
    pub quantity: f64,
    pub unit: Option<String>,
}

pub fn link_from_legacy(record: &LegacyRecord) -> InvoiceWorkOrderLink {
    let invoice_ref = match (record.text(LINK_INVOICE), record.integer(LINK_YEAR)) {
        (Some(number), Some(year)) => Some(invoice_key(&number, year)),
        _ => None,
    };
    let work_order_ref = record.text(LINK_WORK_ORDER);
    let item = record.text(LINK_ITEM);

    let link_key = match (&invoice_ref, &work_order_ref) {
        (Some(inv), Some(wo)) => Some(format!(
            "{inv}:{wo}:{}",
            item.as_deref().unwrap_or("-")
        )),
        _ => None,
    };

    InvoiceWorkOrderLink {
        link_key,
        invoice_id: None,
        work_order_id: None,
        work_order_item_id: item,
        invoice_ref,
        work_order_ref,
    }
}

pub fn item_from_legacy(record: &LegacyRecord) -> WorkOrderAdditionalItem {
    let work_order_ref = record.text(ITEM_WORK_ORDER);
    let item_number = record.integer(ITEM_NUMBER);
    let description = record.text(ITEM_DESCRIPTION);
    let comment = record.text(ITEM_COMMENT);

    let item_key = work_order_ref.as_ref().and_then(|wo| match (item_number, &description) {
        (Some(n), _) => Some(format!("{wo}:{n}")),
        (None, Some(d)) => Some(format!("{wo}:-:{d}")),
        (None, None) => None,
    });

    WorkOrderAdditionalItem {
        item_key,
        work_order_id: None,
        work_order_ref,
        item_number,
        description: description.or_else(|| comment.clone()),
        comment,
        price: record.decimal(ITEM_PRICE).unwrap_or(0.0),
        quantity: record.decimal(ITEM_QUANTITY).unwrap_or(1.0),
        unit: record.text(ITEM_UNIT),
    }
}
