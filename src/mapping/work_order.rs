//! Work orders: legacy `NALOG` rows.

use super::codes::WorkOrderStatus;
use crate::record::LegacyRecord;
use chrono::NaiveDate;
use serde::Serialize;

const ID: &[&str] = &["ID_NALOGA", "IdNaloga", "BrojNaloga"];
const TITLE: &[&str] = &["NAZIV", "Title"];
const DESCRIPTION: &[&str] = &["KOMENTAR", "Napomena", "Description"];
const START: &[&str] = &["DATUM", "DatumOtvaranja"];
const DUE: &[&str] = &["DATUM_ROK", "Rok", "DueDate"];
const STATUS: &[&str] = &["ST_NALOGA", "StatusNaloga", "Status"];
const COMPANY: &[&str] = &["FIRMA_ID", "ID_FIRME"];
const PROJECT: &[&str] = &["ID_PROJEKTA"];

pub(crate) const COLUMNS: &[(&str, &[&str])] = &[
    ("original_id", ID),
    ("title", TITLE),
    ("description", DESCRIPTION),
    ("start_date", START),
    ("due_date", DUE),
    ("status", STATUS),
    ("company_id", COMPANY),
    ("project_id", PROJECT),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkOrder {
    pub order_number: Option<String>,
    /// Legacy id, stored verbatim; link tables refer to work orders by it.
    pub original_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub company_id: Option<String>,
    #[serde(skip_serializing)]
    pub company_ref: Option<String>,
    pub project_id: Option<String>,
    pub status: WorkOrderStatus,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
}

pub fn from_legacy(record: &LegacyRecord) -> WorkOrder {
    let id = record.value(ID);
    let original_id = id.and_then(|v| v.as_text());
    let order_number = match id.and_then(|v| v.as_i64()) {
        Some(n) => Some(format!("WO{n:06}")),
        None => original_id.as_ref().map(|t| format!("WO-{t}")),
    };

    WorkOrder {
        title: record
            .text(TITLE)
            .or_else(|| original_id.as_ref().map(|id| format!("Radni nalog {id}"))),
        order_number,
        original_id,
        description: record.text(DESCRIPTION),
        company_id: None,
        company_ref: record.text(COMPANY),
        project_id: record.text(PROJECT),
        status: WorkOrderStatus::from_code(record.value(STATUS)),
        start_date: record.date(START),
        due_date: record.date(DUE),
    }
}
