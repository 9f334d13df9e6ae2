//! Invoices: legacy `FAKTURE` rows.
//!
//! Legacy invoice numbers restart every year, so the identity of an invoice
//! is the pair (number, year). The target number is `{year}/{number:06}` and
//! the id-map key is `{number}_{year}`.

use super::codes::InvoiceStatus;
use super::round2;
use crate::record::{LegacyRecord, LegacyValue};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;

const LEGACY_ID: &[&str] = &["ID_FAKTURA", "IdFakture", "BROJ_FAK"];
const NUMBER: &[&str] = &["BROJ_FAK", "BrojFakture", "Broj", "ID_FAKTURA"];
const YEAR: &[&str] = &["GODINA", "Godina", "Year"];
const DATE: &[&str] = &["DATUM", "DatumFakture", "Date"];
const TOTAL: &[&str] = &["IZNOS", "UkupnoIznos", "Total"];
const VAT: &[&str] = &["PDV", "IznosPDV", "Vat"];
const STATUS: &[&str] = &["STATUS"];
const DISCOUNT: &[&str] = &["RABAT", "Discount"];
const FISCALIZED: &[&str] = &["W_ST_FISKALIZACIJA", "Fiskalizovana"];
const IKOF: &[&str] = &["W_IKOF", "IKOF"];
const JIKR: &[&str] = &["W_JIKR", "JIKR"];
const NOTES: &[&str] = &["KOMENTAR", "Napomena", "Notes"];
const COMPANY: &[&str] = &["FIRMA_ID", "ID_FIRME", "KupacId"];
const KIND: &[&str] = &["VR_FAKTURA", "VrstaFakture"];

pub(crate) const COLUMNS: &[(&str, &[&str])] = &[
    ("original_id", LEGACY_ID),
    ("invoice_number", NUMBER),
    ("invoice_year", YEAR),
    ("issue_date", DATE),
    ("total_amount", TOTAL),
    ("vat_amount", VAT),
    ("status", STATUS),
    ("discount", DISCOUNT),
    ("is_fiscalized", FISCALIZED),
    ("ikof", IKOF),
    ("jikr", JIKR),
    ("notes", NOTES),
    ("company_id", COMPANY),
    ("invoice_type", KIND),
];

/// VAT share of a gross amount at the 21% standard rate.
pub const VAT_RATE: f64 = 0.21;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Invoice {
    pub invoice_number: Option<String>,
    pub original_id: Option<String>,
    pub invoice_year: Option<i64>,
    pub company_id: Option<String>,
    /// Legacy company id, resolved into `company_id`.
    #[serde(skip_serializing)]
    pub company_ref: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub subtotal: Option<f64>,
    pub vat_amount: Option<f64>,
    pub total_amount: Option<f64>,
    pub discount: Option<f64>,
    pub status: InvoiceStatus,
    pub invoice_type: Option<String>,
    pub is_fiscalized: bool,
    pub ikof: Option<String>,
    pub jikr: Option<String>,
    pub notes: Option<String>,
}

impl Invoice {
    /// `{number}_{year}`, the key link tables use to find this invoice.
    pub fn legacy_key(&self) -> Option<String> {
        Some(invoice_key(self.original_id.as_deref()?, self.invoice_year?))
    }
}

pub fn invoice_key(number: &str, year: i64) -> String {
    format!("{number}_{year}")
}

/// Recover `{number}_{year}` from a target invoice number like `2021/000123`.
pub fn key_from_invoice_number(invoice_number: &str) -> Option<String> {
    let (year, number) = invoice_number.split_once('/')?;
    let year: i64 = year.trim().parse().ok()?;
    let number = number.trim();
    match number.parse::<i64>() {
        Ok(n) => Some(invoice_key(&n.to_string(), year)),
        Err(_) if !number.is_empty() => Some(invoice_key(number, year)),
        Err(_) => None,
    }
}

fn format_number(value: &LegacyValue, year: i64) -> Option<String> {
    match value.as_i64() {
        Some(n) => Some(format!("{year}/{n:06}")),
        None => value.as_text().map(|t| format!("{year}/{t}")),
    }
}

pub fn from_legacy(record: &LegacyRecord) -> Invoice {
    let issue_date = record.date(DATE);
    let invoice_year = record
        .integer(YEAR)
        .or_else(|| issue_date.map(|d| i64::from(d.year())));

    let invoice_number = match (record.value(NUMBER), invoice_year) {
        (Some(number), Some(year)) => format_number(number, year),
        _ => None,
    };

    let total_amount = record.decimal(TOTAL).map(round2);
    let vat_amount = record
        .decimal(VAT)
        .or_else(|| total_amount.map(|t| t * VAT_RATE / (1.0 + VAT_RATE)))
        .map(round2);
    let subtotal = match (total_amount, vat_amount) {
        (Some(total), Some(vat)) => Some(round2(total - vat)),
        _ => None,
    };

    Invoice {
        invoice_number,
        original_id: record.text(LEGACY_ID),
        invoice_year,
        company_id: None,
        company_ref: record.text(COMPANY),
        issue_date,
        subtotal,
        vat_amount,
        total_amount,
        discount: record.decimal(DISCOUNT),
        status: InvoiceStatus::from_code(record.value(STATUS)),
        invoice_type: record.text(KIND),
        is_fiscalized: record.flag(FISCALIZED).unwrap_or(false),
        ikof: record.text(IKOF),
        jikr: record.text(JIKR),
        notes: record.text(NOTES),
    }
}
