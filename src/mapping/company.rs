//! Companies: legacy `FIRME` rows and scraped registry entries.

use crate::extract::MappedFields;
use crate::record::LegacyRecord;
use chrono::NaiveDate;
use serde::Serialize;

const ORIGINAL_ID: &[&str] = &["FIRMA_ID", "ID_FIRME", "SifraFirme", "ID"];
const NAME: &[&str] = &["NAZIV", "NazivFirme", "Name", "CompanyName"];
const TAX_NUMBER: &[&str] = &["MATICNI", "REG_BROJ", "PIB", "MaticniBroj", "TaxNumber"];
const VAT_NUMBER: &[&str] = &["PDV", "PDV_BROJ", "PdvBroj", "VatNumber"];
const ADDRESS: &[&str] = &["ADRESA", "Address"];
const CITY: &[&str] = &["GRAD", "MJESTO", "MESTO", "City"];
const POSTAL_CODE: &[&str] = &["POSTANSKI_BROJ", "PTT", "PostalCode"];
const PHONE: &[&str] = &["TEL1", "TEL2", "TEL3", "TELEFON", "Phone"];
const EMAIL: &[&str] = &["MAIL", "EMAIL", "E_MAIL"];
const WEBSITE: &[&str] = &["WEB", "Website"];
const BANK_ACCOUNT: &[&str] = &["ZIRO_RACUN1", "ZIRO_RACUN2", "ZiroRacun", "BankAccount"];
const PAYMENT_TERMS: &[&str] = &["ROK_PLACANJA", "RokPlacanja", "PaymentTerms"];
const CREDIT_LIMIT: &[&str] = &["DUG", "KreditniLimit", "CreditLimit"];

pub(crate) const COLUMNS: &[(&str, &[&str])] = &[
    ("original_id", ORIGINAL_ID),
    ("name", NAME),
    ("tax_number", TAX_NUMBER),
    ("vat_number", VAT_NUMBER),
    ("address", ADDRESS),
    ("city", CITY),
    ("postal_code", POSTAL_CODE),
    ("phone", PHONE),
    ("email", EMAIL),
    ("website", WEBSITE),
    ("bank_account", BANK_ACCOUNT),
    ("payment_terms", PAYMENT_TERMS),
    ("credit_limit", CREDIT_LIMIT),
];

pub const DEFAULT_COUNTRY: &str = "Montenegro";
pub const DEFAULT_PAYMENT_TERMS: i64 = 30;

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Company {
    pub original_id: Option<String>,
    pub name: Option<String>,
    pub name_short: Option<String>,
    pub tax_number: Option<String>,
    pub vat_number: Option<String>,
    pub registration_number: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub municipality: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub bank_account: Option<String>,
    pub payment_terms: Option<i64>,
    pub credit_limit: Option<f64>,
    pub legal_form: Option<String>,
    pub activity_code: Option<String>,
    pub activity_name: Option<String>,
    pub founded_date: Option<NaiveDate>,
    pub registry_status: Option<String>,
    pub capital: Option<f64>,
    pub employees: Option<i64>,
    pub revenue: Option<f64>,
    pub net_profit: Option<f64>,
    pub total_assets: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub return_on_assets: Option<f64>,
    pub is_active: bool,
    pub source: &'static str,
}

pub fn from_legacy(record: &LegacyRecord) -> Company {
    let tax_number = record.text(TAX_NUMBER);
    Company {
        original_id: record.text(ORIGINAL_ID),
        name: record.text(NAME).or_else(|| tax_number.clone()),
        tax_number,
        vat_number: record.text(VAT_NUMBER),
        address: record.text(ADDRESS),
        city: record.text(CITY),
        postal_code: record.text(POSTAL_CODE),
        country: Some(DEFAULT_COUNTRY.to_string()),
        phone: record.text(PHONE),
        email: record.text(EMAIL),
        website: record.text(WEBSITE),
        bank_account: record.text(BANK_ACCOUNT),
        payment_terms: Some(record.integer(PAYMENT_TERMS).unwrap_or(DEFAULT_PAYMENT_TERMS)),
        credit_limit: Some(record.decimal(CREDIT_LIMIT).unwrap_or(0.0)),
        is_active: true,
        source: "legacy",
        ..Default::default()
    }
}

/// Build a company from registry fields (detail page or listing row).
pub fn from_registry(fields: &MappedFields) -> Company {
    let tax_number = fields.text(&["tax_number"]);
    let name = fields
        .text(&["name_full", "name_short"])
        .or_else(|| tax_number.clone());
    Company {
        name,
        name_short: fields.text(&["name_short"]),
        tax_number,
        vat_number: fields.text(&["vat_number"]),
        registration_number: fields.text(&["registration_number"]),
        address: fields.text(&["address"]),
        city: fields.text(&["city"]),
        municipality: fields.text(&["municipality"]),
        region: fields.text(&["region"]),
        country: fields.text(&["country"]),
        phone: fields.text(&["phone"]),
        email: fields.text(&["email"]),
        website: fields.text(&["website"]),
        legal_form: fields.text(&["legal_form"]),
        activity_code: fields.text(&["activity_code"]),
        activity_name: fields.text(&["activity_name"]),
        founded_date: fields.date(&["founded_date"]),
        registry_status: fields.text(&["registry_status"]),
        capital: fields.decimal(&["total_capital", "paid_capital", "authorized_capital"]),
        employees: fields.integer(&["employees"]),
        revenue: fields.decimal(&["revenue"]),
        net_profit: fields.decimal(&["net_profit"]),
        total_assets: fields.decimal(&["total_assets"]),
        return_on_equity: fields.decimal(&["return_on_equity"]),
        return_on_assets: fields.decimal(&["return_on_assets"]),
        is_active: true,
        source: "registry",
        ..Default::default()
    }
}
