//! Products: legacy `ARTIKLI` rows.

use super::codes::unit_of_measure;
use crate::record::{LegacyRecord, LegacyValue};
use serde::Serialize;

const CODE: &[&str] = &["SF_ARTIKLA", "SIFRA", "Sifra", "SifraArtikla", "Code", "Kod"];
const NAME: &[&str] = &["NAZIV", "NazivArtikla", "Name"];
const DESCRIPTION: &[&str] = &["KOMENTAR", "OPIS", "Description"];
const UNIT: &[&str] = &["VR_JEDINICA", "JEDINICA", "JedinicaMjere", "JM", "Unit"];
const PURCHASE_PRICE: &[&str] = &["CIJ_NABAVNA", "NabavnaCijena", "Nabavna", "PurchasePrice"];
const SELLING_PRICE: &[&str] = &["CIJ_PRODAJNA", "ProdajnaCijena", "Prodajna", "Cijena", "Price"];
const QTY_IN: &[&str] = &["KOL_ULAZNA", "KolicinaUlaz"];
const QTY_OUT: &[&str] = &["KOL_IZLAZNA", "KolicinaIzlaz"];
const STOCK: &[&str] = &["KOLICINA", "Stanje", "Stock"];
const MIN_STOCK: &[&str] = &["KOL_KRITICNA", "MinKolicina", "MinStock"];
const KIND: &[&str] = &["VR_PROIZVODA", "VrstaProizvoda"];

pub(crate) const COLUMNS: &[(&str, &[&str])] = &[
    ("code", CODE),
    ("name", NAME),
    ("description", DESCRIPTION),
    ("unit_of_measure", UNIT),
    ("purchase_price", PURCHASE_PRICE),
    ("selling_price", SELLING_PRICE),
    ("stock_in", QTY_IN),
    ("stock_out", QTY_OUT),
    ("stock_quantity", STOCK),
    ("min_stock", MIN_STOCK),
    ("is_service", KIND),
];

/// `VR_PROIZVODA` value marking a service rather than stock.
const SERVICE_KIND: &str = "2";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub code: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub unit_of_measure: String,
    pub purchase_price: Option<f64>,
    pub selling_price: Option<f64>,
    pub stock_quantity: Option<f64>,
    pub min_stock: Option<f64>,
    pub is_service: bool,
    pub is_active: bool,
}

/// Numeric legacy codes become `ART0001`; anything else is kept verbatim.
fn product_code(value: &LegacyValue) -> Option<String> {
    match value.as_i64() {
        Some(n) if n >= 0 => Some(format!("ART{n:04}")),
        _ => value.as_text(),
    }
}

pub fn from_legacy(record: &LegacyRecord) -> Product {
    let code = record.value(CODE).and_then(product_code);

    let stock_quantity = match (record.decimal(QTY_IN), record.decimal(QTY_OUT)) {
        (None, None) => record.decimal(STOCK),
        (qty_in, qty_out) => Some(qty_in.unwrap_or(0.0) - qty_out.unwrap_or(0.0)),
    };

    Product {
        name: record
            .text(NAME)
            .or_else(|| code.as_ref().map(|c| format!("Artikal {c}"))),
        code,
        description: record.text(DESCRIPTION),
        unit_of_measure: unit_of_measure(record.value(UNIT)),
        purchase_price: record.decimal(PURCHASE_PRICE),
        selling_price: record.decimal(SELLING_PRICE),
        stock_quantity,
        min_stock: record.decimal(MIN_STOCK),
        is_service: record.text(KIND).as_deref() == Some(SERVICE_KIND),
        is_active: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_three_without_price() {
        let record = LegacyRecord::new()
            .with("SF_ARTIKLA", 12i64)
            .with("NAZIV", "Kabl NYM 3x1.5")
            .with("VR_JEDINICA", 3i64)
            .with("CIJ_PRODAJNA", "");
        let product = from_legacy(&record);
        assert_eq!(product.code.as_deref(), Some("ART0012"));
        assert_eq!(product.unit_of_measure, "m");
        assert_eq!(product.selling_price, None);
        assert!(product.is_active);
        assert!(!product.is_service);
    }

    #[test]
    fn test_stock_and_service() {
        let record = LegacyRecord::new()
            .with("Sifra", "USL-01")
            .with("KOL_ULAZNA", 10.0)
            .with("KOL_IZLAZNA", 3.5)
            .with("VR_PROIZVODA", "2");
        let product = from_legacy(&record);
        assert_eq!(product.code.as_deref(), Some("USL-01"));
        assert_eq!(product.name.as_deref(), Some("Artikal USL-01"));
        assert_eq!(product.stock_quantity, Some(6.5));
        assert_eq!(product.unit_of_measure, "kom");
        assert!(product.is_service);
    }
}
