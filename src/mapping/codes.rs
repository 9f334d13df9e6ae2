//! Fixed lookup tables for legacy codes.

use crate::record::LegacyValue;
use serde::{Deserialize, Serialize};

/// Unit used when a legacy unit code is missing or unknown.
pub const DEFAULT_UNIT: &str = "kom";

const UNITS: &[(i64, &str)] = &[
    (1, "kom"),
    (2, "kg"),
    (3, "m"),
    (4, "m2"),
    (5, "m3"),
    (6, "l"),
    (7, "h"),
    (8, "pak"),
    (9, "ris"),
    (10, "tab"),
    (11, "kutija"),
];

/// Translate a legacy unit-of-measure code. Textual units that are already
/// in the target vocabulary pass through.
pub fn unit_of_measure(value: Option<&LegacyValue>) -> String {
    let Some(value) = value else {
        return DEFAULT_UNIT.to_string();
    };
    if let Some(code) = value.as_i64()
        && let Some((_, unit)) = UNITS.iter().find(|(c, _)| *c == code)
    {
        return unit.to_string();
    }
    if let Some(text) = value.as_text()
        && let Some((_, unit)) = UNITS.iter().find(|(_, u)| u.eq_ignore_ascii_case(&text))
    {
        return unit.to_string();
    }
    DEFAULT_UNIT.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl WorkOrderStatus {
    /// `N`ovi, `U` toku, `Z`avršen, `S`torniran, or the numeric 1-3 scheme
    /// used by older builds.
    pub fn from_code(value: Option<&LegacyValue>) -> Self {
        let code = value
            .and_then(LegacyValue::as_text)
            .map(|s| s.to_ascii_uppercase())
            .unwrap_or_default();
        match code.as_str() {
            "N" | "1" => WorkOrderStatus::Pending,
            "U" | "2" => WorkOrderStatus::InProgress,
            "Z" | "3" => WorkOrderStatus::Completed,
            "S" => WorkOrderStatus::Cancelled,
            _ => WorkOrderStatus::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    #[default]
    Issued,
    Cancelled,
}

impl InvoiceStatus {
    /// Only `S` (storno) marks a cancelled invoice.
    pub fn from_code(value: Option<&LegacyValue>) -> Self {
        match value.and_then(LegacyValue::as_text) {
            Some(code) if code.eq_ignore_ascii_case("S") => InvoiceStatus::Cancelled,
            _ => InvoiceStatus::Issued,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_codes() {
        assert_eq!(unit_of_measure(Some(&LegacyValue::Integer(3))), "m");
        assert_eq!(unit_of_measure(Some(&LegacyValue::text("11"))), "kutija");
        assert_eq!(unit_of_measure(Some(&LegacyValue::Decimal(2.0))), "kg");
        assert_eq!(unit_of_measure(Some(&LegacyValue::text("KG"))), "kg");
        assert_eq!(unit_of_measure(Some(&LegacyValue::Integer(99))), "kom");
        assert_eq!(unit_of_measure(None), "kom");
    }

    #[test]
    fn test_work_order_status() {
        let code = |s: &str| WorkOrderStatus::from_code(Some(&LegacyValue::text(s)));
        assert_eq!(code("N"), WorkOrderStatus::Pending);
        assert_eq!(code("u"), WorkOrderStatus::InProgress);
        assert_eq!(code("Z"), WorkOrderStatus::Completed);
        assert_eq!(code("3"), WorkOrderStatus::Completed);
        assert_eq!(code("S"), WorkOrderStatus::Cancelled);
        assert_eq!(code("X"), WorkOrderStatus::Pending);
        assert_eq!(WorkOrderStatus::from_code(None), WorkOrderStatus::Pending);
    }

    #[test]
    fn test_invoice_status() {
        assert_eq!(
            InvoiceStatus::from_code(Some(&LegacyValue::text("S"))),
            InvoiceStatus::Cancelled
        );
        assert_eq!(
            InvoiceStatus::from_code(Some(&LegacyValue::text("F"))),
            InvoiceStatus::Issued
        );
    }
}
