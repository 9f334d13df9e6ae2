//! Untyped legacy records.
//!
//! A `LegacyRecord` is the "bag of fields" that sits before the mapping
//! boundary: an ordered column name to scalar map with no schema guarantees.
//! Text is trimmed on the way in and blank strings or the literal `null`
//! become real nulls, so every reader and extractor hands the mapper the same
//! shape.

use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A loosely typed scalar from a legacy row or an extracted page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LegacyValue {
    Null,
    Bool(bool),
    Integer(i64),
    Decimal(f64),
    Date(NaiveDate),
    Text(String),
}

impl LegacyValue {
    /// Build a text value, normalizing blanks and the `null` sentinel.
    pub fn text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
            LegacyValue::Null
        } else {
            LegacyValue::Text(trimmed.to_string())
        }
    }

    /// Re-apply normalization to a value built elsewhere.
    pub fn normalized(self) -> Self {
        match self {
            LegacyValue::Text(s) => LegacyValue::text(&s),
            LegacyValue::Decimal(d) if !d.is_finite() => LegacyValue::Null,
            other => other,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, LegacyValue::Null)
    }

    /// Render as trimmed text. Whole decimals render without a fraction so
    /// `12.0` and `12` produce the same key.
    pub fn as_text(&self) -> Option<String> {
        match self {
            LegacyValue::Null => None,
            LegacyValue::Bool(b) => Some(b.to_string()),
            LegacyValue::Integer(i) => Some(i.to_string()),
            LegacyValue::Decimal(d) => {
                if d.fract() == 0.0 && d.abs() < 1e15 {
                    Some(format!("{}", *d as i64))
                } else {
                    Some(d.to_string())
                }
            }
            LegacyValue::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            LegacyValue::Text(s) => Some(s.clone()),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            LegacyValue::Integer(i) => Some(*i as f64),
            LegacyValue::Decimal(d) => Some(*d),
            LegacyValue::Text(s) => parse_number(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            LegacyValue::Integer(i) => Some(*i),
            LegacyValue::Decimal(d) if d.fract() == 0.0 => Some(*d as i64),
            LegacyValue::Text(s) => s.parse::<i64>().ok().or_else(|| {
                parse_number(s)
                    .filter(|d| d.fract() == 0.0)
                    .map(|d| d as i64)
            }),
            _ => None,
        }
    }

    /// Legacy flags come as booleans, 0/1, or single letters (`D`a, `Y`es).
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            LegacyValue::Bool(b) => Some(*b),
            LegacyValue::Integer(i) => Some(*i != 0),
            LegacyValue::Text(s) => match s.to_ascii_uppercase().as_str() {
                "D" | "DA" | "Y" | "YES" | "TRUE" | "1" | "-1" => Some(true),
                "N" | "NE" | "NO" | "FALSE" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            LegacyValue::Date(d) => Some(*d),
            LegacyValue::Text(s) => parse_legacy_date(s),
            _ => None,
        }
    }
}

impl From<&str> for LegacyValue {
    fn from(s: &str) -> Self {
        LegacyValue::text(s)
    }
}

impl From<String> for LegacyValue {
    fn from(s: String) -> Self {
        LegacyValue::text(&s)
    }
}

impl From<i64> for LegacyValue {
    fn from(i: i64) -> Self {
        LegacyValue::Integer(i)
    }
}

impl From<f64> for LegacyValue {
    fn from(d: f64) -> Self {
        LegacyValue::Decimal(d).normalized()
    }
}

impl From<bool> for LegacyValue {
    fn from(b: bool) -> Self {
        LegacyValue::Bool(b)
    }
}

impl From<NaiveDate> for LegacyValue {
    fn from(d: NaiveDate) -> Self {
        LegacyValue::Date(d)
    }
}

/// Parse a number that may use either `.` or `,` as the decimal separator.
pub fn parse_number(raw: &str) -> Option<f64> {
    let s: String = raw.trim().chars().filter(|c| !c.is_whitespace()).collect();
    if s.is_empty() {
        return None;
    }
    let normalized = match (s.rfind('.'), s.rfind(',')) {
        (Some(dot), Some(comma)) if comma > dot => s.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => s.replace(',', ""),
        (None, Some(_)) => s.replace(',', "."),
        _ => s,
    };
    normalized.parse::<f64>().ok().filter(|d| d.is_finite())
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y", "%d.%m.%Y.", "%m/%d/%Y", "%Y/%m/%d"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
    "%d.%m.%Y %H:%M:%S",
];

/// Parse the date shapes seen in legacy exports and registry pages.
pub fn parse_legacy_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    // RFC 3339 with offset, e.g. "2019-04-01T00:00:00+02:00"
    chrono::DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.date_naive())
}

/// Ordered column to value map produced by readers and extractors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LegacyRecord {
    fields: IndexMap<String, LegacyValue>,
}

impl LegacyRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field, normalizing text values.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<LegacyValue>) {
        self.fields.insert(name.into(), value.into().normalized());
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<LegacyValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Exact lookup by column name.
    pub fn get(&self, name: &str) -> Option<&LegacyValue> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &LegacyValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// First non-null value among `candidates`, in order. Each candidate is
    /// tried exactly, then case-insensitively. Returns the column that matched.
    pub fn lookup<'a>(&'a self, candidates: &[&str]) -> Option<(&'a str, &'a LegacyValue)> {
        for candidate in candidates {
            if let Some((k, v)) = self.fields.get_key_value(*candidate)
                && !v.is_null()
            {
                return Some((k.as_str(), v));
            }
            if let Some((k, v)) = self
                .fields
                .iter()
                .find(|(k, v)| k.eq_ignore_ascii_case(candidate) && !v.is_null())
            {
                return Some((k.as_str(), v));
            }
        }
        None
    }

    pub fn value(&self, candidates: &[&str]) -> Option<&LegacyValue> {
        self.lookup(candidates).map(|(_, v)| v)
    }

    pub fn text(&self, candidates: &[&str]) -> Option<String> {
        self.value(candidates).and_then(LegacyValue::as_text)
    }

    pub fn decimal(&self, candidates: &[&str]) -> Option<f64> {
        self.value(candidates).and_then(LegacyValue::as_f64)
    }

    pub fn integer(&self, candidates: &[&str]) -> Option<i64> {
        self.value(candidates).and_then(LegacyValue::as_i64)
    }

    pub fn flag(&self, candidates: &[&str]) -> Option<bool> {
        self.value(candidates).and_then(LegacyValue::as_bool)
    }

    pub fn date(&self, candidates: &[&str]) -> Option<NaiveDate> {
        self.value(candidates).and_then(LegacyValue::as_date)
    }
}

impl<K: Into<String>, V: Into<LegacyValue>> FromIterator<(K, V)> for LegacyRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut record = LegacyRecord::new();
        for (k, v) in iter {
            record.insert(k, v);
        }
        record
    }
}

/// Resolve which column would serve `candidates` given a table's column list.
///
/// Returns the column and whether a fallback (anything but the first
/// candidate, exact) was needed.
pub fn resolve_column<'a>(columns: &'a [String], candidates: &[&str]) -> Option<(&'a str, bool)> {
    for (i, candidate) in candidates.iter().enumerate() {
        if let Some(c) = columns.iter().find(|c| c.as_str() == *candidate) {
            return Some((c.as_str(), i > 0));
        }
        if let Some(c) = columns.iter().find(|c| c.eq_ignore_ascii_case(candidate)) {
            return Some((c.as_str(), true));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_normalization() {
        assert_eq!(LegacyValue::text("  abc "), LegacyValue::Text("abc".into()));
        assert_eq!(LegacyValue::text("   "), LegacyValue::Null);
        assert_eq!(LegacyValue::text("null"), LegacyValue::Null);
        assert_eq!(LegacyValue::text("NULL"), LegacyValue::Null);
    }

    #[test]
    fn test_whole_decimal_renders_as_integer() {
        assert_eq!(LegacyValue::Decimal(42.0).as_text().unwrap(), "42");
        assert_eq!(LegacyValue::Decimal(4.5).as_text().unwrap(), "4.5");
        assert_eq!(LegacyValue::Integer(42).as_text().unwrap(), "42");
    }

    #[test]
    fn test_parse_number_separators() {
        assert_eq!(parse_number("12,50"), Some(12.5));
        assert_eq!(parse_number("1.234,50"), Some(1234.5));
        assert_eq!(parse_number("1,234.50"), Some(1234.5));
        assert_eq!(parse_number(" 7 "), Some(7.0));
        assert_eq!(parse_number("abc"), None);
    }

    #[test]
    fn test_parse_legacy_date_shapes() {
        let expected = NaiveDate::from_ymd_opt(2019, 4, 1).unwrap();
        assert_eq!(parse_legacy_date("2019-04-01"), Some(expected));
        assert_eq!(parse_legacy_date("01.04.2019"), Some(expected));
        assert_eq!(parse_legacy_date("01.04.2019."), Some(expected));
        assert_eq!(parse_legacy_date("04/01/2019 00:00:00"), Some(expected));
        assert_eq!(parse_legacy_date("2019-04-01 13:45:00"), Some(expected));
        assert_eq!(parse_legacy_date("yesterday"), None);
    }

    #[test]
    fn test_lookup_order_and_case() {
        let record = LegacyRecord::new()
            .with("naziv", "Firma d.o.o.")
            .with("PIB", "")
            .with("MATICNI", "02345678");

        // Exact miss, case-insensitive hit
        let (col, value) = record.lookup(&["NAZIV"]).unwrap();
        assert_eq!(col, "naziv");
        assert_eq!(value.as_text().unwrap(), "Firma d.o.o.");

        // Null values are skipped in favour of the next candidate
        assert_eq!(record.text(&["PIB", "MATICNI"]).unwrap(), "02345678");
        assert!(record.text(&["MISSING"]).is_none());
    }

    #[test]
    fn test_resolve_column_reports_fallback() {
        let columns = vec!["Sifra".to_string(), "naziv".to_string()];
        assert_eq!(
            resolve_column(&columns, &["SF_ARTIKLA", "Sifra"]),
            Some(("Sifra", true))
        );
        assert_eq!(resolve_column(&columns, &["naziv"]), Some(("naziv", false)));
        assert_eq!(resolve_column(&columns, &["NAZIV"]), Some(("naziv", true)));
        assert_eq!(resolve_column(&columns, &["X"]), None);
    }

    #[test]
    fn test_flags() {
        assert_eq!(LegacyValue::text("D").as_bool(), Some(true));
        assert_eq!(LegacyValue::text("N").as_bool(), Some(false));
        assert_eq!(LegacyValue::Integer(0).as_bool(), Some(false));
    }
}
