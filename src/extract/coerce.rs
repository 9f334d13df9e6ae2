//! Light type coercion for extracted values.
//!
//! Coercions never fail loudly: a value that does not parse yields `None` and
//! the field's failure policy decides between `0` and null.

use crate::record::{LegacyValue, parse_legacy_date, parse_number};
use chrono::NaiveDate;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static EMBEDDED_DATE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d{2})\.(\d{2})\.(\d{4})").ok());

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Coercion {
    /// Trimmed text.
    Text,
    /// `DD.MM.YYYY` (and the other legacy shapes) to an ISO date.
    Date,
    /// Strip everything but digits, `-` and the separator, then parse.
    Decimal { separator: char },
    /// Whole number; thousands groups are joined, a fraction is truncated.
    Integer,
    /// `12,5 %` to `12.5`.
    Percentage,
}

/// What a failed numeric coercion produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnFailure {
    #[default]
    Null,
    Zero,
}

impl Coercion {
    pub fn apply(&self, value: &LegacyValue, on_failure: OnFailure) -> LegacyValue {
        let coerced = match self {
            Coercion::Text => value.as_text().map(LegacyValue::from),
            Coercion::Date => coerce_date(value).map(LegacyValue::Date),
            Coercion::Decimal { separator } => {
                coerce_decimal(value, *separator).map(LegacyValue::from)
            }
            Coercion::Integer => coerce_integer(value).map(LegacyValue::Integer),
            Coercion::Percentage => coerce_percentage(value).map(LegacyValue::from),
        };
        match (coerced, on_failure) {
            (Some(v), _) => v,
            (None, OnFailure::Null) => LegacyValue::Null,
            (None, OnFailure::Zero) => match self {
                Coercion::Integer => LegacyValue::Integer(0),
                Coercion::Decimal { .. } | Coercion::Percentage => LegacyValue::Decimal(0.0),
                Coercion::Text | Coercion::Date => LegacyValue::Null,
            },
        }
    }
}

pub fn coerce_date(value: &LegacyValue) -> Option<NaiveDate> {
    match value {
        LegacyValue::Date(d) => Some(*d),
        LegacyValue::Text(s) => parse_legacy_date(s)
            .or_else(|| json_date(s))
            .or_else(|| embedded_date(s)),
        _ => None,
    }
}

/// ASP.NET JSON dates: `/Date(1554076800000)/`, optionally with an offset.
fn json_date(s: &str) -> Option<NaiveDate> {
    let inner = s.strip_prefix("/Date(")?.strip_suffix(")/")?;
    if inner.is_empty() {
        return None;
    }
    let end = inner
        .char_indices()
        .skip(1)
        .find(|(_, c)| matches!(c, '+' | '-'))
        .map_or(inner.len(), |(i, _)| i);
    let millis: i64 = inner[..end].parse().ok()?;
    chrono::DateTime::from_timestamp_millis(millis).map(|dt| dt.date_naive())
}

/// Find a `DD.MM.YYYY` run inside surrounding text ("Osnovano: 12.03.2001").
fn embedded_date(s: &str) -> Option<NaiveDate> {
    let caps = EMBEDDED_DATE.as_ref()?.captures(s)?;
    let day = caps.get(1)?.as_str().parse().ok()?;
    let month = caps.get(2)?.as_str().parse().ok()?;
    let year = caps.get(3)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn coerce_decimal(value: &LegacyValue, separator: char) -> Option<f64> {
    match value {
        LegacyValue::Integer(i) => Some(*i as f64),
        LegacyValue::Decimal(d) => Some(*d),
        LegacyValue::Text(s) => {
            let kept: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '-' || *c == separator)
                .collect();
            let normalized = if separator == '.' {
                kept
            } else {
                kept.replace(separator, ".")
            };
            normalized.parse::<f64>().ok().filter(|d| d.is_finite())
        }
        _ => None,
    }
}

pub fn coerce_integer(value: &LegacyValue) -> Option<i64> {
    match value {
        LegacyValue::Integer(i) => Some(*i),
        LegacyValue::Decimal(d) => Some(d.trunc() as i64),
        LegacyValue::Text(s) => {
            let kept: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || matches!(c, '-' | '.' | ','))
                .collect();
            let mut groups = kept.trim_start_matches('-').split(['.', ',']);
            let lead = groups.next()?;
            if !lead.is_empty() && groups.all(|g| g.len() == 3) {
                // "1.234" and "1,234,567" are thousands groups.
                let digits: String = kept.chars().filter(char::is_ascii_digit).collect();
                let n = digits.parse::<i64>().ok()?;
                return Some(if kept.starts_with('-') { -n } else { n });
            }
            parse_number(&kept).map(|d| d.trunc() as i64)
        }
        _ => None,
    }
}

pub fn coerce_percentage(value: &LegacyValue) -> Option<f64> {
    match value {
        LegacyValue::Integer(i) => Some(*i as f64),
        LegacyValue::Decimal(d) => Some(*d),
        LegacyValue::Text(s) => s
            .replace('%', "")
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .ok()
            .filter(|d| d.is_finite()),
        _ => None,
    }
}
