//! Key lookups over JSON API payloads.

use super::FieldSource;
use crate::record::LegacyValue;
use serde_json::Value;

/// One JSON object viewed as a field source. Keys may be dotted paths
/// (`Address.City`); each segment matches exactly first, then
/// case-insensitively.
pub struct JsonObject<'a>(pub &'a Value);

impl<'a> JsonObject<'a> {
    fn lookup(&self, path: &str) -> Option<&'a Value> {
        path.split('.').try_fold(self.0, |node, segment| {
            let map = node.as_object()?;
            map.get(segment).or_else(|| {
                map.iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(segment))
                    .map(|(_, v)| v)
            })
        })
    }
}

impl FieldSource for JsonObject<'_> {
    fn raw(&self, candidate: &str) -> Option<LegacyValue> {
        let value = match self.lookup(candidate)? {
            Value::Null => return None,
            Value::Bool(b) => LegacyValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => LegacyValue::Integer(i),
                None => LegacyValue::from(n.as_f64()?),
            },
            Value::String(s) => LegacyValue::text(s),
            other => LegacyValue::Text(other.to_string()),
        };
        Some(value)
    }
}

/// Parse a payload that may hold several JSON documents back to back, as
/// saved listing dumps do (`{...}{...}`).
pub fn parse_pages(content: &str) -> Result<Vec<Value>, serde_json::Error> {
    serde_json::Deserializer::from_str(content)
        .into_iter::<Value>()
        .collect()
}

/// Rows of a listing page: the `Data` array, or the page itself if it is
/// already an array.
pub fn listing_rows(page: &Value) -> Vec<&Value> {
    match page {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => JsonObject(page)
            .lookup("Data")
            .and_then(Value::as_array)
            .map(|items| items.iter().collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// The `Total` row count a listing page advertises, if any.
pub fn listing_total(page: &Value) -> Option<u64> {
    JsonObject(page).lookup("Total").and_then(Value::as_u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{FieldSpec, extract};
    use serde_json::json;

    #[test]
    fn test_key_fallback_and_paths() {
        let value = json!({
            "CompanyName": "Beta DOO",
            "vatnumber": "03111222",
            "Seat": {"Place": "Budva"},
            "NumberOfEmployees": 14,
            "SalesIncome": 125000.5,
            "Email": null
        });
        let specs = vec![
            FieldSpec::new("name", &["Name", "CompanyName"]),
            FieldSpec::new("tax_number", &["TaxNumber", "VatNumber"]),
            FieldSpec::new("city", &["Place", "Seat.Place"]),
            FieldSpec::new("employees", &["NumberOfEmployees"]).integer(),
            FieldSpec::new("revenue", &["SalesIncome"]).decimal('.'),
            FieldSpec::new("email", &["Email"]),
        ];
        let fields = extract(&JsonObject(&value), &specs);
        assert_eq!(fields.text(&["name"]).unwrap(), "Beta DOO");
        assert_eq!(fields.text(&["tax_number"]).unwrap(), "03111222");
        assert_eq!(fields.text(&["city"]).unwrap(), "Budva");
        assert_eq!(fields.get("employees"), Some(&LegacyValue::Integer(14)));
        assert_eq!(fields.get("revenue"), Some(&LegacyValue::Decimal(125000.5)));
        assert!(!fields.contains("email"));
    }

    #[test]
    fn test_concatenated_pages() {
        let dump = r#"{"Data":[{"Name":"A"},{"Name":"B"}],"Total":3}{"Data":[{"Name":"C"}],"Total":3}"#;
        let pages = parse_pages(dump).unwrap();
        assert_eq!(pages.len(), 2);
        let rows: Vec<_> = pages.iter().flat_map(listing_rows).collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2]["Name"], "C");
    }

    #[test]
    fn test_truncated_dump_errors() {
        assert!(parse_pages(r#"{"Data":[]}{"Data":["#).is_err());
    }
}
