//! Field-by-field merging of configuration tiers.
//!
//! Tiers are parsed into `serde_json::Value` and folded together. Objects merge
//! key by key; every other value (arrays included) is replaced wholesale.

use serde_json::Value;

/// Merge `overlay` into `base` in place.
///
/// A null overlay means "not specified" and leaves `base` untouched.
///
/// # Example
/// ```
/// use serde_json::json;
/// use legacy_bridge::config::merge_into;
///
/// let mut base = json!({"batch_size": 100, "scrape": {"limit": 10, "page_size": 500}});
/// merge_into(&mut base, json!({"scrape": {"limit": 50}}));
/// assert_eq!(base, json!({"batch_size": 100, "scrape": {"limit": 50, "page_size": 500}}));
/// ```
pub fn merge_into(base: &mut Value, overlay: Value) {
    match overlay {
        Value::Null => {}
        Value::Object(overlay_map) => {
            if let Value::Object(base_map) = base {
                for (key, value) in overlay_map {
                    match base_map.get_mut(&key) {
                        Some(slot) => merge_into(slot, value),
                        None => {
                            base_map.insert(key, value);
                        }
                    }
                }
            } else {
                *base = Value::Object(overlay_map);
            }
        }
        other => *base = other,
    }
}

/// Fold tiers in order, later tiers taking precedence.
pub fn merge_tiers(tiers: impl IntoIterator<Item = Value>) -> Value {
    tiers.into_iter().fold(Value::Null, |mut acc, tier| {
        merge_into(&mut acc, tier);
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_nested_override_keeps_siblings() {
        let merged = merge_tiers([
            json!({"scrape": {"limit": 10, "base_url": "https://a"}, "batch_size": 100}),
            json!({"scrape": {"limit": 25}}),
        ]);
        assert_eq!(
            merged,
            json!({"scrape": {"limit": 25, "base_url": "https://a"}, "batch_size": 100})
        );
    }

    #[test]
    fn test_null_tier_is_ignored() {
        let merged = merge_tiers([json!({"retry_attempts": 3}), Value::Null]);
        assert_eq!(merged, json!({"retry_attempts": 3}));
    }

    #[test]
    fn test_null_field_preserves_base() {
        let merged = merge_tiers([
            json!({"report_dir": "reports"}),
            json!({"report_dir": null}),
        ]);
        assert_eq!(merged["report_dir"], "reports");
    }

    #[test]
    fn test_arrays_replace() {
        let merged = merge_tiers([json!({"only": ["companies", "products"]}), json!({"only": ["invoices"]})]);
        assert_eq!(merged["only"], json!(["invoices"]));
    }

    #[test]
    fn test_scalar_replaced_by_object() {
        let merged = merge_tiers([json!({"scrape": "off"}), json!({"scrape": {"limit": 1}})]);
        assert_eq!(merged["scrape"], json!({"limit": 1}));
    }
}
