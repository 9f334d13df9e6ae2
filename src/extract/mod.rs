//! Field extraction from fetched pages and API payloads.
//!
//! Registry pages change labels between template versions, so every target
//! field is described by an ordered list of candidate labels (HTML) or keys
//! (JSON); the first candidate that yields a value wins. Missing fields are
//! simply absent from the result. Whether absence matters is decided by the
//! mapper's validation, not here.

pub mod coerce;
pub mod html;
pub mod json;
pub mod registry;

use crate::record::{LegacyRecord, LegacyValue};
use tracing::trace;

pub use coerce::{Coercion, OnFailure};
pub use html::HtmlPage;
pub use json::JsonObject;

/// Extracted fields, keyed by target field name.
pub type MappedFields = LegacyRecord;

/// Placeholders registry pages print instead of leaving a cell empty.
const EMPTY_MARKERS: &[&str] = &["-", "N/A", "n/a", "/"];

/// One target field and where to find it.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub target: String,
    pub candidates: Vec<String>,
    pub coercion: Coercion,
    pub on_failure: OnFailure,
}

impl FieldSpec {
    pub fn new(target: &str, candidates: &[&str]) -> Self {
        Self {
            target: target.to_string(),
            candidates: candidates.iter().map(|c| c.to_string()).collect(),
            coercion: Coercion::Text,
            on_failure: OnFailure::Null,
        }
    }

    pub fn date(mut self) -> Self {
        self.coercion = Coercion::Date;
        self
    }

    pub fn decimal(mut self, separator: char) -> Self {
        self.coercion = Coercion::Decimal { separator };
        self
    }

    pub fn integer(mut self) -> Self {
        self.coercion = Coercion::Integer;
        self
    }

    pub fn percentage(mut self) -> Self {
        self.coercion = Coercion::Percentage;
        self
    }

    pub fn zero_on_failure(mut self) -> Self {
        self.on_failure = OnFailure::Zero;
        self
    }
}

/// Anything that can answer "what value sits under this label or key".
pub trait FieldSource {
    fn raw(&self, candidate: &str) -> Option<LegacyValue>;
}

fn is_empty_marker(value: &LegacyValue) -> bool {
    match value {
        LegacyValue::Null => true,
        LegacyValue::Text(s) => EMPTY_MARKERS.contains(&s.as_str()),
        _ => false,
    }
}

/// Extract every spec from `source`. Never fails.
pub fn extract<S: FieldSource + ?Sized>(source: &S, specs: &[FieldSpec]) -> MappedFields {
    let mut fields = MappedFields::new();
    for spec in specs {
        let hit = spec.candidates.iter().find_map(|candidate| {
            source
                .raw(candidate)
                .map(LegacyValue::normalized)
                .filter(|v| !is_empty_marker(v))
                .map(|v| (candidate, v))
        });
        if let Some((candidate, raw)) = hit {
            trace!(field = %spec.target, %candidate, "extracted");
            fields.insert(spec.target.clone(), spec.coercion.apply(&raw, spec.on_failure));
        }
    }
    fields
}
