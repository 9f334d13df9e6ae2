//! Label-based lookups over registry HTML pages.

use super::FieldSource;
use crate::record::LegacyValue;
use scraper::{ElementRef, Html, Selector};

/// A parsed page. Not `Send`; extract before the next `.await`.
pub struct HtmlPage {
    doc: Html,
}

/// (label element, value element) pairs tried in order.
const LABEL_PAIRS: &[(&str, Option<&str>)] = &[
    ("td", Some("td")),
    ("th", Some("td")),
    ("dt", Some("dd")),
    ("label", None),
];

impl HtmlPage {
    pub fn parse(content: &str) -> Self {
        Self {
            doc: Html::parse_document(content),
        }
    }

    /// Value next to the first element whose text is `label`. Exact text
    /// matches are preferred over elements that merely contain the label.
    pub fn label_value(&self, label: &str) -> Option<String> {
        let label = label.trim();
        for exact in [true, false] {
            for (label_tag, value_tag) in LABEL_PAIRS {
                let Ok(selector) = Selector::parse(label_tag) else {
                    continue;
                };
                for element in self.doc.select(&selector) {
                    let text = element_text(element);
                    let matched = if exact {
                        text.trim_end_matches(':').trim() == label
                    } else {
                        text.contains(label)
                    };
                    if !matched {
                        continue;
                    }
                    if let Some(value) = next_element(element, *value_tag)
                        .map(element_text)
                        .filter(|v| !v.is_empty())
                    {
                        return Some(value);
                    }
                }
            }
        }
        None
    }

    /// Column view over the business-results table for one fiscal year.
    ///
    /// With no year given, the most recent year found in a header cell is used.
    pub fn results_column(&self, year: Option<i32>) -> Option<YearColumn<'_>> {
        let header = Selector::parse("th").ok()?;
        let mut best: Option<(i32, usize)> = None;
        for th in self.doc.select(&header) {
            let text = element_text(th);
            let Some(found) = year_in(&text) else {
                continue;
            };
            if year.is_some_and(|y| y != found) {
                continue;
            }
            let index = th.prev_siblings().filter_map(ElementRef::wrap).count();
            if best.is_none_or(|(y, _)| found > y) {
                best = Some((found, index));
            }
        }
        best.map(|(year, column)| YearColumn {
            page: self,
            year,
            column,
        })
    }
}

impl FieldSource for HtmlPage {
    fn raw(&self, candidate: &str) -> Option<LegacyValue> {
        self.label_value(candidate).map(|v| LegacyValue::text(&v))
    }
}

/// Looks up a row by its label cell and reads the cell in one year's column.
pub struct YearColumn<'a> {
    page: &'a HtmlPage,
    pub year: i32,
    column: usize,
}

impl FieldSource for YearColumn<'_> {
    fn raw(&self, candidate: &str) -> Option<LegacyValue> {
        let rows = Selector::parse("tr").ok()?;
        for row in self.page.doc.select(&rows) {
            let cells: Vec<ElementRef<'_>> = row
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|c| matches!(c.value().name(), "td" | "th"))
                .collect();
            let labelled = cells
                .first()
                .is_some_and(|first| element_text(*first).contains(candidate));
            if !labelled {
                continue;
            }
            return cells
                .get(self.column)
                .map(|cell| LegacyValue::text(&element_text(*cell)));
        }
        None
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// The element sibling directly after `element`, if it has the wanted tag.
fn next_element<'a>(element: ElementRef<'a>, tag: Option<&str>) -> Option<ElementRef<'a>> {
    let next = element.next_siblings().find_map(ElementRef::wrap)?;
    match tag {
        Some(tag) if next.value().name() != tag => None,
        _ => Some(next),
    }
}

fn year_in(text: &str) -> Option<i32> {
    let trimmed = text.trim();
    (trimmed.len() == 4 && trimmed.chars().all(|c| c.is_ascii_digit()))
        .then(|| trimmed.parse().ok())
        .flatten()
        .filter(|y| (1900..=2100).contains(y))
}
