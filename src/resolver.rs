//! Decides which names the picker draws from.
//!
//! Priority: operator text, then the built-in list when no fields are selected,
//! then the values of the selected fields across the first page of records.
//! A failed or empty fetch keeps whatever list was active before.

use std::collections::HashSet;

use rand::Rng;

use crate::format::FieldDescriptor;
use crate::source::{FetchError, FetchRequest, RecordPage, RecordSource};

pub const DEFAULT_MENU: &[&str] = &[
    "Hamburger",
    "Pizza",
    "Sushi",
    "Hot pot",
    "Fried chicken",
    "Steak",
    "Salad",
    "Noodles",
    "Korean BBQ",
    "Jianbing",
    "Dumplings",
    "McDonald's",
    "Dicos",
    "Beef noodle soup",
    "Fish and chips",
    "Imperial banquet",
    "Buns and congee",
    "Pork knuckle rice",
    "Braised chicken rice",
    "Chongqing noodles",
    "Braised pork rice",
    "Skewers",
];

/// Separators accepted in operator text: ASCII and full-width commas, the
/// enumeration comma and line breaks.
fn is_separator(ch: char) -> bool {
    matches!(ch, ',' | '，' | '、' | '\r' | '\n')
}

/// The names the picker currently draws from. Never empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateList {
    items: Vec<String>,
}

impl Default for CandidateList {
    fn default() -> Self {
        Self::builtin()
    }
}

impl CandidateList {
    pub fn builtin() -> Self {
        Self {
            items: DEFAULT_MENU.iter().map(|item| item.to_string()).collect(),
        }
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Uniform draw with replacement.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> &str {
        &self.items[rng.random_range(0..self.items.len())]
    }

    /// Install a resolution outcome. Returns whether the list was replaced.
    pub fn apply(&mut self, resolution: Resolution) -> bool {
        match resolution {
            Resolution::Manual(items) | Resolution::Fetched(items) if !items.is_empty() => {
                self.items = items;
                true
            }
            Resolution::Builtin => {
                *self = Self::builtin();
                true
            }
            _ => false,
        }
    }
}

/// Result of one resolution cycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// Names typed by the operator.
    Manual(Vec<String>),
    /// No fields selected; use the built-in list.
    Builtin,
    /// Values pulled from records.
    Fetched(Vec<String>),
    /// Nothing usable; keep the current list.
    Unchanged,
}

impl Resolution {
    pub fn label(&self) -> &'static str {
        match self {
            Resolution::Manual(_) => "manual list",
            Resolution::Builtin => "built-in list",
            Resolution::Fetched(_) => "records",
            Resolution::Unchanged => "unchanged",
        }
    }
}

/// What the caller has to do next to finish a resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolvePlan {
    Ready(Resolution),
    Fetch(FetchRequest),
}

#[derive(Clone, Debug, Default)]
pub struct MenuResolver {
    text: Option<String>,
    fields: Vec<FieldDescriptor>,
    table_id: String,
    view_id: Option<String>,
}

impl MenuResolver {
    pub fn new(
        text: Option<String>,
        fields: Vec<FieldDescriptor>,
        table_id: impl Into<String>,
        view_id: Option<String>,
    ) -> Self {
        Self {
            text,
            fields,
            table_id: table_id.into(),
            view_id,
        }
    }

    pub fn plan(&self) -> ResolvePlan {
        if let Some(text) = self.text.as_deref().filter(|text| !text.trim().is_empty()) {
            let items = split_operator_text(text);
            if !items.is_empty() {
                return ResolvePlan::Ready(Resolution::Manual(items));
            }
        }
        if self.fields.is_empty() {
            tracing::info!("no fields selected, using the built-in menu");
            return ResolvePlan::Ready(Resolution::Builtin);
        }
        ResolvePlan::Fetch(FetchRequest::first_page(
            self.table_id.clone(),
            self.view_id.clone(),
        ))
    }

    /// Turn a fetch outcome into a resolution. Errors are logged, never raised.
    pub fn finish(&self, result: Result<RecordPage, FetchError>) -> Resolution {
        match result {
            Ok(page) => {
                let items = collect_candidates(&page, &self.fields);
                if items.is_empty() {
                    tracing::info!(
                        records = page.data.len(),
                        "records held no usable values, keeping the current menu"
                    );
                    Resolution::Unchanged
                } else {
                    tracing::info!(
                        records = page.data.len(),
                        items = items.len(),
                        "loaded menu from records"
                    );
                    Resolution::Fetched(items)
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to fetch records, keeping the current menu");
                Resolution::Unchanged
            }
        }
    }

    /// Resolve synchronously against `source`.
    pub fn resolve_with(&self, source: Option<&dyn RecordSource>) -> Resolution {
        match self.plan() {
            ResolvePlan::Ready(resolution) => resolution,
            ResolvePlan::Fetch(request) => {
                let result = match source {
                    Some(source) => source.fetch_records(&request),
                    None => Err(FetchError::Unavailable),
                };
                self.finish(result)
            }
        }
    }
}

/// Split operator text into trimmed, non-empty, distinct entries.
pub fn split_operator_text(text: &str) -> Vec<String> {
    dedup_preserving_order(
        text.split(is_separator)
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string),
    )
}

/// Drop repeats, keeping the first occurrence of each entry.
pub fn dedup_preserving_order<I>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Format every selected field of every record and keep the distinct,
/// non-blank results in record order.
pub fn collect_candidates(page: &RecordPage, fields: &[FieldDescriptor]) -> Vec<String> {
    let values = page.data.iter().flat_map(|record| {
        fields.iter().filter_map(move |field| {
            let raw = record.get(&field.id)?;
            let formatted = field.format(raw);
            if formatted.trim().is_empty() {
                None
            } else {
                Some(formatted)
            }
        })
    });
    dedup_preserving_order(values)
}
