//! Field descriptors and the per-kind value formatter that turns raw record
//! values into menu entries.

use serde::{Deserialize, Serialize};

use crate::value::{format_number, RawValue};

/// Fields tried, in order, when pulling a display name out of a person or
/// department payload.
const NAME_KEYS: &[&str] = &["name", "fullname", "departmentName"];

/// Declared value kind of a source column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// Person, department, member multi-select and similar references.
    Reference,
    /// Numbers and currency amounts.
    Numeric,
    Attachment,
    /// Single choice, multi choice and dropdown columns.
    Choice,
    Other(u32),
}

impl FieldKind {
    /// Map a host column type code onto a kind.
    pub fn from_code(code: u32) -> Self {
        match code {
            3 | 26 | 27 => FieldKind::Reference,
            6 | 8 => FieldKind::Numeric,
            14 => FieldKind::Attachment,
            9 | 10 | 11 => FieldKind::Choice,
            other => FieldKind::Other(other),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionEntry {
    pub key: String,
    pub value: String,
}

impl OptionEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Choice labels in declared order. Lookups return the first match.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OptionSet {
    entries: Vec<OptionEntry>,
}

impl OptionSet {
    pub fn new(entries: Vec<OptionEntry>) -> Self {
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a selected key to its label.
    ///
    /// Keys carrying a custom answer (`other...`, `add_...`) embed the option key,
    /// so those are matched by containment instead of equality.
    pub fn label_for(&self, key: &RawValue) -> Option<&str> {
        let entry = match key.as_str() {
            Some(text) if text.contains("other") || text.starts_with("add_") => self
                .entries
                .iter()
                .find(|entry| text.contains(entry.key.as_str())),
            Some(text) => self.entries.iter().find(|entry| entry.key == text),
            None => None,
        };
        entry.map(|entry| entry.value.as_str())
    }
}

impl FromIterator<OptionEntry> for OptionSet {
    fn from_iter<T: IntoIterator<Item = OptionEntry>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// One column to sample from each record.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDescriptor {
    pub id: String,
    pub kind: FieldKind,
    pub options: Option<OptionSet>,
}

impl FieldDescriptor {
    pub fn new(id: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            id: id.into(),
            kind,
            options: None,
        }
    }

    pub fn with_options(mut self, options: OptionSet) -> Self {
        self.options = Some(options);
        self
    }

    pub fn format(&self, raw: &RawValue) -> String {
        format_field_value(raw, self.kind, self.options.as_ref())
    }
}

/// Render a raw value as display text according to its declared kind.
///
/// Never fails: malformed payloads fall back to the raw text or to an empty string.
pub fn format_field_value(raw: &RawValue, kind: FieldKind, options: Option<&OptionSet>) -> String {
    if raw.is_empty_like() {
        return String::new();
    }
    match kind {
        FieldKind::Reference => extract_name(raw),
        FieldKind::Numeric => format_numeric(raw),
        FieldKind::Attachment => format_attachments(raw),
        FieldKind::Choice => format_choices(raw, options),
        FieldKind::Other(_) => {
            let text = raw.to_text();
            let name = extract_name(raw);
            if !name.is_empty() && name != text {
                name
            } else {
                text
            }
        }
    }
}

/// Pull a human-readable name out of a person/department payload.
fn extract_name(raw: &RawValue) -> String {
    let parsed;
    let value = match raw {
        RawValue::Text(text) => match RawValue::parse_json(text) {
            Some(value) => {
                parsed = value;
                &parsed
            }
            None => return text.clone(),
        },
        other => other,
    };

    let subject = match value {
        RawValue::List(items) => match items.first() {
            Some(first) => first,
            None => return String::new(),
        },
        other => other,
    };

    NAME_KEYS
        .iter()
        .filter_map(|key| subject.get(key))
        .find(|candidate| candidate.is_truthy())
        .map(RawValue::to_text)
        .unwrap_or_else(|| raw.to_text())
}

fn format_numeric(raw: &RawValue) -> String {
    match raw {
        RawValue::Number(number) => format_number(*number),
        RawValue::Text(text) => match text.trim().parse::<f64>() {
            Ok(number) if number.is_finite() => format_number(number),
            _ => text.clone(),
        },
        other => other.to_text(),
    }
}

fn format_attachments(raw: &RawValue) -> String {
    if !raw.is_truthy() {
        return String::new();
    }
    let parsed;
    let files = match raw {
        RawValue::Text(text) => match RawValue::parse_json(text) {
            Some(value) => {
                parsed = value;
                &parsed
            }
            None => return String::new(),
        },
        other => other,
    };
    let RawValue::List(files) = files else {
        return String::new();
    };

    files
        .iter()
        .filter_map(|file| {
            let name = file.get("originalFilename").filter(|name| name.is_truthy())?;
            let ext = file
                .get("ext")
                .filter(|ext| ext.is_truthy())
                .map(RawValue::to_text)
                .unwrap_or_default();
            Some(format!("{}{}", name.to_text(), ext))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_choices(raw: &RawValue, options: Option<&OptionSet>) -> String {
    if !raw.is_truthy() {
        return String::new();
    }
    let keys = match raw {
        RawValue::Text(text) => match RawValue::parse_json(text) {
            Some(RawValue::List(keys)) => keys,
            Some(scalar) => vec![scalar],
            None => return raw.to_text(),
        },
        RawValue::List(keys) => keys.clone(),
        scalar => vec![scalar.clone()],
    };

    let options = match options {
        Some(options) if !options.is_empty() => options,
        _ => {
            return keys
                .iter()
                .map(RawValue::to_text)
                .collect::<Vec<_>>()
                .join(", ")
        }
    };

    keys.iter()
        .map(|key| {
            options
                .label_for(key)
                .map(str::to_string)
                .unwrap_or_else(|| key.to_text())
        })
        .filter(|label| !label.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}
