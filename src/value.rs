//! Loosely-typed record values as delivered by the host table API.
//!
//! The host hands back strings, JSON-encoded strings, arrays or objects for the
//! same column depending on the column type and on platform quirks. Everything is
//! decoded once into [`RawValue`] at the ingestion boundary; formatters then
//! dispatch on the declared field kind and only parse embedded JSON on demand.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(from = "serde_json::Value")]
pub enum RawValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<RawValue>),
    Map(BTreeMap<String, RawValue>),
}

impl RawValue {
    pub fn text(value: impl Into<String>) -> Self {
        RawValue::Text(value.into())
    }

    /// Decode a JSON document held inside a text value.
    pub fn parse_json(text: &str) -> Option<RawValue> {
        serde_json::from_str::<Value>(text).ok().map(RawValue::from)
    }

    /// Values the host uses to mean "nothing here".
    pub fn is_empty_like(&self) -> bool {
        match self {
            RawValue::Null => true,
            RawValue::Text(text) => text.is_empty() || text == "undefined" || text == "[]",
            RawValue::List(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Host-side truthiness: empty text, zero and `false` count as absent.
    pub fn is_truthy(&self) -> bool {
        match self {
            RawValue::Null => false,
            RawValue::Bool(flag) => *flag,
            RawValue::Number(number) => *number != 0.0 && !number.is_nan(),
            RawValue::Text(text) => !text.is_empty(),
            RawValue::List(_) | RawValue::Map(_) => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RawValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&RawValue> {
        match self {
            RawValue::Map(map) => map.get(key),
            _ => None,
        }
    }

    /// Plain-text rendering used whenever a formatter falls back to the raw value.
    pub fn to_text(&self) -> String {
        match self {
            RawValue::Null => String::new(),
            RawValue::Bool(flag) => flag.to_string(),
            RawValue::Number(number) => format_number(*number),
            RawValue::Text(text) => text.clone(),
            RawValue::List(_) | RawValue::Map(_) => self.to_json().to_string(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            RawValue::Null => Value::Null,
            RawValue::Bool(flag) => Value::Bool(*flag),
            RawValue::Number(number) => json_number(*number),
            RawValue::Text(text) => Value::String(text.clone()),
            RawValue::List(items) => Value::Array(items.iter().map(RawValue::to_json).collect()),
            RawValue::Map(map) => Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for RawValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => RawValue::Null,
            Value::Bool(flag) => RawValue::Bool(flag),
            Value::Number(number) => match number.as_f64() {
                Some(float) => RawValue::Number(float),
                None => RawValue::Text(number.to_string()),
            },
            Value::String(text) => RawValue::Text(text),
            Value::Array(items) => RawValue::List(items.into_iter().map(RawValue::from).collect()),
            Value::Object(map) => RawValue::Map(
                map.into_iter()
                    .map(|(key, value)| (key, RawValue::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

fn json_number(number: f64) -> Value {
    if number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
        return Value::Number((number as i64).into());
    }
    serde_json::Number::from_f64(number)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

const EXPONENT_LOWER: f64 = 1e-6;
const EXPONENT_UPPER: f64 = 1e21;

/// Shortest decimal form: `3.50` renders as `3.5`, `3.00` as `3`. Magnitudes
/// of `1e21` and above or below `1e-6` switch to exponent form (`1e+21`, `1.5e-7`).
pub fn format_number(number: f64) -> String {
    if number == 0.0 {
        return "0".to_string();
    }
    if number.is_nan() {
        return "NaN".to_string();
    }
    if number.is_infinite() {
        return if number > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let magnitude = number.abs();
    if !(EXPONENT_LOWER..EXPONENT_UPPER).contains(&magnitude) {
        let formatted = format!("{number:e}");
        return match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{mantissa}e+{exponent}")
            }
            _ => formatted,
        };
    }
    format!("{number}")
}
