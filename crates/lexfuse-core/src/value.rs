//! Typed canonical values and their encoded surface forms.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A North-American style phone number, stored structurally so every surface
/// encoding renders from the same digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phone {
    pub area: u16,
    pub exchange: u16,
    pub line: u16,
}

/// A canonical attribute value. Created once by the model builder, never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Str(String),
    Number(f64),
    Date(NaiveDate),
    Currency(f64),
    Phone(Phone),
    /// Explicit missing marker. Distinct from an unparseable value.
    Missing,
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }
}

/// An already-encoded surface value, ready for a format adapter.
///
/// Serializers write these verbatim: text stays text, integers stay integers
/// (a unix epoch can legitimately be a bare JSON number), nothing is
/// re-normalized downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EncodedValue {
    Text(String),
    Int(i64),
    Float(f64),
    Missing,
}

impl EncodedValue {
    /// Flat string rendering for CSV cells, XML text, and narrative lines.
    /// Missing renders as the empty string (the tabular missing marker).
    pub fn render(&self) -> String {
        match self {
            EncodedValue::Text(s) => s.clone(),
            EncodedValue::Int(n) => n.to_string(),
            EncodedValue::Float(f) => f.to_string(),
            EncodedValue::Missing => String::new(),
        }
    }
}

/// Value categories the diversifier knows how to encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueCategory {
    /// Canonical IDs and structured foreign keys. Always verbatim.
    Id,
    /// Free text (names, titles, descriptions).
    Text,
    /// Closed-vocabulary labels (industry, practice area).
    Label,
    Date,
    Currency,
    Phone,
    /// Plain numerics (hours, rates) rendered as-is.
    Number,
}

impl ValueCategory {
    pub fn name(&self) -> &'static str {
        match self {
            ValueCategory::Id => "id",
            ValueCategory::Text => "text",
            ValueCategory::Label => "label",
            ValueCategory::Date => "date",
            ValueCategory::Currency => "currency",
            ValueCategory::Phone => "phone",
            ValueCategory::Number => "number",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_missing_is_empty() {
        assert_eq!(EncodedValue::Missing.render(), "");
    }

    #[test]
    fn render_numbers_without_decoration() {
        assert_eq!(EncodedValue::Int(1_664_000_000).render(), "1664000000");
        assert_eq!(EncodedValue::Float(3.5).render(), "3.5");
        assert_eq!(EncodedValue::Float(300.0).render(), "300");
    }
}
