//! Typed property values.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A single configuration value.
///
/// Values are totally ordered and hashable so that fingerprints over a store
/// are deterministic. Floating point values are deliberately not representable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<PropertyValue>),
    Set(BTreeSet<PropertyValue>),
    Map(BTreeMap<String, PropertyValue>),
}

impl PropertyValue {
    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Scalar rendering; collections yield `None`.
    pub fn scalar_string(&self) -> Option<String> {
        match self {
            Self::Bool(value) => Some(value.to_string()),
            Self::Int(value) => Some(value.to_string()),
            Self::Str(value) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Bool(value) => JsonValue::Bool(*value),
            Self::Int(value) => JsonValue::from(*value),
            Self::Str(value) => JsonValue::String(value.clone()),
            Self::List(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
            Self::Set(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(entries) => JsonValue::Object(
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        Self::Int(value.into())
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl<T: Into<PropertyValue>> From<Vec<T>> for PropertyValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl From<BTreeSet<String>> for PropertyValue {
    fn from(values: BTreeSet<String>) -> Self {
        Self::Set(values.into_iter().map(Self::Str).collect())
    }
}

impl From<BTreeMap<String, PropertyValue>> for PropertyValue {
    fn from(entries: BTreeMap<String, PropertyValue>) -> Self {
        Self::Map(entries)
    }
}

/// Lenient conversion out of a stored value.
///
/// Scalars stored as strings convert to booleans and integers, and a
/// comma-delimited string converts to a list of strings.
pub trait FromPropertyValue: Sized {
    const EXPECTED: &'static str;

    fn from_property(value: &PropertyValue) -> Option<Self>;
}

impl FromPropertyValue for PropertyValue {
    const EXPECTED: &'static str = "any value";

    fn from_property(value: &PropertyValue) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromPropertyValue for bool {
    const EXPECTED: &'static str = "bool";

    fn from_property(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Bool(value) => Some(*value),
            PropertyValue::Str(text) => match text.trim() {
                t if t.eq_ignore_ascii_case("true") => Some(true),
                t if t.eq_ignore_ascii_case("false") => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

impl FromPropertyValue for i64 {
    const EXPECTED: &'static str = "int";

    fn from_property(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Int(value) => Some(*value),
            PropertyValue::Str(text) => text.trim().parse().ok(),
            _ => None,
        }
    }
}

impl FromPropertyValue for u32 {
    const EXPECTED: &'static str = "non-negative int";

    fn from_property(value: &PropertyValue) -> Option<Self> {
        i64::from_property(value).and_then(|value| u32::try_from(value).ok())
    }
}

impl FromPropertyValue for usize {
    const EXPECTED: &'static str = "non-negative int";

    fn from_property(value: &PropertyValue) -> Option<Self> {
        i64::from_property(value).and_then(|value| usize::try_from(value).ok())
    }
}

impl FromPropertyValue for String {
    const EXPECTED: &'static str = "string";

    fn from_property(value: &PropertyValue) -> Option<Self> {
        value.scalar_string()
    }
}

impl FromPropertyValue for Vec<String> {
    const EXPECTED: &'static str = "list of strings";

    fn from_property(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::List(items) => items.iter().map(PropertyValue::scalar_string).collect(),
            PropertyValue::Set(items) => items.iter().map(PropertyValue::scalar_string).collect(),
            PropertyValue::Str(text) => Some(split_delimited(text)),
            _ => None,
        }
    }
}

impl FromPropertyValue for BTreeSet<String> {
    const EXPECTED: &'static str = "set of strings";

    fn from_property(value: &PropertyValue) -> Option<Self> {
        Vec::<String>::from_property(value).map(|items| items.into_iter().collect())
    }
}

fn split_delimited(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
