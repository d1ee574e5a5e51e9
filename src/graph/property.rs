//! Typed property values carried by fragment records

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::fragment::FragmentError;

/// A property value on a vertex or edge record.
///
/// The graph store cannot hold nested collections, so a value is either a
/// single scalar or a flat ordered list of scalars. Numbers and booleans
/// arriving on the wire are carried in their textual form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Scalar(String),
    ScalarList(Vec<String>),
}

/// Properties collection, ordered by key
pub type Properties = BTreeMap<String, PropertyValue>;

impl PropertyValue {
    /// Convert a wire (JSON) value into a property value.
    ///
    /// Returns `Ok(None)` for `null`, which is skipped rather than stored.
    /// Objects, and arrays containing anything but scalars, are rejected.
    pub fn from_json(key: &str, value: &Value) -> Result<Option<Self>, FragmentError> {
        match value {
            Value::Null => Ok(None),
            Value::Array(items) => {
                let mut list = Vec::with_capacity(items.len());
                for item in items {
                    match scalar_text(item) {
                        Some(text) => list.push(text),
                        None => return Err(FragmentError::NestedValue(key.to_string())),
                    }
                }
                Ok(Some(Self::ScalarList(list)))
            }
            Value::Object(_) => Err(FragmentError::NestedValue(key.to_string())),
            scalar => Ok(scalar_text(scalar).map(Self::Scalar)),
        }
    }

    /// The scalar text, if this is a scalar
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => Some(s),
            Self::ScalarList(_) => None,
        }
    }

    /// The list items, if this is a list
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::Scalar(_) => None,
            Self::ScalarList(items) => Some(items),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::Scalar(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::Scalar(s)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(items: Vec<String>) -> Self {
        Self::ScalarList(items)
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
