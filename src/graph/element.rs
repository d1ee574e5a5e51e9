//! Persisted graph elements

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Storage-assigned identity of a vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VertexId(i64);

impl VertexId {
    pub fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    pub fn as_raw(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for VertexId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v[{}]", self.0)
    }
}

/// Storage-assigned identity of an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(i64);

impl EdgeId {
    pub fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    pub fn as_raw(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "e[{}]", self.0)
    }
}

/// Which kind of element an index maps keys to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Vertex,
    Edge,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Edge => "edge",
        }
    }
}

/// The store's native property representation.
///
/// Ordered text arrays are a distinct storage type; a nested collection is
/// not representable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    Text(String),
    TextArray(Vec<String>),
}

impl StoredValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::TextArray(_) => None,
        }
    }
}

/// Stored properties collection
pub type StoredProperties = BTreeMap<String, StoredValue>;

/// A vertex as held by the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vertex {
    pub id: VertexId,
    /// Key the vertex was created under
    pub key: String,
    pub properties: StoredProperties,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vertex {
    pub fn property(&self, key: &str) -> Option<&StoredValue> {
        self.properties.get(key)
    }
}

/// An edge as held by the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub label: String,
    pub source: VertexId,
    pub target: VertexId,
    pub properties: StoredProperties,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Edge {
    pub fn property(&self, key: &str) -> Option<&StoredValue> {
        self.properties.get(key)
    }
}
