//! Graph fragments: the unit of graph delta produced per ingested record
//!
//! A fragment is an ordered list of vertex records followed by an ordered
//! list of edge records. Records reference each other by logical key (vertex
//! name, edge id), never by storage identity.
//!
//! On the wire a fragment is a JSON document:
//!
//! ```json
//! {
//!   "vertices": [ { "name": "CVE-2014-0001", "vertexType": "vulnerability" } ],
//!   "edges": [ { "_id": "a_runs_b", "_outV": "a", "_inV": "b", "_label": "runs" } ]
//! }
//! ```
//!
//! `edges` is optional. Vertex `name` falls back to `_id`. Every other vertex
//! key is a property. Edge `_outV`, `_inV` and `_label` become structure.

use super::property::{Properties, PropertyValue};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;

pub const NAME_KEY: &str = "name";
pub const ID_KEY: &str = "_id";
pub const OUT_KEY: &str = "_outV";
pub const IN_KEY: &str = "_inV";
pub const LABEL_KEY: &str = "_label";

/// Errors converting wire records into typed records
#[derive(Debug, Error)]
pub enum FragmentError {
    #[error("missing required key '{0}'")]
    MissingKey(&'static str),

    #[error("property '{0}' holds a nested value")]
    NestedValue(String),

    #[error("record is not a JSON object")]
    NotAnObject,

    #[error("invalid fragment document: {0}")]
    Json(#[from] serde_json::Error),
}

/// A vertex as described by a fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexRecord {
    /// Logical name, the dedup key
    pub name: String,
    pub properties: Properties,
}

impl VertexRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Properties::new(),
        }
    }

    /// A vertex carrying nothing but its logical name, created to satisfy an
    /// edge endpoint before the real record arrives.
    pub fn placeholder(name: impl Into<String>) -> Self {
        Self::new(name)
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Set a property, ignoring empty scalar text
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        let value = value.into();
        if value.as_scalar().is_some_and(str::is_empty) {
            return;
        }
        self.properties.insert(key.into(), value);
    }

    /// Build a record from a wire object.
    ///
    /// The logical name is `name`; if that is absent or empty, `_id` is
    /// promoted to the name. A wire `_id` is also kept as a property.
    pub fn from_wire(object: &Map<String, Value>) -> Result<Self, FragmentError> {
        let name = key_text(object, NAME_KEY)
            .or_else(|| key_text(object, ID_KEY))
            .ok_or(FragmentError::MissingKey(NAME_KEY))?;

        let mut record = Self::new(name.clone());
        for (key, value) in object {
            if let Some(v) = PropertyValue::from_json(key, value)? {
                record.properties.insert(key.clone(), v);
            }
        }
        record
            .properties
            .insert(NAME_KEY.to_string(), PropertyValue::Scalar(name));
        Ok(record)
    }

    pub fn to_wire(&self) -> Map<String, Value> {
        let mut object = properties_to_wire(&self.properties);
        object.insert(NAME_KEY.to_string(), Value::String(self.name.clone()));
        object
    }
}

/// An edge as described by a fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRecord {
    /// Logical id, the dedup key
    pub id: String,
    /// Logical name of the source vertex (`_outV`)
    pub source: String,
    /// Logical name of the target vertex (`_inV`)
    pub target: String,
    pub label: String,
    pub properties: Properties,
}

impl EdgeRecord {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            label: label.into(),
            properties: Properties::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn from_wire(object: &Map<String, Value>) -> Result<Self, FragmentError> {
        let id = key_text(object, ID_KEY).ok_or(FragmentError::MissingKey(ID_KEY))?;
        let source = key_text(object, OUT_KEY).ok_or(FragmentError::MissingKey(OUT_KEY))?;
        let target = key_text(object, IN_KEY).ok_or(FragmentError::MissingKey(IN_KEY))?;
        let label = key_text(object, LABEL_KEY).ok_or(FragmentError::MissingKey(LABEL_KEY))?;

        let mut record = Self::new(id, source, target, label);
        for (key, value) in object {
            if matches!(key.as_str(), ID_KEY | OUT_KEY | IN_KEY | LABEL_KEY) {
                continue;
            }
            if let Some(v) = PropertyValue::from_json(key, value)? {
                record.properties.insert(key.clone(), v);
            }
        }
        Ok(record)
    }

    pub fn to_wire(&self) -> Map<String, Value> {
        let mut object = properties_to_wire(&self.properties);
        object.insert(ID_KEY.to_string(), Value::String(self.id.clone()));
        object.insert(OUT_KEY.to_string(), Value::String(self.source.clone()));
        object.insert(IN_KEY.to_string(), Value::String(self.target.clone()));
        object.insert(LABEL_KEY.to_string(), Value::String(self.label.clone()));
        object
    }
}

/// A self-contained graph delta produced from one input record.
///
/// Build it through `add_vertex` and `add_edge`, which keep a key → position
/// map so that deduplication stays constant-time on large dumps.
#[derive(Debug, Clone, Default)]
pub struct GraphFragment {
    pub vertices: Vec<VertexRecord>,
    pub edges: Vec<EdgeRecord>,
    vertex_positions: HashMap<String, usize>,
    edge_positions: HashMap<String, usize>,
}

impl PartialEq for GraphFragment {
    fn eq(&self, other: &Self) -> bool {
        self.vertices == other.vertices && self.edges == other.edges
    }
}

impl Eq for GraphFragment {}

impl GraphFragment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex. A vertex already present in this fragment under the same
    /// name absorbs the new record's properties instead of being duplicated.
    pub fn add_vertex(&mut self, vertex: VertexRecord) {
        let position = self
            .vertex_positions
            .get(&vertex.name)
            .copied()
            .filter(|&i| self.vertices.get(i).is_some_and(|v| v.name == vertex.name));
        match position {
            Some(i) => self.vertices[i].properties.extend(vertex.properties),
            None => {
                self.vertex_positions.insert(vertex.name.clone(), self.vertices.len());
                self.vertices.push(vertex);
            }
        }
    }

    /// Add an edge unless one with the same logical id is already present.
    pub fn add_edge(&mut self, edge: EdgeRecord) {
        let present = self
            .edge_positions
            .get(&edge.id)
            .is_some_and(|&i| self.edges.get(i).is_some_and(|e| e.id == edge.id));
        if !present {
            self.edge_positions.insert(edge.id.clone(), self.edges.len());
            self.edges.push(edge);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.edges.is_empty()
    }

    pub fn to_wire(&self) -> WireFragment {
        WireFragment {
            vertices: self.vertices.iter().map(|v| Value::Object(v.to_wire())).collect(),
            edges: Some(self.edges.iter().map(|e| Value::Object(e.to_wire())).collect()),
        }
    }

    pub fn to_json(&self) -> Result<String, FragmentError> {
        Ok(serde_json::to_string(&self.to_wire())?)
    }
}

impl Serialize for GraphFragment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

/// The raw wire form of a fragment.
///
/// Items are kept as untyped JSON so that one malformed record can be
/// rejected on its own while its siblings are still merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WireFragment {
    pub vertices: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edges: Option<Vec<Value>>,
}

impl WireFragment {
    pub fn from_json(json: &str) -> Result<Self, FragmentError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Read a key as non-empty text. Numeric ids are accepted.
fn key_text(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn properties_to_wire(properties: &Properties) -> Map<String, Value> {
    properties
        .iter()
        .map(|(k, v)| {
            let value = match v {
                PropertyValue::Scalar(s) => Value::String(s.clone()),
                PropertyValue::ScalarList(items) => {
                    Value::Array(items.iter().cloned().map(Value::String).collect())
                }
            };
            (k.clone(), value)
        })
        .collect()
}
