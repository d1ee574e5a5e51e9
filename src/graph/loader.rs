//! GraphMergeEngine: upserts fragments into the persistent graph
//!
//! Deduplication works through two secondary indexes. Each create writes the
//! element, its properties and its index entry in one store operation:
//! - `vertex_name`: logical vertex name → vertex
//! - `edge_id`: logical edge id → edge
//!
//! Vertices are upserted (properties in the newest record win). Edges are
//! create-once: a logical id that is already indexed is left as it is.
//! Missing edge endpoints are filled with placeholder vertices that later
//! records update in place.

use super::element::{EdgeId, ElementKind, StoredValue, Vertex, VertexId};
use super::fragment::{
    EdgeRecord, FragmentError, GraphFragment, VertexRecord, WireFragment, ID_KEY, IN_KEY, LABEL_KEY,
    NAME_KEY, OUT_KEY,
};
use super::element::Edge;
use super::property::{Properties, PropertyValue};
use crate::storage::{GraphStore, IndexHandle, StorageError, StorageResult};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Name of the vertex index (logical name → vertex)
pub const VERTEX_INDEX: &str = "vertex_name";
/// Name of the edge index (logical id → edge)
pub const EDGE_INDEX: &str = "edge_id";

/// Why a single fragment item could not be merged.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("missing required key '{0}'")]
    MissingKey(&'static str),

    #[error(transparent)]
    Fragment(#[from] FragmentError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// A single item skipped during a load.
#[derive(Debug)]
pub struct Rejection {
    /// Human-readable description of what was rejected
    pub description: String,
    /// Why it was rejected
    pub reason: MergeError,
}

impl Rejection {
    pub fn new(description: impl Into<String>, reason: MergeError) -> Self {
        Self {
            description: description.into(),
            reason,
        }
    }
}

/// What a `load()` call did.
///
/// Partial success is the normal case: valid items commit even when some
/// items are rejected.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Vertex records merged (created or updated)
    pub vertices_merged: usize,
    /// Of those, how many were new
    pub vertices_created: usize,
    /// Edges created by this load
    pub edges_created: usize,
    /// Edge records whose logical id already existed (left unchanged)
    pub edges_existing: usize,
    /// Placeholder vertices synthesized for missing endpoints
    pub placeholders_created: usize,
    /// Items that were skipped, with reasons
    pub rejections: Vec<Rejection>,
}

impl LoadReport {
    /// True if no items were rejected
    pub fn is_fully_merged(&self) -> bool {
        self.rejections.is_empty()
    }
}

/// Result of upserting a vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexUpsert {
    pub id: VertexId,
    pub created: bool,
}

/// Result of upserting an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeUpsert {
    pub id: EdgeId,
    pub created: bool,
    pub placeholders: usize,
}

/// Merges graph fragments into a `GraphStore`.
pub struct GraphMergeEngine {
    store: Arc<dyn GraphStore>,
    vertex_index: IndexHandle,
    edge_index: IndexHandle,
}

impl GraphMergeEngine {
    /// Bind to a store, opening (or creating) both indexes.
    pub fn new(store: Arc<dyn GraphStore>) -> StorageResult<Self> {
        let vertex_index = store.get_or_create_index(VERTEX_INDEX, ElementKind::Vertex)?;
        let edge_index = store.get_or_create_index(EDGE_INDEX, ElementKind::Edge)?;
        Ok(Self {
            store,
            vertex_index,
            edge_index,
        })
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    /// Create or update a vertex by logical name.
    ///
    /// Every property in the record is written onto the vertex, replacing the
    /// stored value under the same key. Re-upserting identical data is a no-op
    /// apart from the update timestamp.
    pub fn upsert_vertex(&self, record: &VertexRecord) -> Result<VertexUpsert, MergeError> {
        if record.name.is_empty() {
            return Err(MergeError::MissingKey(NAME_KEY));
        }

        // The stored name always matches the index key
        let mut properties = encode_properties(&record.properties);
        properties.retain(|(key, _)| key != NAME_KEY);
        properties.push((NAME_KEY.to_string(), StoredValue::Text(record.name.clone())));

        let (id, created) = match self.lookup_vertex(&record.name)? {
            Some(id) => {
                debug!(vertex = %record.name, %id, "updating vertex");
                self.store.set_vertex_properties(id, &properties)?;
                (id, false)
            }
            None => {
                let id = self
                    .store
                    .create_indexed_vertex(&self.vertex_index, &record.name, &properties)?;
                info!(vertex = %record.name, %id, "adding vertex");
                (id, true)
            }
        };

        Ok(VertexUpsert { id, created })
    }

    /// Create an edge by logical id, unless it already exists.
    ///
    /// An existing edge is returned untouched, even if the record carries
    /// different properties. Endpoints not yet in the graph are created as
    /// placeholder vertices.
    pub fn upsert_edge(&self, record: &EdgeRecord) -> Result<EdgeUpsert, MergeError> {
        if record.id.is_empty() {
            return Err(MergeError::MissingKey(ID_KEY));
        }
        if record.source.is_empty() {
            return Err(MergeError::MissingKey(OUT_KEY));
        }
        if record.target.is_empty() {
            return Err(MergeError::MissingKey(IN_KEY));
        }
        if record.label.is_empty() {
            return Err(MergeError::MissingKey(LABEL_KEY));
        }

        if let Some(id) = self.lookup_edge(&record.id)? {
            debug!(edge = %record.id, %id, "edge already present, not updating");
            return Ok(EdgeUpsert {
                id,
                created: false,
                placeholders: 0,
            });
        }

        let mut placeholders = 0;
        let source = self.resolve_endpoint(&record.source, &mut placeholders)?;
        let target = self.resolve_endpoint(&record.target, &mut placeholders)?;

        let mut properties = encode_properties(&record.properties);
        properties.retain(|(key, _)| key != ID_KEY);
        properties.push((ID_KEY.to_string(), StoredValue::Text(record.id.clone())));
        let id = self.store.create_indexed_edge(
            &self.edge_index,
            &record.id,
            &record.label,
            source,
            target,
            &properties,
        )?;
        info!(edge = %record.id, label = %record.label, %id, "adding edge");

        Ok(EdgeUpsert {
            id,
            created: true,
            placeholders,
        })
    }

    /// Merge a fragment: all vertices first, then all edges.
    ///
    /// Items are merged independently. A failing item is recorded in the
    /// report and logged; the remaining items are still merged.
    pub fn load(&self, fragment: &GraphFragment) -> LoadReport {
        let mut report = LoadReport::default();

        for vertex in &fragment.vertices {
            let outcome = self.upsert_vertex(vertex);
            self.record_vertex(&mut report, format!("vertex {}", vertex.name), outcome);
        }

        for edge in &fragment.edges {
            let outcome = self.upsert_edge(edge);
            self.record_edge(
                &mut report,
                format!("edge {} ({}→{})", edge.id, edge.source, edge.target),
                outcome,
            );
        }

        report
    }

    /// Merge a fragment in its raw wire form.
    ///
    /// Conversion failures (missing keys, nested property values, non-object
    /// items) reject only the offending item.
    pub fn load_wire(&self, fragment: &WireFragment) -> LoadReport {
        let mut report = LoadReport::default();

        for (position, item) in fragment.vertices.iter().enumerate() {
            let outcome = as_object(item)
                .and_then(VertexRecord::from_wire)
                .map_err(MergeError::from)
                .and_then(|record| self.upsert_vertex(&record));
            self.record_vertex(&mut report, describe("vertex", position, item), outcome);
        }

        for (position, item) in fragment.edges.iter().flatten().enumerate() {
            let outcome = as_object(item)
                .and_then(EdgeRecord::from_wire)
                .map_err(MergeError::from)
                .and_then(|record| self.upsert_edge(&record));
            self.record_edge(&mut report, describe("edge", position, item), outcome);
        }

        report
    }

    /// Look up a vertex by logical name
    pub fn find_vertex(&self, name: &str) -> StorageResult<Option<Vertex>> {
        match self.lookup_vertex(name)? {
            Some(id) => self.store.load_vertex(id),
            None => Ok(None),
        }
    }

    /// Look up an edge by logical id
    pub fn find_edge(&self, id: &str) -> StorageResult<Option<Edge>> {
        match self.lookup_edge(id)? {
            Some(id) => self.store.load_edge(id),
            None => Ok(None),
        }
    }

    pub fn vertex_count(&self) -> StorageResult<usize> {
        self.store.vertex_count()
    }

    pub fn edge_count(&self) -> StorageResult<usize> {
        self.store.edge_count()
    }

    fn lookup_vertex(&self, name: &str) -> StorageResult<Option<VertexId>> {
        Ok(self
            .store
            .index_get(&self.vertex_index, name)?
            .map(VertexId::from_raw))
    }

    fn lookup_edge(&self, id: &str) -> StorageResult<Option<EdgeId>> {
        Ok(self.store.index_get(&self.edge_index, id)?.map(EdgeId::from_raw))
    }

    fn resolve_endpoint(&self, name: &str, placeholders: &mut usize) -> Result<VertexId, MergeError> {
        if let Some(id) = self.lookup_vertex(name)? {
            return Ok(id);
        }
        info!(vertex = %name, "endpoint not found, creating placeholder vertex");
        let upsert = self.upsert_vertex(&VertexRecord::placeholder(name))?;
        *placeholders += 1;
        Ok(upsert.id)
    }

    fn record_vertex(
        &self,
        report: &mut LoadReport,
        description: String,
        outcome: Result<VertexUpsert, MergeError>,
    ) {
        match outcome {
            Ok(upsert) => {
                report.vertices_merged += 1;
                if upsert.created {
                    report.vertices_created += 1;
                }
            }
            Err(reason) => {
                warn!(item = %description, error = %reason, "skipping vertex");
                report.rejections.push(Rejection::new(description, reason));
            }
        }
    }

    fn record_edge(
        &self,
        report: &mut LoadReport,
        description: String,
        outcome: Result<EdgeUpsert, MergeError>,
    ) {
        match outcome {
            Ok(upsert) if upsert.created => {
                report.edges_created += 1;
                report.placeholders_created += upsert.placeholders;
            }
            Ok(_) => report.edges_existing += 1,
            Err(reason) => {
                warn!(item = %description, error = %reason, "skipping edge");
                report.rejections.push(Rejection::new(description, reason));
            }
        }
    }
}

/// The property encoding rule shared by vertex and edge upserts.
fn encode(value: &PropertyValue) -> StoredValue {
    match value {
        PropertyValue::Scalar(text) => StoredValue::Text(text.clone()),
        PropertyValue::ScalarList(items) => StoredValue::TextArray(items.clone()),
    }
}

fn encode_properties(properties: &Properties) -> Vec<(String, StoredValue)> {
    properties
        .iter()
        .map(|(key, value)| (key.clone(), encode(value)))
        .collect()
}

fn as_object(item: &Value) -> Result<&serde_json::Map<String, Value>, FragmentError> {
    item.as_object().ok_or(FragmentError::NotAnObject)
}

fn describe(kind: &str, position: usize, item: &Value) -> String {
    format!("{} #{}: {}", kind, position, item)
}
