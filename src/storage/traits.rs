//! Storage trait definitions

use crate::graph::{Edge, EdgeId, ElementKind, StoredValue, Vertex, VertexId};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Vertex not found: {0}")]
    VertexNotFound(VertexId),

    #[error("Edge not found: {0}")]
    EdgeNotFound(EdgeId),

    #[error("Index '{name}' holds {existing} elements, not {requested}")]
    IndexKindMismatch {
        name: String,
        existing: String,
        requested: &'static str,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParse(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A named secondary index over vertices or edges
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHandle {
    pub name: String,
    pub kind: ElementKind,
}

/// Trait for graph storage backends
///
/// The store owns element identity. Logical identity (vertex names, edge
/// ids) lives in secondary indexes that callers keep in sync with every
/// create. Implementations must serialize concurrent access themselves.
pub trait GraphStore: Send + Sync {
    // === Element Operations ===

    /// Create an empty vertex, recording the key it was created under
    fn create_vertex(&self, key: &str) -> StorageResult<VertexId>;

    /// Create an edge between two existing vertices
    fn create_edge(&self, label: &str, source: VertexId, target: VertexId) -> StorageResult<EdgeId>;

    /// Create a vertex with its first properties and index it under `key`.
    ///
    /// All three writes happen atomically: on error nothing is stored.
    fn create_indexed_vertex(
        &self,
        index: &IndexHandle,
        key: &str,
        properties: &[(String, StoredValue)],
    ) -> StorageResult<VertexId>;

    /// Create an edge with its properties and index it under `key`, atomically.
    fn create_indexed_edge(
        &self,
        index: &IndexHandle,
        key: &str,
        label: &str,
        source: VertexId,
        target: VertexId,
        properties: &[(String, StoredValue)],
    ) -> StorageResult<EdgeId>;

    /// Write properties onto a vertex, replacing values under the same keys
    fn set_vertex_properties(&self, id: VertexId, properties: &[(String, StoredValue)]) -> StorageResult<()>;

    /// Write properties onto an edge, replacing values under the same keys
    fn set_edge_properties(&self, id: EdgeId, properties: &[(String, StoredValue)]) -> StorageResult<()>;

    fn load_vertex(&self, id: VertexId) -> StorageResult<Option<Vertex>>;

    fn load_edge(&self, id: EdgeId) -> StorageResult<Option<Edge>>;

    fn vertex_count(&self) -> StorageResult<usize>;

    fn edge_count(&self) -> StorageResult<usize>;

    // === Index Operations ===

    /// Open the named index, creating it on first use
    fn get_or_create_index(&self, name: &str, kind: ElementKind) -> StorageResult<IndexHandle>;

    /// Look up the raw element id stored under a key
    fn index_get(&self, index: &IndexHandle, key: &str) -> StorageResult<Option<i64>>;

    /// Map a key to a raw element id, replacing any previous entry
    fn index_put(&self, index: &IndexHandle, key: &str, element: i64) -> StorageResult<()>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: GraphStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
