//! Core graph data structures and the merge engine

mod element;
mod fragment;
mod loader;
mod property;

#[cfg(test)]
mod tests;

pub use element::{Edge, EdgeId, ElementKind, StoredProperties, StoredValue, Vertex, VertexId};
pub use fragment::{
    EdgeRecord, FragmentError, GraphFragment, VertexRecord, WireFragment, ID_KEY, IN_KEY,
    LABEL_KEY, NAME_KEY, OUT_KEY,
};
pub use loader::{
    EdgeUpsert, GraphMergeEngine, LoadReport, MergeError, Rejection, VertexUpsert, EDGE_INDEX,
    VERTEX_INDEX,
};
pub use property::{Properties, PropertyValue};
