//! Merge engine scenarios against an in-memory store

use super::*;
use crate::storage::{GraphStore, IndexHandle, OpenStore, SqliteStore, StorageResult};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn engine() -> GraphMergeEngine {
    let store: Arc<dyn GraphStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    GraphMergeEngine::new(store).unwrap()
}

fn text<'a>(vertex: &'a Vertex, key: &str) -> Option<&'a str> {
    vertex.property(key).and_then(StoredValue::as_text)
}

fn wire(value: serde_json::Value) -> WireFragment {
    serde_json::from_value(value).unwrap()
}

/// Store whose next indexed create is pointed at an unregistered index, so
/// the element insert succeeds and the index write fails inside the same
/// transaction.
struct FlakyStore {
    inner: SqliteStore,
    fail_next_create: AtomicBool,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: SqliteStore::open_in_memory().unwrap(),
            fail_next_create: AtomicBool::new(false),
        }
    }

    fn index_for(&self, index: &IndexHandle) -> IndexHandle {
        if self.fail_next_create.swap(false, Ordering::SeqCst) {
            IndexHandle {
                name: "unregistered".into(),
                kind: index.kind,
            }
        } else {
            index.clone()
        }
    }
}

impl GraphStore for FlakyStore {
    fn create_vertex(&self, key: &str) -> StorageResult<VertexId> {
        self.inner.create_vertex(key)
    }

    fn create_edge(&self, label: &str, source: VertexId, target: VertexId) -> StorageResult<EdgeId> {
        self.inner.create_edge(label, source, target)
    }

    fn create_indexed_vertex(
        &self,
        index: &IndexHandle,
        key: &str,
        properties: &[(String, StoredValue)],
    ) -> StorageResult<VertexId> {
        self.inner.create_indexed_vertex(&self.index_for(index), key, properties)
    }

    fn create_indexed_edge(
        &self,
        index: &IndexHandle,
        key: &str,
        label: &str,
        source: VertexId,
        target: VertexId,
        properties: &[(String, StoredValue)],
    ) -> StorageResult<EdgeId> {
        self.inner
            .create_indexed_edge(&self.index_for(index), key, label, source, target, properties)
    }

    fn set_vertex_properties(&self, id: VertexId, properties: &[(String, StoredValue)]) -> StorageResult<()> {
        self.inner.set_vertex_properties(id, properties)
    }

    fn set_edge_properties(&self, id: EdgeId, properties: &[(String, StoredValue)]) -> StorageResult<()> {
        self.inner.set_edge_properties(id, properties)
    }

    fn load_vertex(&self, id: VertexId) -> StorageResult<Option<Vertex>> {
        self.inner.load_vertex(id)
    }

    fn load_edge(&self, id: EdgeId) -> StorageResult<Option<Edge>> {
        self.inner.load_edge(id)
    }

    fn vertex_count(&self) -> StorageResult<usize> {
        self.inner.vertex_count()
    }

    fn edge_count(&self) -> StorageResult<usize> {
        self.inner.edge_count()
    }

    fn get_or_create_index(&self, name: &str, kind: ElementKind) -> StorageResult<IndexHandle> {
        self.inner.get_or_create_index(name, kind)
    }

    fn index_get(&self, index: &IndexHandle, key: &str) -> StorageResult<Option<i64>> {
        self.inner.index_get(index, key)
    }

    fn index_put(&self, index: &IndexHandle, key: &str, element: i64) -> StorageResult<()> {
        self.inner.index_put(index, key, element)
    }
}

// ---------------------------------------------------------------------------
// Vertices
// ---------------------------------------------------------------------------

#[test]
fn second_vertex_record_overwrites_first() {
    let engine = engine();

    let first = engine
        .upsert_vertex(&VertexRecord::new("cve-2014-0001").with_property("severity", "high"))
        .unwrap();
    let second = engine
        .upsert_vertex(&VertexRecord::new("cve-2014-0001").with_property("severity", "critical"))
        .unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.id, second.id);
    assert_eq!(engine.vertex_count().unwrap(), 1);

    let vertex = engine.find_vertex("cve-2014-0001").unwrap().unwrap();
    assert_eq!(text(&vertex, "severity"), Some("critical"));
    assert_eq!(text(&vertex, "name"), Some("cve-2014-0001"));
}

#[test]
fn upsert_keeps_keys_absent_from_later_record() {
    let engine = engine();
    engine
        .upsert_vertex(
            &VertexRecord::new("10.0.0.1")
                .with_property("vertexType", "IP")
                .with_property("source", "argus"),
        )
        .unwrap();
    engine
        .upsert_vertex(&VertexRecord::new("10.0.0.1").with_property("source", "hone"))
        .unwrap();

    let vertex = engine.find_vertex("10.0.0.1").unwrap().unwrap();
    assert_eq!(text(&vertex, "vertexType"), Some("IP"));
    assert_eq!(text(&vertex, "source"), Some("hone"));
}

#[test]
fn identical_upsert_is_idempotent() {
    let engine = engine();
    let record = VertexRecord::new("host-a")
        .with_property("vertexType", "host")
        .with_property("aliases", vec!["a".to_string(), "b".to_string()]);

    engine.upsert_vertex(&record).unwrap();
    let before = engine.find_vertex("host-a").unwrap().unwrap();
    engine.upsert_vertex(&record).unwrap();
    let after = engine.find_vertex("host-a").unwrap().unwrap();

    assert_eq!(before.id, after.id);
    assert_eq!(before.properties, after.properties);
    assert_eq!(engine.vertex_count().unwrap(), 1);
}

#[test]
fn list_properties_are_stored_as_arrays() {
    let engine = engine();
    engine
        .upsert_vertex(
            &VertexRecord::new("malware-x")
                .with_property("aliases", vec!["W32/X".to_string(), "Troj/X".to_string()]),
        )
        .unwrap();

    let vertex = engine.find_vertex("malware-x").unwrap().unwrap();
    assert_eq!(
        vertex.property("aliases"),
        Some(&StoredValue::TextArray(vec!["W32/X".into(), "Troj/X".into()]))
    );
}

#[test]
fn empty_vertex_name_is_rejected() {
    let engine = engine();
    let err = engine.upsert_vertex(&VertexRecord::new("")).unwrap_err();
    assert!(matches!(err, MergeError::MissingKey("name")));
    assert_eq!(engine.vertex_count().unwrap(), 0);
}

#[test]
fn record_name_wins_over_name_property() {
    let engine = engine();
    engine
        .upsert_vertex(&VertexRecord::new("host-a").with_property("name", "host-b"))
        .unwrap();

    let vertex = engine.find_vertex("host-a").unwrap().unwrap();
    assert_eq!(text(&vertex, "name"), Some("host-a"));
    assert!(engine.find_vertex("host-b").unwrap().is_none());
}

#[test]
fn failed_vertex_create_leaves_no_orphan() {
    let store = Arc::new(FlakyStore::new());
    let engine = GraphMergeEngine::new(store.clone()).unwrap();
    store.fail_next_create.store(true, Ordering::SeqCst);

    assert!(matches!(
        engine.upsert_vertex(&VertexRecord::new("a")),
        Err(MergeError::Storage(_))
    ));
    assert_eq!(engine.vertex_count().unwrap(), 0);

    assert!(engine.upsert_vertex(&VertexRecord::new("a")).unwrap().created);
    assert_eq!(engine.vertex_count().unwrap(), 1);
}

// ---------------------------------------------------------------------------
// Edges
// ---------------------------------------------------------------------------

#[test]
fn edge_with_unknown_endpoints_creates_placeholders() {
    let engine = engine();

    let upsert = engine
        .upsert_edge(&EdgeRecord::new("A_runs_B", "A", "B", "runs"))
        .unwrap();

    assert!(upsert.created);
    assert_eq!(upsert.placeholders, 2);
    assert_eq!(engine.vertex_count().unwrap(), 2);
    assert_eq!(engine.edge_count().unwrap(), 1);

    let a = engine.find_vertex("A").unwrap().unwrap();
    assert_eq!(text(&a, "name"), Some("A"));
    assert_eq!(a.properties.len(), 1);

    // Real data for A arrives later and lands on the placeholder
    engine
        .upsert_vertex(&VertexRecord::new("A").with_property("vertexType", "host"))
        .unwrap();
    let updated = engine.find_vertex("A").unwrap().unwrap();
    assert_eq!(updated.id, a.id);
    assert_eq!(text(&updated, "vertexType"), Some("host"));
    assert_eq!(engine.vertex_count().unwrap(), 2);

    let edge = engine.find_edge("A_runs_B").unwrap().unwrap();
    assert_eq!(edge.source, a.id);
    assert_eq!(edge.label, "runs");
}

#[test]
fn existing_edge_is_never_updated() {
    let engine = engine();

    let first = engine
        .upsert_edge(&EdgeRecord::new("e1", "A", "B", "runs").with_property("weight", "1"))
        .unwrap();
    let second = engine
        .upsert_edge(&EdgeRecord::new("e1", "A", "B", "runs").with_property("weight", "5"))
        .unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.id, second.id);
    assert_eq!(engine.edge_count().unwrap(), 1);

    let edge = engine.find_edge("e1").unwrap().unwrap();
    assert_eq!(edge.property("weight").and_then(StoredValue::as_text), Some("1"));
}

#[test]
fn stored_edge_carries_its_logical_id() {
    let engine = engine();
    engine
        .upsert_edge(&EdgeRecord::new("A_runs_B", "A", "B", "runs"))
        .unwrap();

    let edge = engine.find_edge("A_runs_B").unwrap().unwrap();
    assert_eq!(edge.property("_id").and_then(StoredValue::as_text), Some("A_runs_B"));
}

#[test]
fn failed_edge_create_is_retried_without_duplicate() {
    let store = Arc::new(FlakyStore::new());
    let engine = GraphMergeEngine::new(store.clone()).unwrap();
    engine.upsert_vertex(&VertexRecord::new("A")).unwrap();
    engine.upsert_vertex(&VertexRecord::new("B")).unwrap();
    store.fail_next_create.store(true, Ordering::SeqCst);

    let record = EdgeRecord::new("e1", "A", "B", "runs").with_property("weight", "1");
    assert!(engine.upsert_edge(&record).is_err());
    assert_eq!(engine.edge_count().unwrap(), 0);
    assert!(engine.find_edge("e1").unwrap().is_none());

    assert!(engine.upsert_edge(&record).unwrap().created);
    assert!(!engine.upsert_edge(&record).unwrap().created);
    assert_eq!(engine.edge_count().unwrap(), 1);
    let edge = engine.find_edge("e1").unwrap().unwrap();
    assert_eq!(edge.property("weight").and_then(StoredValue::as_text), Some("1"));
}

#[test]
fn edge_reuses_existing_endpoints() {
    let engine = engine();
    engine.upsert_vertex(&VertexRecord::new("A")).unwrap();
    engine.upsert_vertex(&VertexRecord::new("B")).unwrap();

    let upsert = engine
        .upsert_edge(&EdgeRecord::new("A_to_B", "A", "B", "connectsTo"))
        .unwrap();

    assert_eq!(upsert.placeholders, 0);
    assert_eq!(engine.vertex_count().unwrap(), 2);
}

#[test]
fn self_loop_creates_one_placeholder() {
    let engine = engine();
    let upsert = engine
        .upsert_edge(&EdgeRecord::new("A_self_A", "A", "A", "self"))
        .unwrap();
    assert_eq!(upsert.placeholders, 1);
    assert_eq!(engine.vertex_count().unwrap(), 1);
}

#[test]
fn edge_missing_label_is_rejected() {
    let engine = engine();
    let err = engine
        .upsert_edge(&EdgeRecord::new("e1", "A", "B", ""))
        .unwrap_err();
    assert!(matches!(err, MergeError::MissingKey("_label")));
    assert_eq!(engine.vertex_count().unwrap(), 0);
}

// ---------------------------------------------------------------------------
// Fragment loads
// ---------------------------------------------------------------------------

#[test]
fn load_merges_vertices_before_edges() {
    let engine = engine();
    let mut fragment = GraphFragment::new();
    fragment.add_edge(EdgeRecord::new("h_runs_p", "h", "p", "runs"));
    fragment.add_vertex(VertexRecord::new("h").with_property("vertexType", "host"));
    fragment.add_vertex(VertexRecord::new("p").with_property("vertexType", "software"));

    let report = engine.load(&fragment);

    assert!(report.is_fully_merged());
    assert_eq!(report.vertices_created, 2);
    assert_eq!(report.edges_created, 1);
    assert_eq!(report.placeholders_created, 0);
}

#[test]
fn malformed_edge_does_not_block_valid_vertex() {
    let engine = engine();
    let fragment = wire(json!({
        "vertices": [ { "name": "h", "vertexType": "host" } ],
        "edges": [ { "_id": "broken", "_outV": "h", "_label": "runs" } ]
    }));

    let report = engine.load_wire(&fragment);

    assert_eq!(report.vertices_merged, 1);
    assert_eq!(report.edges_created, 0);
    assert_eq!(report.rejections.len(), 1);
    assert!(matches!(
        report.rejections[0].reason,
        MergeError::Fragment(FragmentError::MissingKey("_inV"))
    ));
    assert_eq!(engine.vertex_count().unwrap(), 1);
    assert_eq!(engine.edge_count().unwrap(), 0);
}

#[test]
fn nested_property_rejects_only_its_item() {
    let engine = engine();
    let fragment = wire(json!({
        "vertices": [
            { "name": "a", "meta": { "nested": true } },
            { "_id": "b", "port": 22, "open": true, "note": null }
        ]
    }));

    let report = engine.load_wire(&fragment);

    assert_eq!(report.vertices_created, 1);
    assert_eq!(report.rejections.len(), 1);
    assert!(engine.find_vertex("a").unwrap().is_none());

    let b = engine.find_vertex("b").unwrap().unwrap();
    assert_eq!(text(&b, "name"), Some("b"));
    assert_eq!(text(&b, "port"), Some("22"));
    assert_eq!(text(&b, "open"), Some("true"));
    assert!(b.property("note").is_none());
    assert_eq!(text(&b, "_id"), Some("b"));
}

#[test]
fn reloading_a_fragment_reports_existing_edges() {
    let engine = engine();
    let fragment = wire(json!({
        "vertices": [ { "name": "a" }, { "name": "b" } ],
        "edges": [ { "_id": "a_x_b", "_outV": "a", "_inV": "b", "_label": "x" } ]
    }));

    let first = engine.load_wire(&fragment);
    let second = engine.load_wire(&fragment);

    assert_eq!(first.edges_created, 1);
    assert_eq!(second.edges_created, 0);
    assert_eq!(second.edges_existing, 1);
    assert_eq!(second.vertices_created, 0);
    assert_eq!(second.vertices_merged, 2);
    assert_eq!(engine.edge_count().unwrap(), 1);
}

#[test]
fn non_object_items_are_rejected() {
    let engine = engine();
    let fragment = wire(json!({ "vertices": [ "just-a-string", { "name": "ok" } ] }));

    let report = engine.load_wire(&fragment);

    assert_eq!(report.vertices_merged, 1);
    assert!(matches!(
        report.rejections[0].reason,
        MergeError::Fragment(FragmentError::NotAnObject)
    ));
}

#[test]
fn typed_fragment_round_trips_through_wire_load() {
    let engine = engine();
    let mut fragment = GraphFragment::new();
    fragment.add_vertex(VertexRecord::new("a").with_property("vertexType", "host"));
    fragment.add_edge(
        EdgeRecord::new("a_runs_b", "a", "b", "runs").with_property("source", "packages"),
    );

    let json = fragment.to_json().unwrap();
    let report = engine.load_wire(&WireFragment::from_json(&json).unwrap());

    assert!(report.is_fully_merged());
    assert_eq!(report.placeholders_created, 1);
    let edge = engine.find_edge("a_runs_b").unwrap().unwrap();
    assert_eq!(edge.property("source").and_then(StoredValue::as_text), Some("packages"));
}

#[test]
fn indexes_survive_engine_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("graph.db");

    {
        let store: Arc<dyn GraphStore> = Arc::new(SqliteStore::open(&path).unwrap());
        let engine = GraphMergeEngine::new(store).unwrap();
        engine
            .upsert_edge(&EdgeRecord::new("a_x_b", "a", "b", "x"))
            .unwrap();
    }

    let store: Arc<dyn GraphStore> = Arc::new(SqliteStore::open(&path).unwrap());
    let engine = GraphMergeEngine::new(store).unwrap();
    let again = engine
        .upsert_edge(&EdgeRecord::new("a_x_b", "a", "b", "x"))
        .unwrap();

    assert!(!again.created);
    assert_eq!(engine.vertex_count().unwrap(), 2);
    assert_eq!(engine.edge_count().unwrap(), 1);
}
