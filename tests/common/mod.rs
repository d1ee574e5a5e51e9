//! Shared harness for end-to-end pipeline tests
//!
//! A `Pipeline` owns a temporary directory holding a spool queue and an
//! on-disk graph database, plus an in-memory document service. Each
//! `drain()` opens a fresh dispatcher over the same spool and database, the
//! way separate `intelgraph run --once` invocations would.

#![allow(dead_code)]

use intelgraph::ingest::{MemoryDocumentStore, SpoolQueue};
use intelgraph::{
    ContentResolver, DispatcherSettings, GraphMergeEngine, IngestionDispatcher, OpenStore,
    RunSummary, SqliteStore,
};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub struct Pipeline {
    dir: TempDir,
    publisher: SpoolQueue,
    pub documents: Arc<MemoryDocumentStore>,
}

impl Pipeline {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let publisher = SpoolQueue::open(dir.path().join("spool")).unwrap();
        Self {
            dir,
            publisher,
            documents: Arc::new(MemoryDocumentStore::new()),
        }
    }

    pub fn spool_dir(&self) -> PathBuf {
        self.dir.path().join("spool")
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("graph.db")
    }

    /// Spool a message with arbitrary headers
    pub async fn publish(&self, routing_key: &str, body: Option<&str>, headers: Map<String, Value>) -> String {
        self.publisher.enqueue(routing_key, body, headers).await.unwrap()
    }

    /// Spool a message that carries its record inline
    pub async fn publish_inline(&self, routing_key: &str, content: &str) -> String {
        let mut headers = Map::new();
        headers.insert("HasContent".into(), Value::Bool(true));
        self.publish(routing_key, Some(content), headers).await
    }

    /// Store `content` in the document service and spool a reference to it
    pub async fn publish_document(&self, routing_key: &str, document_id: &str, content: &str) -> String {
        self.documents.insert_content(document_id, content);
        self.publish(routing_key, Some(document_id), Map::new()).await
    }

    /// Process everything spooled so far, then stop
    pub async fn drain(&self) -> RunSummary {
        let queue = SpoolQueue::open(self.spool_dir()).unwrap();
        let resolver = ContentResolver::new(self.documents.clone());
        let dispatcher = IngestionDispatcher::new(queue, resolver, self.engine(), DispatcherSettings::drain());
        dispatcher.run().await
    }

    /// A merge engine over the pipeline's database
    pub fn engine(&self) -> GraphMergeEngine {
        let store = SqliteStore::open(self.db_path()).unwrap();
        GraphMergeEngine::new(Arc::new(store)).unwrap()
    }

    /// Message files still waiting in the spool
    pub fn spooled(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.spool_dir())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.ends_with(".json"))
            .collect();
        names.sort();
        names
    }

    /// Text value of a vertex property, if the vertex and property exist
    pub fn vertex_text(&self, name: &str, key: &str) -> Option<String> {
        let vertex = self.engine().find_vertex(name).unwrap()?;
        vertex.property(key)?.as_text().map(str::to_string)
    }
}
