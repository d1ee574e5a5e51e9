//! intelgraph: security-intelligence knowledge graph ingestion
//!
//! Records from many feeds (vulnerability databases, malware analyses,
//! network flows, host inventories) arrive on a message queue. Each one is
//! routed by its label to an extractor that turns it into a graph fragment,
//! and the fragment is merged into a single persistent graph.
//!
//! # Core Concepts
//!
//! - **Fragments**: vertices keyed by logical name, edges keyed by logical id
//! - **Merge engine**: upserts vertices, creates edges once, and fills in
//!   placeholder vertices for endpoints not seen yet
//! - **Dispatcher**: polls the queue, resolves content, extracts and merges
//!
//! # Example
//!
//! ```
//! use intelgraph::{GraphMergeEngine, GraphFragment, OpenStore, SqliteStore, VertexRecord};
//! use std::sync::Arc;
//!
//! let store = Arc::new(SqliteStore::open_in_memory().unwrap());
//! let engine = GraphMergeEngine::new(store).unwrap();
//!
//! let mut fragment = GraphFragment::new();
//! fragment.add_vertex(VertexRecord::new("CVE-2014-0001").with_property("severity", "high"));
//! let report = engine.load(&fragment);
//! assert!(report.is_fully_merged());
//! ```

pub mod config;
pub mod extract;
pub mod graph;
pub mod ingest;
pub mod storage;

pub use config::{Config, ConfigError};
pub use extract::{ExtractError, ExtractorRegistry, Metadata, ParseError, Plan, Route};
pub use graph::{
    EdgeRecord, GraphFragment, GraphMergeEngine, LoadReport, MergeError, PropertyValue,
    VertexRecord, WireFragment,
};
pub use ingest::{
    CancellationToken, ContentResolver, DispatcherSettings, IngestError, IngestionDispatcher,
    Message, MessageQueue, RunSummary,
};
pub use storage::{GraphStore, OpenStore, SqliteStore, StorageError, StorageResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
