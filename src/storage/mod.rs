//! Storage backends for the knowledge graph
//!
//! The merge engine talks to storage through the `GraphStore` trait.
//! The primary implementation is `SqliteStore` for persistent storage.

mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{GraphStore, IndexHandle, OpenStore, StorageError, StorageResult};
