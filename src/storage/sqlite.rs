//! SQLite storage backend

use super::traits::{GraphStore, IndexHandle, OpenStore, StorageError, StorageResult};
use crate::graph::{Edge, EdgeId, ElementKind, StoredProperties, StoredValue, Vertex, VertexId};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

/// SQLite-backed graph store
///
/// Uses a single SQLite database file with tables for vertices, edges and
/// named secondary indexes. Thread-safe via internal mutex on the connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            -- Vertices table
            CREATE TABLE IF NOT EXISTS vertices (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                key TEXT NOT NULL,
                properties_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Edges table
            CREATE TABLE IF NOT EXISTS edges (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                label TEXT NOT NULL,
                source_id INTEGER NOT NULL,
                target_id INTEGER NOT NULL,
                properties_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (source_id) REFERENCES vertices(id),
                FOREIGN KEY (target_id) REFERENCES vertices(id)
            );

            -- Indexes for edge traversal
            CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source_id);
            CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target_id);
            CREATE INDEX IF NOT EXISTS idx_edges_label ON edges(label);

            -- Named secondary indexes and their entries
            CREATE TABLE IF NOT EXISTS element_indexes (
                name TEXT PRIMARY KEY,
                kind TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS index_entries (
                index_name TEXT NOT NULL,
                key TEXT NOT NULL,
                element_id INTEGER NOT NULL,
                PRIMARY KEY (index_name, key),
                FOREIGN KEY (index_name) REFERENCES element_indexes(name)
            );

            -- Enable foreign keys
            PRAGMA foreign_keys = ON;

            -- Enable WAL mode so readers (stats, show) don't block the loader
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn parse_time(raw: &str) -> StorageResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StorageError::DateParse(e.to_string()))
    }

    /// Deserialize a vertex from database columns
    fn row_to_vertex(
        id: i64,
        key: String,
        properties_json: String,
        created_at: String,
        updated_at: String,
    ) -> StorageResult<Vertex> {
        Ok(Vertex {
            id: VertexId::from_raw(id),
            key,
            properties: serde_json::from_str(&properties_json)?,
            created_at: Self::parse_time(&created_at)?,
            updated_at: Self::parse_time(&updated_at)?,
        })
    }

    /// Deserialize an edge from database columns
    #[allow(clippy::too_many_arguments)]
    fn row_to_edge(
        id: i64,
        label: String,
        source_id: i64,
        target_id: i64,
        properties_json: String,
        created_at: String,
        updated_at: String,
    ) -> StorageResult<Edge> {
        Ok(Edge {
            id: EdgeId::from_raw(id),
            label,
            source: VertexId::from_raw(source_id),
            target: VertexId::from_raw(target_id),
            properties: serde_json::from_str(&properties_json)?,
            created_at: Self::parse_time(&created_at)?,
            updated_at: Self::parse_time(&updated_at)?,
        })
    }

    /// Merge properties into the JSON column of one row.
    ///
    /// Returns false if the row does not exist.
    fn merge_properties(
        &self,
        table: &'static str,
        id: i64,
        properties: &[(String, StoredValue)],
    ) -> StorageResult<bool> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        let current: Option<String> = tx
            .query_row(
                &format!("SELECT properties_json FROM {} WHERE id = ?1", table),
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(current) = current else {
            return Ok(false);
        };

        let mut merged: StoredProperties = serde_json::from_str(&current)?;
        for (key, value) in properties {
            merged.insert(key.clone(), value.clone());
        }

        tx.execute(
            &format!(
                "UPDATE {} SET properties_json = ?2, updated_at = ?3 WHERE id = ?1",
                table
            ),
            params![id, serde_json::to_string(&merged)?, Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;
        Ok(true)
    }

    fn count(&self, table: &'static str) -> StorageResult<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })?;
        Ok(count as usize)
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl GraphStore for SqliteStore {
    // === Element Operations ===

    fn create_vertex(&self, key: &str) -> StorageResult<VertexId> {
        let conn = self.conn.lock().unwrap();
        insert_vertex(&conn, key, "{}")
    }

    fn create_edge(&self, label: &str, source: VertexId, target: VertexId) -> StorageResult<EdgeId> {
        let conn = self.conn.lock().unwrap();
        insert_edge(&conn, label, source, target, "{}")
    }

    fn create_indexed_vertex(
        &self,
        index: &IndexHandle,
        key: &str,
        properties: &[(String, StoredValue)],
    ) -> StorageResult<VertexId> {
        let properties_json = properties_to_json(properties)?;
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let id = insert_vertex(&tx, key, &properties_json)?;
        put_index_entry(&tx, index, key, id.as_raw())?;
        tx.commit()?;
        Ok(id)
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
        let properties_json = properties_to_json(properties)?;
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let id = insert_edge(&tx, label, source, target, &properties_json)?;
        put_index_entry(&tx, index, key, id.as_raw())?;
        tx.commit()?;
        Ok(id)
    }

    fn set_vertex_properties(&self, id: VertexId, properties: &[(String, StoredValue)]) -> StorageResult<()> {
        if self.merge_properties("vertices", id.as_raw(), properties)? {
            Ok(())
        } else {
            Err(StorageError::VertexNotFound(id))
        }
    }

    fn set_edge_properties(&self, id: EdgeId, properties: &[(String, StoredValue)]) -> StorageResult<()> {
        if self.merge_properties("edges", id.as_raw(), properties)? {
            Ok(())
        } else {
            Err(StorageError::EdgeNotFound(id))
        }
    }

    fn load_vertex(&self, id: VertexId) -> StorageResult<Option<Vertex>> {
        let conn = self.conn.lock().unwrap();

        let row: Option<(i64, String, String, String, String)> = conn
            .query_row(
                "SELECT id, key, properties_json, created_at, updated_at FROM vertices WHERE id = ?1",
                params![id.as_raw()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
            )
            .optional()?;

        match row {
            Some((id, key, properties, created, updated)) => {
                Ok(Some(Self::row_to_vertex(id, key, properties, created, updated)?))
            }
            None => Ok(None),
        }
    }

    fn load_edge(&self, id: EdgeId) -> StorageResult<Option<Edge>> {
        let conn = self.conn.lock().unwrap();

        let row: Option<(i64, String, i64, i64, String, String, String)> = conn
            .query_row(
                "SELECT id, label, source_id, target_id, properties_json, created_at, updated_at
                 FROM edges WHERE id = ?1",
                params![id.as_raw()],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((id, label, source, target, properties, created, updated)) => Ok(Some(
                Self::row_to_edge(id, label, source, target, properties, created, updated)?,
            )),
            None => Ok(None),
        }
    }

    fn vertex_count(&self) -> StorageResult<usize> {
        self.count("vertices")
    }

    fn edge_count(&self) -> StorageResult<usize> {
        self.count("edges")
    }

    // === Index Operations ===

    fn get_or_create_index(&self, name: &str, kind: ElementKind) -> StorageResult<IndexHandle> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO element_indexes (name, kind) VALUES (?1, ?2) ON CONFLICT(name) DO NOTHING",
            params![name, kind.as_str()],
        )?;

        let existing: String = conn.query_row(
            "SELECT kind FROM element_indexes WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        if existing != kind.as_str() {
            return Err(StorageError::IndexKindMismatch {
                name: name.to_string(),
                existing,
                requested: kind.as_str(),
            });
        }

        Ok(IndexHandle {
            name: name.to_string(),
            kind,
        })
    }

    fn index_get(&self, index: &IndexHandle, key: &str) -> StorageResult<Option<i64>> {
        let conn = self.conn.lock().unwrap();
        let element = conn
            .query_row(
                "SELECT element_id FROM index_entries WHERE index_name = ?1 AND key = ?2",
                params![index.name, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(element)
    }

    fn index_put(&self, index: &IndexHandle, key: &str, element: i64) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        put_index_entry(&conn, index, key, element)
    }
}

fn properties_to_json(properties: &[(String, StoredValue)]) -> StorageResult<String> {
    let map: StoredProperties = properties.iter().cloned().collect();
    Ok(serde_json::to_string(&map)?)
}

fn insert_vertex(conn: &Connection, key: &str, properties_json: &str) -> StorageResult<VertexId> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO vertices (key, properties_json, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
        params![key, properties_json, now],
    )?;
    Ok(VertexId::from_raw(conn.last_insert_rowid()))
}

fn insert_edge(
    conn: &Connection,
    label: &str,
    source: VertexId,
    target: VertexId,
    properties_json: &str,
) -> StorageResult<EdgeId> {
    for endpoint in [source, target] {
        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM vertices WHERE id = ?1",
            params![endpoint.as_raw()],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(StorageError::VertexNotFound(endpoint));
        }
    }

    let now = Utc::now().to_rfc3339();
    conn.execute(
        r#"
        INSERT INTO edges (label, source_id, target_id, properties_json, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?5)
        "#,
        params![label, source.as_raw(), target.as_raw(), properties_json, now],
    )?;
    Ok(EdgeId::from_raw(conn.last_insert_rowid()))
}

fn put_index_entry(conn: &Connection, index: &IndexHandle, key: &str, element: i64) -> StorageResult<()> {
    conn.execute(
        r#"
        INSERT INTO index_entries (index_name, key, element_id)
        VALUES (?1, ?2, ?3)
        ON CONFLICT(index_name, key) DO UPDATE SET element_id = excluded.element_id
        "#,
        params![index.name, key, element],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    fn text(s: &str) -> StoredValue {
        StoredValue::Text(s.to_string())
    }

    #[test]
    fn test_create_and_load_vertex() {
        let store = create_test_store();
        let id = store.create_vertex("host-a").unwrap();

        let vertex = store.load_vertex(id).unwrap().unwrap();
        assert_eq!(vertex.key, "host-a");
        assert!(vertex.properties.is_empty());
        assert_eq!(store.vertex_count().unwrap(), 1);
    }

    #[test]
    fn test_properties_replace_per_key() {
        let store = create_test_store();
        let id = store.create_vertex("a").unwrap();

        store
            .set_vertex_properties(id, &[("k1".into(), text("one")), ("k2".into(), text("two"))])
            .unwrap();
        store
            .set_vertex_properties(
                id,
                &[("k2".into(), StoredValue::TextArray(vec!["x".into(), "y".into()]))],
            )
            .unwrap();

        let vertex = store.load_vertex(id).unwrap().unwrap();
        assert_eq!(vertex.property("k1"), Some(&text("one")));
        assert_eq!(
            vertex.property("k2"),
            Some(&StoredValue::TextArray(vec!["x".into(), "y".into()]))
        );
    }

    #[test]
    fn test_set_properties_on_missing_vertex() {
        let store = create_test_store();
        let err = store
            .set_vertex_properties(VertexId::from_raw(99), &[("k".into(), text("v"))])
            .unwrap_err();
        assert!(matches!(err, StorageError::VertexNotFound(_)));
    }

    #[test]
    fn test_edge_requires_existing_endpoints() {
        let store = create_test_store();
        let a = store.create_vertex("a").unwrap();

        let err = store.create_edge("runs", a, VertexId::from_raw(42)).unwrap_err();
        assert!(matches!(err, StorageError::VertexNotFound(v) if v.as_raw() == 42));
        assert_eq!(store.edge_count().unwrap(), 0);
    }

    #[test]
    fn test_create_and_load_edge() {
        let store = create_test_store();
        let a = store.create_vertex("a").unwrap();
        let b = store.create_vertex("b").unwrap();

        let e = store.create_edge("runs", a, b).unwrap();
        store.set_edge_properties(e, &[("source".into(), text("hone"))]).unwrap();

        let edge = store.load_edge(e).unwrap().unwrap();
        assert_eq!(edge.label, "runs");
        assert_eq!(edge.source, a);
        assert_eq!(edge.target, b);
        assert_eq!(edge.property("source"), Some(&text("hone")));
    }

    #[test]
    fn test_index_put_get_and_replace() {
        let store = create_test_store();
        let index = store.get_or_create_index("vertex_name", ElementKind::Vertex).unwrap();

        assert_eq!(store.index_get(&index, "a").unwrap(), None);
        store.index_put(&index, "a", 1).unwrap();
        assert_eq!(store.index_get(&index, "a").unwrap(), Some(1));
        store.index_put(&index, "a", 7).unwrap();
        assert_eq!(store.index_get(&index, "a").unwrap(), Some(7));
    }

    #[test]
    fn test_create_indexed_writes_element_properties_and_entry() {
        let store = create_test_store();
        let vertices = store.get_or_create_index("vertex_name", ElementKind::Vertex).unwrap();
        let edges = store.get_or_create_index("edge_id", ElementKind::Edge).unwrap();

        let a = store
            .create_indexed_vertex(&vertices, "a", &[("name".into(), text("a"))])
            .unwrap();
        let e = store
            .create_indexed_edge(&edges, "a_self_a", "self", a, a, &[("_id".into(), text("a_self_a"))])
            .unwrap();

        assert_eq!(store.index_get(&vertices, "a").unwrap(), Some(a.as_raw()));
        assert_eq!(store.index_get(&edges, "a_self_a").unwrap(), Some(e.as_raw()));
        let vertex = store.load_vertex(a).unwrap().unwrap();
        assert_eq!(vertex.property("name"), Some(&text("a")));
        let edge = store.load_edge(e).unwrap().unwrap();
        assert_eq!(edge.property("_id"), Some(&text("a_self_a")));
    }

    #[test]
    fn test_failed_index_write_rolls_back_create() {
        let store = create_test_store();
        let vertices = store.get_or_create_index("vertex_name", ElementKind::Vertex).unwrap();
        let a = store.create_indexed_vertex(&vertices, "a", &[]).unwrap();
        // Never registered, so the index entry violates its foreign key
        let unregistered = IndexHandle {
            name: "missing".into(),
            kind: ElementKind::Edge,
        };

        assert!(store
            .create_indexed_edge(&unregistered, "e1", "runs", a, a, &[])
            .is_err());
        assert!(store
            .create_indexed_vertex(&IndexHandle { kind: ElementKind::Vertex, ..unregistered }, "b", &[])
            .is_err());

        assert_eq!(store.edge_count().unwrap(), 0);
        assert_eq!(store.vertex_count().unwrap(), 1);
    }

    #[test]
    fn test_get_or_create_index_is_idempotent() {
        let store = create_test_store();
        let first = store.get_or_create_index("edge_id", ElementKind::Edge).unwrap();
        let second = store.get_or_create_index("edge_id", ElementKind::Edge).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_index_kind_mismatch() {
        let store = create_test_store();
        store.get_or_create_index("names", ElementKind::Vertex).unwrap();
        let err = store.get_or_create_index("names", ElementKind::Edge).unwrap_err();
        assert!(matches!(err, StorageError::IndexKindMismatch { .. }));
    }

    #[test]
    fn test_indexes_are_separate_namespaces() {
        let store = create_test_store();
        let vertices = store.get_or_create_index("vertex_name", ElementKind::Vertex).unwrap();
        let edges = store.get_or_create_index("edge_id", ElementKind::Edge).unwrap();

        store.index_put(&vertices, "same-key", 1).unwrap();
        assert_eq!(store.index_get(&edges, "same-key").unwrap(), None);
    }

    #[test]
    fn test_persistence_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("graph.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            let id = store.create_vertex("a").unwrap();
            store.set_vertex_properties(id, &[("name".into(), text("a"))]).unwrap();
            let index = store.get_or_create_index("vertex_name", ElementKind::Vertex).unwrap();
            store.index_put(&index, "a", id.as_raw()).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let index = store.get_or_create_index("vertex_name", ElementKind::Vertex).unwrap();
        let raw = store.index_get(&index, "a").unwrap().unwrap();
        let vertex = store.load_vertex(VertexId::from_raw(raw)).unwrap().unwrap();
        assert_eq!(vertex.property("name"), Some(&text("a")));
    }
}
