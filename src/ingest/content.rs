//! Content resolution: turning a message body into the record to parse
//!
//! A body is either the record itself (`HasContent` header set) or the id of
//! a document held by the document service. Fetched documents wrap the
//! record in a JSON envelope: `{"document": "<content>"}`.

use super::message::Message;
use crate::extract::AssemblyError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors from a document store
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("could not fetch document {id}: {message}")]
    Fetch { id: String, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Why the content for a message could not be produced
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("message body is not valid UTF-8")]
    NotUtf8,

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("document {id} has no content envelope: {reason}")]
    Envelope { id: String, reason: String },

    #[error(transparent)]
    PartList(#[from] AssemblyError),
}

/// A raw document as returned by the document service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: String,
    pub data: Vec<u8>,
}

impl Document {
    pub fn new(id: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            data: data.into(),
        }
    }

    /// The record wrapped in this document's `{"document": ...}` envelope
    pub fn unwrap_content(&self) -> Result<String, ResolveError> {
        #[derive(Deserialize)]
        struct Envelope {
            document: String,
        }

        serde_json::from_slice::<Envelope>(&self.data)
            .map(|e| e.document)
            .map_err(|e| ResolveError::Envelope {
                id: self.id.clone(),
                reason: e.to_string(),
            })
    }
}

/// A keyed store of raw documents
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn fetch(&self, id: &str) -> Result<Document, DocumentError>;
}

/// Document service client: `GET {base}/document/{id}`
#[derive(Clone)]
pub struct HttpDocumentStore {
    client: Client,
    base_url: String,
}

impl HttpDocumentStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, DocumentError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Client for a document service at `http://{host}:{port}`
    pub fn from_host(host: &str, port: u16, timeout: Duration) -> Result<Self, DocumentError> {
        Self::new(format!("http://{}:{}", host, port), timeout)
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn fetch(&self, id: &str) -> Result<Document, DocumentError> {
        let url = format!("{}/document/{}", self.base_url, id);
        debug!(%url, "fetching document");

        let response = self.client.get(&url).send().await.map_err(|e| DocumentError::Fetch {
            id: id.to_string(),
            message: e.to_string(),
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(DocumentError::NotFound(id.to_string())),
            status if !status.is_success() => {
                return Err(DocumentError::Fetch {
                    id: id.to_string(),
                    message: format!("status {}", status.as_u16()),
                })
            }
            _ => {}
        }

        let data = response.bytes().await?;
        Ok(Document::new(id, data.to_vec()))
    }
}

/// An in-memory document store
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.documents.lock().unwrap().insert(id.into(), data.into());
    }

    /// Store `content` wrapped in the service's JSON envelope
    pub fn insert_content(&self, id: impl Into<String>, content: &str) {
        let envelope = serde_json::json!({ "document": content });
        self.insert(id, envelope.to_string());
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn fetch(&self, id: &str) -> Result<Document, DocumentError> {
        self.documents
            .lock()
            .unwrap()
            .get(id)
            .map(|data| Document::new(id, data.clone()))
            .ok_or_else(|| DocumentError::NotFound(id.to_string()))
    }
}

/// Produces the content of a message, fetching it when needed.
#[derive(Clone)]
pub struct ContentResolver {
    documents: Arc<dyn DocumentStore>,
}

impl ContentResolver {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self { documents }
    }

    /// Content for a single-document message.
    ///
    /// Inline bodies are returned verbatim. Otherwise the trimmed body is a
    /// document id and the fetched document's envelope is unwrapped.
    pub async fn resolve(&self, message: &Message, body: &[u8]) -> Result<String, ResolveError> {
        let text = std::str::from_utf8(body).map_err(|_| ResolveError::NotUtf8)?;
        if message.content_inline() {
            return Ok(text.to_string());
        }
        self.fetch_content(text.trim()).await
    }

    /// Fetch a document by id and unwrap its envelope
    pub async fn fetch_content(&self, id: &str) -> Result<String, ResolveError> {
        let document = self.documents.fetch(id).await?;
        document.unwrap_content()
    }
}
