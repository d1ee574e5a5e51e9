//! Directory spool queue
//!
//! Each message is one JSON file in the spool directory:
//!
//! ```json
//! { "routing_key": "feed.cve", "headers": { "HasContent": true }, "body": "<xml ...>" }
//! ```
//!
//! The file name is the delivery id. Files are delivered in name order. Ack
//! deletes the file; retry leaves it in place but holds it back until the
//! spool has been found empty once. Files that cannot be decoded are renamed
//! with a `.rejected` suffix so they are not delivered again.

use super::message::Message;
use super::queue::{MessageQueue, QueueError};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::{debug, warn};

const MESSAGE_EXT: &str = "json";
const REJECTED_EXT: &str = "rejected";

/// On-disk form of a spooled message
#[derive(Debug, Serialize, Deserialize)]
struct SpoolFile {
    routing_key: String,
    #[serde(default)]
    headers: Map<String, Value>,
    #[serde(default)]
    body: Option<String>,
}

#[derive(Debug, Default)]
struct SpoolState {
    pending: VecDeque<String>,
    in_flight: HashSet<String>,
    deferred: HashSet<String>,
    closed: bool,
}

/// A message queue backed by a directory of JSON files.
pub struct SpoolQueue {
    dir: PathBuf,
    state: Mutex<SpoolState>,
    sequence: AtomicU64,
}

impl SpoolQueue {
    /// Open a spool directory, creating it if needed.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, QueueError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            state: Mutex::new(SpoolState::default()),
            sequence: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a message into the spool. Returns its delivery id.
    pub async fn enqueue(
        &self,
        routing_key: &str,
        body: Option<&str>,
        headers: Map<String, Value>,
    ) -> Result<String, QueueError> {
        let file = SpoolFile {
            routing_key: routing_key.to_string(),
            headers,
            body: body.map(str::to_string),
        };
        let json = serde_json::to_vec_pretty(&file).map_err(|source| QueueError::Malformed {
            path: routing_key.to_string(),
            source,
        })?;

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let name = format!(
            "{}-{:06}.{}",
            Utc::now().format("%Y%m%d%H%M%S%f"),
            sequence,
            MESSAGE_EXT
        );

        // Write then rename so a scan never sees a half-written file
        let tmp = self.dir.join(format!("{}.tmp", name));
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, self.dir.join(&name)).await?;
        Ok(name)
    }

    /// List deliverable files, oldest name first.
    async fn scan(&self) -> Result<Vec<String>, QueueError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(MESSAGE_EXT) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Refill the pending list from disk. Returns false if nothing new was found.
    async fn refill(&self) -> Result<bool, QueueError> {
        let names = self.scan().await?;
        let mut state = self.state.lock().unwrap();
        let fresh: Vec<String> = names
            .into_iter()
            .filter(|n| !state.in_flight.contains(n) && !state.deferred.contains(n))
            .collect();

        if fresh.is_empty() {
            // The spool is drained: retried files become deliverable again
            state.deferred.clear();
            return Ok(false);
        }
        debug!(count = fresh.len(), dir = %self.dir.display(), "picked up spooled messages");
        state.pending.extend(fresh);
        Ok(true)
    }

    /// Decode one spooled file. `None` if it vanished or was set aside.
    async fn read(&self, name: &str) -> Result<Option<Message>, QueueError> {
        let path = self.dir.join(name);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            // Removed by someone else since the scan
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice::<SpoolFile>(&bytes) {
            Ok(file) => Ok(Some(Message {
                routing_key: file.routing_key,
                delivery_id: name.to_string(),
                body: file.body.map(String::into_bytes),
                headers: file.headers,
            })),
            Err(source) => {
                let rejected = path.with_extension(REJECTED_EXT);
                warn!(file = %path.display(), error = %source, "rejecting undecodable spool file");
                tokio::fs::rename(&path, &rejected).await?;
                Ok(None)
            }
        }
    }

    fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    fn next_pending(&self) -> Option<String> {
        let mut state = self.state.lock().unwrap();
        let name = state.pending.pop_front()?;
        state.in_flight.insert(name.clone());
        Some(name)
    }

    fn release(&self, delivery_id: &str) -> Result<(), QueueError> {
        let mut state = self.state.lock().unwrap();
        if state.in_flight.remove(delivery_id) {
            Ok(())
        } else {
            Err(QueueError::UnknownDelivery(delivery_id.to_string()))
        }
    }
}

#[async_trait]
impl MessageQueue for SpoolQueue {
    async fn get_message(&self) -> Result<Option<Message>, QueueError> {
        loop {
            if self.is_closed() {
                return Err(QueueError::Closed);
            }

            let name = match self.next_pending() {
                Some(name) => name,
                None => {
                    if self.refill().await? {
                        continue;
                    }
                    return Ok(None);
                }
            };

            match self.read(&name).await {
                Ok(Some(message)) => return Ok(Some(message)),
                // Gone or set aside: move on to the next file
                Ok(None) => self.release(&name)?,
                Err(e) => {
                    self.release(&name)?;
                    return Err(e);
                }
            }
        }
    }

    async fn ack(&self, delivery_id: &str) -> Result<(), QueueError> {
        self.release(delivery_id)?;
        match tokio::fs::remove_file(self.dir.join(delivery_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn retry(&self, delivery_id: &str) -> Result<(), QueueError> {
        self.release(delivery_id)?;
        self.state
            .lock()
            .unwrap()
            .deferred
            .insert(delivery_id.to_string());
        Ok(())
    }

    async fn close(&self) -> Result<(), QueueError> {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        state.pending.clear();
        Ok(())
    }
}
