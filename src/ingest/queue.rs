//! Message queue abstraction and an in-memory implementation

use super::message::Message;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use thiserror::Error;

/// Transport failures talking to a queue
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed message {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown delivery: {0}")]
    UnknownDelivery(String),

    #[error("queue is closed")]
    Closed,
}

/// A source of deliveries that must each be acknowledged or retried.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Take the next delivery, or `None` if nothing is waiting
    async fn get_message(&self) -> Result<Option<Message>, QueueError>;

    /// Mark a delivery as fully handled
    async fn ack(&self, delivery_id: &str) -> Result<(), QueueError>;

    /// Hand a delivery back to be redelivered later
    async fn retry(&self, delivery_id: &str) -> Result<(), QueueError>;

    /// Stop delivering messages
    async fn close(&self) -> Result<(), QueueError>;
}

#[derive(Debug, Default)]
struct MemoryState {
    pending: VecDeque<Message>,
    in_flight: Vec<Message>,
    deferred: Vec<Message>,
    acked: Vec<String>,
    retried: Vec<String>,
    failures: VecDeque<QueueError>,
    closed: bool,
}

/// An in-memory queue that records what happened to each delivery.
///
/// Retried deliveries are held back until the queue has been found empty
/// once, then delivered again in the order they were retried.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    state: Mutex<MemoryState>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_messages(messages: impl IntoIterator<Item = Message>) -> Self {
        let queue = Self::new();
        for message in messages {
            queue.push(message);
        }
        queue
    }

    pub fn push(&self, message: Message) {
        self.state.lock().unwrap().pending.push_back(message);
    }

    /// Make an upcoming `get_message` fail with `error`. Failures are
    /// returned in order, ahead of any pending message.
    pub fn fail_next(&self, error: QueueError) {
        self.state.lock().unwrap().failures.push_back(error);
    }

    /// Delivery ids acknowledged so far, in order
    pub fn acked(&self) -> Vec<String> {
        self.state.lock().unwrap().acked.clone()
    }

    /// Delivery ids handed back for retry, in order
    pub fn retried(&self) -> Vec<String> {
        self.state.lock().unwrap().retried.clone()
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    fn take_in_flight(state: &mut MemoryState, delivery_id: &str) -> Result<Message, QueueError> {
        let position = state
            .in_flight
            .iter()
            .position(|m| m.delivery_id == delivery_id)
            .ok_or_else(|| QueueError::UnknownDelivery(delivery_id.to_string()))?;
        Ok(state.in_flight.remove(position))
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    async fn get_message(&self) -> Result<Option<Message>, QueueError> {
        let mut state = self.state.lock().unwrap();
        if state.closed {
            return Err(QueueError::Closed);
        }
        if let Some(error) = state.failures.pop_front() {
            return Err(error);
        }
        match state.pending.pop_front() {
            Some(message) => {
                state.in_flight.push(message.clone());
                Ok(Some(message))
            }
            None => {
                let deferred = std::mem::take(&mut state.deferred);
                state.pending.extend(deferred);
                Ok(None)
            }
        }
    }

    async fn ack(&self, delivery_id: &str) -> Result<(), QueueError> {
        let mut state = self.state.lock().unwrap();
        Self::take_in_flight(&mut state, delivery_id)?;
        state.acked.push(delivery_id.to_string());
        Ok(())
    }

    async fn retry(&self, delivery_id: &str) -> Result<(), QueueError> {
        let mut state = self.state.lock().unwrap();
        let message = Self::take_in_flight(&mut state, delivery_id)?;
        state.retried.push(delivery_id.to_string());
        state.deferred.push(message);
        Ok(())
    }

    async fn close(&self) -> Result<(), QueueError> {
        self.state.lock().unwrap().closed = true;
        Ok(())
    }
}
