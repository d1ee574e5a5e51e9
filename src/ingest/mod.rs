//! Message ingestion: queues, content resolution and the dispatcher loop
//!
//! The dispatcher owns one queue, one content resolver and one merge engine,
//! all built once at startup and passed in.

mod cancel;
mod content;
mod dispatcher;
mod error;
mod message;
mod queue;
mod spool;

pub use cancel::CancellationToken;
pub use content::{
    ContentResolver, Document, DocumentError, DocumentStore, HttpDocumentStore,
    MemoryDocumentStore, ResolveError,
};
pub use dispatcher::{
    Disposition, DispatcherSettings, IngestionDispatcher, MessageState, RunSummary,
    DEFAULT_EMPTY_QUEUE_SLEEP,
};
pub use error::IngestError;
pub use message::{Message, HAS_CONTENT_HEADER};
pub use queue::{MemoryQueue, MessageQueue, QueueError};
pub use spool::SpoolQueue;
