//! IngestionDispatcher: the poll loop and per-message state machine
//!
//! ```text
//! Received → ContentResolved → Extracted → Merged → Acked
//!     └───────────┴──────────────┴→ Error ──────────┘
//! ```
//!
//! An empty body skips the machine entirely: the delivery is handed back to
//! the queue and never acknowledged. An empty queue puts the loop in
//! `RetryWait` until the next poll.

use super::cancel::CancellationToken;
use super::content::{ContentResolver, ResolveError};
use super::error::IngestError;
use super::message::Message;
use super::queue::{MessageQueue, QueueError};
use crate::extract::{
    parse_part_list, ExtractError, ExtractorRegistry, PartRef, Parts, Plan, RoleClassifier,
};
use crate::graph::{GraphMergeEngine, LoadReport};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Default idle time between polls of an empty queue
pub const DEFAULT_EMPTY_QUEUE_SLEEP: Duration = Duration::from_millis(2000);

/// A drain gives up after this many queue errors in a row
const MAX_CONSECUTIVE_QUEUE_ERRORS: usize = 3;

/// Loop behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatcherSettings {
    /// Keep polling after the queue drains. When false the loop stops at the
    /// first empty poll.
    pub persistent: bool,
    pub empty_queue_sleep: Duration,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            persistent: true,
            empty_queue_sleep: DEFAULT_EMPTY_QUEUE_SLEEP,
        }
    }
}

impl DispatcherSettings {
    /// Drain the queue once and stop
    pub fn drain() -> Self {
        Self {
            persistent: false,
            ..Self::default()
        }
    }
}

/// Where a message is in its processing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageState {
    Received,
    ContentResolved,
    Extracted,
    Merged,
    Error,
    Acked,
    RetryWait,
}

impl MessageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::ContentResolved => "content_resolved",
            Self::Extracted => "extracted",
            Self::Merged => "merged",
            Self::Error => "error",
            Self::Acked => "acked",
            Self::RetryWait => "retry_wait",
        }
    }
}

/// What became of one delivery
#[derive(Debug)]
pub enum Disposition {
    /// Fragment merged, message acked
    Merged(LoadReport),
    /// Processing failed, message acked without a merge
    Discarded(IngestError),
    /// Handed back to the queue
    Requeued,
}

/// Counts for one `run()`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub received: usize,
    pub merged: usize,
    pub discarded: usize,
    pub requeued: usize,
}

/// Pulls messages off a queue and merges what they describe into the graph.
///
/// One message is processed at a time, so merges follow delivery order.
pub struct IngestionDispatcher<Q: MessageQueue> {
    queue: Q,
    registry: ExtractorRegistry,
    resolver: ContentResolver,
    engine: GraphMergeEngine,
    settings: DispatcherSettings,
    cancel: CancellationToken,
}

impl<Q: MessageQueue> IngestionDispatcher<Q> {
    /// Dispatcher over the standard feed routes
    pub fn new(
        queue: Q,
        resolver: ContentResolver,
        engine: GraphMergeEngine,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            queue,
            registry: ExtractorRegistry::standard(),
            resolver,
            engine,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_registry(mut self, registry: ExtractorRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops `run()` between messages
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn queue(&self) -> &Q {
        &self.queue
    }

    pub fn engine(&self) -> &GraphMergeEngine {
        &self.engine
    }

    pub fn registry(&self) -> &ExtractorRegistry {
        &self.registry
    }

    pub fn into_queue(self) -> Q {
        self.queue
    }

    /// Poll and process until cancelled or, when not persistent, until the
    /// queue is empty. The queue is closed before returning.
    pub async fn run(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        info!(persistent = self.settings.persistent, "dispatcher started");

        let mut queue_errors = 0;
        loop {
            if self.cancel.is_cancelled() {
                info!("cancellation requested, stopping");
                break;
            }

            let next = match self.queue.get_message().await {
                Ok(next) => {
                    queue_errors = 0;
                    next
                }
                Err(QueueError::Closed) => {
                    warn!("queue closed, stopping");
                    break;
                }
                Err(e) => {
                    // One bad delivery must not end the run: poll again
                    queue_errors += 1;
                    error!(error = %e, consecutive = queue_errors, "could not read from queue");
                    if self.settings.persistent {
                        self.idle().await;
                    } else if queue_errors >= MAX_CONSECUTIVE_QUEUE_ERRORS {
                        error!("queue keeps failing, stopping");
                        break;
                    }
                    continue;
                }
            };

            match next {
                Some(message) => {
                    summary.received += 1;
                    match self.process(&message).await {
                        Disposition::Merged(_) => summary.merged += 1,
                        Disposition::Discarded(_) => summary.discarded += 1,
                        Disposition::Requeued => summary.requeued += 1,
                    }
                }
                None if !self.settings.persistent => break,
                None => {
                    debug!(
                        state = MessageState::RetryWait.as_str(),
                        sleep_ms = self.settings.empty_queue_sleep.as_millis() as u64,
                        "queue empty"
                    );
                    self.idle().await;
                }
            }
        }

        if let Err(e) = self.queue.close().await {
            warn!(error = %e, "failed to close queue");
        }
        info!(
            received = summary.received,
            merged = summary.merged,
            discarded = summary.discarded,
            requeued = summary.requeued,
            "dispatcher stopped"
        );
        summary
    }

    /// Sleep until the next poll, waking early on cancellation.
    async fn idle(&self) {
        tokio::select! {
            _ = tokio::time::sleep(self.settings.empty_queue_sleep) => {}
            _ = self.cancel.cancelled() => {}
        }
    }

    /// Take one delivery through to ack (or retry).
    pub async fn process(&self, message: &Message) -> Disposition {
        let started = Instant::now();
        self.transition(message, MessageState::Received);

        let disposition = match self.handle(message).await {
            Ok(report) => {
                info!(
                    delivery_id = %message.delivery_id,
                    vertices = report.vertices_merged,
                    edges = report.edges_created,
                    placeholders = report.placeholders_created,
                    rejected = report.rejections.len(),
                    "merged fragment"
                );
                self.acknowledge(message).await;
                Disposition::Merged(report)
            }
            Err(err) if err.is_retryable() => {
                warn!(delivery_id = %message.delivery_id, error = %err, "requeueing delivery");
                if let Err(e) = self.queue.retry(&message.delivery_id).await {
                    error!(delivery_id = %message.delivery_id, error = %e, "retry failed");
                }
                Disposition::Requeued
            }
            Err(err) => {
                self.transition(message, MessageState::Error);
                self.report_failure(message, &err);
                self.acknowledge(message).await;
                Disposition::Discarded(err)
            }
        };

        debug!(
            delivery_id = %message.delivery_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "finished delivery"
        );
        disposition
    }

    async fn handle(&self, message: &Message) -> Result<LoadReport, IngestError> {
        let body = message.body().ok_or(IngestError::EmptyBody)?;
        let route = self
            .registry
            .route(&message.routing_key)
            .ok_or_else(|| IngestError::Routing(message.routing_key.clone()))?;
        let metadata = message.metadata();
        let parse_error = |source: ExtractError| IngestError::Parse {
            feed: route.feed,
            source,
        };

        let fragment = match route.plan {
            Plan::MultiPart { roles, classify, .. } => {
                let text = std::str::from_utf8(body).map_err(|_| ResolveError::NotUtf8)?;
                let refs = parse_part_list(text).map_err(ResolveError::from)?;
                let parts = self.collect_parts(message, &refs, classify).await;
                self.transition(message, MessageState::ContentResolved);

                let missing = parts.missing(roles);
                if !missing.is_empty() {
                    return Err(IngestError::Incomplete {
                        feed: route.feed,
                        missing,
                    });
                }
                route.plan.assemble(&parts, &metadata).map_err(parse_error)?
            }
            _ => {
                let content = self.resolver.resolve(message, body).await?;
                self.transition(message, MessageState::ContentResolved);
                route.plan.extract(&content, &metadata).map_err(parse_error)?
            }
        };
        self.transition(message, MessageState::Extracted);

        debug!(
            delivery_id = %message.delivery_id,
            feed = route.feed,
            vertices = fragment.vertices.len(),
            edges = fragment.edges.len(),
            "extracted fragment"
        );
        let report = self.engine.load(&fragment);
        self.transition(message, MessageState::Merged);
        Ok(report)
    }

    /// Fetch every listed part and file it under its role.
    async fn collect_parts(&self, message: &Message, refs: &[PartRef], classify: RoleClassifier) -> Parts {
        let mut parts = Parts::new();
        for part in refs {
            let Some(role) = classify(&part.source_url) else {
                warn!(
                    delivery_id = %message.delivery_id,
                    url = %part.source_url,
                    "part URL matches no role"
                );
                continue;
            };
            match self.resolver.fetch_content(&part.reference_id).await {
                Ok(content) => parts.insert(role, content),
                Err(e) => warn!(
                    delivery_id = %message.delivery_id,
                    document_id = %part.reference_id,
                    role = %role,
                    error = %e,
                    "could not fetch part"
                ),
            }
        }
        parts
    }

    async fn acknowledge(&self, message: &Message) {
        match self.queue.ack(&message.delivery_id).await {
            Ok(()) => self.transition(message, MessageState::Acked),
            Err(e) => error!(delivery_id = %message.delivery_id, error = %e, "ack failed"),
        }
    }

    fn transition(&self, message: &Message, state: MessageState) {
        debug!(
            delivery_id = %message.delivery_id,
            routing_key = %message.routing_key,
            state = state.as_str()
        );
    }

    fn report_failure(&self, message: &Message, err: &IngestError) {
        if let IngestError::Routing(key) = err {
            warn!(delivery_id = %message.delivery_id, routing_key = %key, "unknown routing key");
            return;
        }

        let body = message.body().map(String::from_utf8_lossy).unwrap_or_default();
        if message.content_inline() {
            error!(
                delivery_id = %message.delivery_id,
                routing_key = %message.routing_key,
                error = %err,
                problem_content = %body,
                "could not process message"
            );
        } else {
            error!(
                delivery_id = %message.delivery_id,
                routing_key = %message.routing_key,
                error = %err,
                document_id = %body.trim(),
                "could not process message"
            );
        }
    }
}
