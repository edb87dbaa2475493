//! Broker port: the seam between the engine and a durable pub/sub
//! transport.
//!
//! The transport guarantees at-least-once delivery with no ordering across
//! partitions; every consumer behind [`EventHandler`] must therefore make
//! its effects idempotent. Handlers signal the broker with
//! [`HandlerOutcome`]: `Retry` requests redelivery (bounded, then
//! dead-letter), `Drop` discards a message the handler can never process.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::errors::EngineError;
use crate::domain::models::TaskEvent;

/// Topic carrying the full lifecycle envelopes.
pub const TOPIC_TASK_EVENTS: &str = "task-events";

/// Topic carrying compact payloads for the live-update broadcaster.
pub const TOPIC_TASK_UPDATES: &str = "task-updates";

/// What a handler tells the broker after processing one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Processed (including duplicate/obsolete terminal-success paths).
    Ack,
    /// Transient failure; redeliver later.
    Retry,
    /// Unprocessable message; discard without redelivery.
    Drop,
}

/// A subscribed consumer.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Stable handler name, used for logging and dead-letter records.
    fn name(&self) -> &str;

    /// Process one delivery. May be invoked concurrently and more than
    /// once per event.
    async fn handle(&self, event: &TaskEvent) -> HandlerOutcome;
}

/// Thin abstraction over the pub/sub transport.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Publish one envelope to a topic. A single attempt; callers retry
    /// with backoff and surface exhaustion (see `EventPublisher`).
    async fn publish(&self, topic: &str, event: &TaskEvent) -> Result<(), EngineError>;

    /// Register a handler for every future delivery on a topic.
    async fn subscribe(&self, topic: &str, handler: Arc<dyn EventHandler>);
}

/// A message the broker gave up on after exhausting redeliveries. Kept for
/// manual inspection; automatic poison-message handling is a non-goal.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub topic: String,
    pub handler: String,
    pub event: TaskEvent,
    pub deliveries: u32,
}
