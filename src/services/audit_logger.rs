//! Audit logger: the consumer that records every lifecycle event exactly
//! once.
//!
//! The write path is a single uniqueness-constrained insert. A violated
//! constraint means the broker redelivered an event we already recorded —
//! the expected outcome of at-least-once delivery doing its job, logged
//! and acknowledged, never an error.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::domain::errors::EngineResult;
use crate::domain::models::{AuditLogEntry, TaskEvent};
use crate::domain::ports::{AuditStore, EventHandler, HandlerOutcome};

/// What recording one event produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOutcome {
    /// First sighting; the entry was written.
    Recorded,
    /// An entry for this `event_id` already existed.
    Duplicate,
}

pub struct AuditLogger {
    store: Arc<dyn AuditStore>,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Record one envelope. Idempotent per `event_id` regardless of how
    /// many times the broker redelivers it.
    pub async fn record(&self, event: &TaskEvent) -> EngineResult<AuditOutcome> {
        let entry = AuditLogEntry::from_event(event);

        if self.store.insert(&entry).await? {
            info!(
                event_id = %event.event_id,
                event_type = %event.event_type,
                task_id = %event.task_id,
                user_id = %event.user_id,
                "audit entry recorded"
            );
            Ok(AuditOutcome::Recorded)
        } else {
            debug!(
                event_id = %event.event_id,
                "audit entry already exists, acknowledging duplicate delivery"
            );
            Ok(AuditOutcome::Duplicate)
        }
    }
}

#[async_trait]
impl EventHandler for AuditLogger {
    fn name(&self) -> &str {
        "audit-logger"
    }

    async fn handle(&self, event: &TaskEvent) -> HandlerOutcome {
        match self.record(event).await {
            Ok(_) => HandlerOutcome::Ack,
            Err(err) => {
                // The store owns the only durable dedup guarantee, so an
                // audit write is never abandoned: redeliver until it lands
                // or the broker dead-letters it.
                warn!(
                    event_id = %event.event_id,
                    "audit write failed, requesting redelivery: {}",
                    err
                );
                HandlerOutcome::Retry
            }
        }
    }
}
