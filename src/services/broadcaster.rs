//! Live-update broadcaster and its connection registry.
//!
//! The registry maps users to their live connections. It is ephemeral by
//! design: rebuilt empty on process restart, never a source of truth. The
//! broadcaster consumer fans each `task-updates` event out to the owning
//! user's connections. No idempotency guard here — duplicate pushes to an
//! open UI are harmless because clients reconcile by `task_id`, so this
//! consumer deliberately omits the dedup machinery the other three need.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{BroadcasterConfig, LiveUpdate, TaskEvent};
use crate::domain::ports::{EventHandler, HandlerOutcome};

/// One live connection's send side, held by the registry.
struct ConnectionHandle {
    id: Uuid,
    sender: UnboundedSender<LiveUpdate>,
}

/// Handle returned to the transport layer on registration.
#[derive(Debug)]
pub struct Connection {
    pub id: Uuid,
    pub user_id: String,
    pub updates: UnboundedReceiver<LiveUpdate>,
}

/// In-memory map of `user_id` to live connections, with a per-user cap and
/// an admission rate limit so one client cannot spam reconnects.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, Vec<ConnectionHandle>>>,
    max_per_user: usize,
    admissions: DefaultKeyedRateLimiter<String>,
}

impl ConnectionRegistry {
    pub fn new(config: &BroadcasterConfig) -> Self {
        let per_minute =
            NonZeroU32::new(config.connections_per_minute).unwrap_or(NonZeroU32::MIN);
        Self {
            connections: RwLock::new(HashMap::new()),
            max_per_user: config.max_connections_per_user as usize,
            admissions: RateLimiter::keyed(Quota::per_minute(per_minute)),
        }
    }

    /// Register a live connection for `user_id`. Called by the real-time
    /// transport when a client connects.
    pub async fn register(&self, user_id: &str) -> EngineResult<Connection> {
        let mut connections = self.connections.write().await;
        let existing = connections.entry(user_id.to_string()).or_default();
        existing.retain(|c| !c.sender.is_closed());

        if existing.len() >= self.max_per_user {
            return Err(EngineError::ConnectionRejected(format!(
                "maximum connections ({}) reached for user",
                self.max_per_user
            )));
        }
        if self.admissions.check_key(&user_id.to_string()).is_err() {
            return Err(EngineError::ConnectionRejected(
                "connection rate limit exceeded, wait before reconnecting".to_string(),
            ));
        }

        let (sender, updates) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        existing.push(ConnectionHandle { id, sender });

        info!(
            user_id,
            connection_id = %id,
            active = existing.len(),
            "live connection registered"
        );
        Ok(Connection {
            id,
            user_id: user_id.to_string(),
            updates,
        })
    }

    /// Drop a connection. Called by the transport on disconnect.
    pub async fn deregister(&self, user_id: &str, connection_id: Uuid) {
        let mut connections = self.connections.write().await;
        if let Some(handles) = connections.get_mut(user_id) {
            handles.retain(|c| c.id != connection_id);
            if handles.is_empty() {
                connections.remove(user_id);
            }
        }
        info!(user_id, connection_id = %connection_id, "live connection deregistered");
    }

    pub async fn connection_count(&self, user_id: &str) -> usize {
        self.connections
            .read()
            .await
            .get(user_id)
            .map_or(0, Vec::len)
    }

    pub async fn active_users(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Push an update to every live connection of one user. Returns how
    /// many connections received it; zero is a normal no-op, not an error.
    /// Dead connections discovered on send are pruned.
    pub async fn broadcast_to_user(&self, user_id: &str, update: &LiveUpdate) -> usize {
        let mut connections = self.connections.write().await;
        let Some(handles) = connections.get_mut(user_id) else {
            return 0;
        };

        let mut delivered = 0;
        handles.retain(|handle| match handle.sender.send(update.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(_) => {
                debug!(user_id, connection_id = %handle.id, "pruning closed connection");
                false
            }
        });
        if handles.is_empty() {
            connections.remove(user_id);
        }
        delivered
    }
}

/// The `task-updates` consumer.
pub struct LiveUpdateBroadcaster {
    registry: Arc<ConnectionRegistry>,
}

impl LiveUpdateBroadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> Arc<ConnectionRegistry> {
        self.registry.clone()
    }
}

#[async_trait]
impl EventHandler for LiveUpdateBroadcaster {
    fn name(&self) -> &str {
        "live-update-broadcaster"
    }

    async fn handle(&self, event: &TaskEvent) -> HandlerOutcome {
        let update = LiveUpdate::from_event(event);
        let delivered = self
            .registry
            .broadcast_to_user(&event.user_id, &update)
            .await;

        if delivered > 0 {
            debug!(
                user_id = %event.user_id,
                event_id = %event.event_id,
                delivered,
                "broadcast live update"
            );
        }
        HandlerOutcome::Ack
    }
}
