//! Task lifecycle event envelope.
//!
//! A [`TaskEvent`] is the immutable wire format for everything the engine
//! publishes. Envelopes are constructed once at publish time and never
//! mutated by consumers; delivery is at-least-once and may arrive out of
//! order, so consumers key their idempotency checks on `event_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current envelope schema version.
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Unique identifier for an event. The idempotency key for consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of lifecycle fact an envelope describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "task.created")]
    TaskCreated,
    #[serde(rename = "task.updated")]
    TaskUpdated,
    #[serde(rename = "task.completed")]
    TaskCompleted,
    #[serde(rename = "task.deleted")]
    TaskDeleted,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaskCreated => "task.created",
            Self::TaskUpdated => "task.updated",
            Self::TaskCompleted => "task.completed",
            Self::TaskDeleted => "task.deleted",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "task.created" => Some(Self::TaskCreated),
            "task.updated" => Some(Self::TaskUpdated),
            "task.completed" => Some(Self::TaskCompleted),
            "task.deleted" => Some(Self::TaskDeleted),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where an event originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    /// Direct API mutation.
    Api,
    /// Tool invocation from the upstream agent.
    AgentTool,
    /// Generated by the recurrence consumer.
    Recurrence,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::AgentTool => "agent_tool",
            Self::Recurrence => "recurrence",
        }
    }
}

/// Task state as of emission time, carried inside the envelope so consumers
/// never need a read-back to act.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub completed: bool,
    pub priority: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_id: Option<Uuid>,
}

/// One task-lifecycle fact, immutable once published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    pub event_id: EventId,
    pub event_type: EventType,
    pub task_id: Uuid,
    pub user_id: String,
    pub task_snapshot: TaskSnapshot,
    /// Changed fields before the mutation, for `task.updated` and
    /// `task.completed` events. Absent on create/delete.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<serde_json::Value>,
    pub occurred_at: DateTime<Utc>,
    pub source: EventSource,
    pub correlation_id: Uuid,
    pub schema_version: String,
}

impl TaskEvent {
    /// Build a fresh envelope for a mutation. `event_id` and
    /// `correlation_id` are generated here; `occurred_at` is producer
    /// wall-clock time.
    pub fn new(
        event_type: EventType,
        task_id: Uuid,
        user_id: impl Into<String>,
        task_snapshot: TaskSnapshot,
        source: EventSource,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            event_type,
            task_id,
            user_id: user_id.into(),
            task_snapshot,
            previous: None,
            occurred_at: Utc::now(),
            source,
            correlation_id: Uuid::new_v4(),
            schema_version: SCHEMA_VERSION.to_string(),
        }
    }

    pub fn with_previous(mut self, previous: serde_json::Value) -> Self {
        self.previous = Some(previous);
        self
    }
}

/// Compact payload pushed to live connections. Clients reconcile by
/// `task_id`, so duplicate pushes are harmless.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveUpdate {
    pub update_type: EventType,
    pub event_id: EventId,
    pub task_id: Uuid,
    pub user_id: String,
    /// Full snapshot for create/update, absent for deletes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_snapshot: Option<TaskSnapshot>,
    pub source: EventSource,
    pub occurred_at: DateTime<Utc>,
    pub schema_version: String,
}

impl LiveUpdate {
    /// Derive the compact broadcast payload from a full envelope.
    pub fn from_event(event: &TaskEvent) -> Self {
        let task_snapshot = match event.event_type {
            EventType::TaskDeleted => None,
            _ => Some(event.task_snapshot.clone()),
        };
        Self {
            update_type: event.event_type,
            event_id: event.event_id,
            task_id: event.task_id,
            user_id: event.user_id.clone(),
            task_snapshot,
            source: event.source,
            occurred_at: event.occurred_at,
            schema_version: event.schema_version.clone(),
        }
    }
}
