//! Audit log model.
//!
//! Append-only record of processed lifecycle events. The UNIQUE constraint
//! on `event_id` is what converts at-least-once delivery into exactly-once
//! audit effect; a violated insert is the expected duplicate path, not an
//! error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::{EventType, TaskEvent};

/// One audited lifecycle fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    /// Dedup key: at most one entry exists per event id.
    pub event_id: Uuid,
    pub event_type: EventType,
    pub task_id: Uuid,
    pub user_id: String,
    pub details: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

impl AuditLogEntry {
    /// Build an entry from an envelope, enriching `details` per event type
    /// so the compliance surface can answer questions without re-parsing
    /// snapshots.
    pub fn from_event(event: &TaskEvent) -> Self {
        let snapshot = &event.task_snapshot;
        let mut details = serde_json::json!({
            "event_id": event.event_id.to_string(),
            "task_snapshot": snapshot,
            "original_timestamp": event.occurred_at.to_rfc3339(),
            "schema_version": event.schema_version,
            "correlation_id": event.correlation_id.to_string(),
            "source": event.source.as_str(),
        });

        match event.event_type {
            EventType::TaskCreated => {
                details["priority"] = serde_json::json!(snapshot.priority);
                details["has_due_date"] = serde_json::json!(snapshot.due_date.is_some());
                details["has_recurrence"] = serde_json::json!(snapshot.recurrence_id.is_some());
                details["tag_count"] = serde_json::json!(snapshot.tags.len());
            }
            EventType::TaskUpdated => {
                details["priority"] = serde_json::json!(snapshot.priority);
                details["has_due_date"] = serde_json::json!(snapshot.due_date.is_some());
                if let Some(previous) = &event.previous {
                    details["previous"] = previous.clone();
                }
            }
            // Recurrence flags let the compliance UI trace regeneration
            // chains for completed and deleted recurring tasks.
            EventType::TaskCompleted | EventType::TaskDeleted => {
                details["recurrence_id"] =
                    serde_json::json!(snapshot.recurrence_id.map(|id| id.to_string()));
                details["is_recurring_task"] = serde_json::json!(snapshot.recurrence_id.is_some());
            }
        }

        Self {
            id: Uuid::new_v4(),
            event_id: event.event_id.0,
            event_type: event.event_type,
            task_id: event.task_id,
            user_id: event.user_id.clone(),
            details,
            recorded_at: Utc::now(),
        }
    }
}
