//! Notification delivery port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::EngineResult;

/// Payload handed to the delivery channel when a reminder fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub reminder_id: Uuid,
    pub task_id: Uuid,
    pub user_id: String,
    pub task_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    pub fire_at: DateTime<Utc>,
    pub message: String,
}

/// One delivery attempt. The notifier wraps this in its retry policy; a
/// single call uses a bounded timeout and reports failure without retrying
/// internally.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, payload: &NotificationPayload) -> EngineResult<()>;
}
