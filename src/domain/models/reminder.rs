//! Reminder model.
//!
//! A reminder is a scheduled notification for a task with a due date. The
//! persisted row is the source of truth for when it fires; any in-memory
//! timer is a cache rebuilt from `pending` rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery state of a reminder.
///
/// `pending -> sent` on successful delivery, `pending -> failed` after
/// exhausting retries, any state `-> cancelled` when the task is completed
/// or deleted before firing. `sent`, `failed`, and `cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    Pending,
    Sent,
    Failed,
    Cancelled,
}

impl Default for ReminderStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl ReminderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "sent" => Some(Self::Sent),
            "failed" => Some(Self::Failed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for ReminderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A scheduled notification row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: Uuid,
    pub task_id: Uuid,
    pub user_id: String,
    pub fire_at: DateTime<Utc>,
    pub status: ReminderStatus,
    pub attempt_count: u32,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Reminder {
    pub fn new(task_id: Uuid, user_id: impl Into<String>, fire_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            user_id: user_id.into(),
            fire_at,
            status: ReminderStatus::Pending,
            attempt_count: 0,
            sent_at: None,
            created_at: Utc::now(),
        }
    }
}
