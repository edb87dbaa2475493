//! Reminder firing: obsolescence check, delivery with retry, terminal
//! status transitions.
//!
//! The fire-time status check is the authoritative cancellation mechanism:
//! a reminder whose task was completed or deleted after scheduling is
//! transitioned to `cancelled` here, with no notification sent. Active
//! cross-process cancellation of a scheduled job is unreliable; the row
//! check is not.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{ReminderConfig, ReminderStatus};
use crate::domain::ports::{NotificationPayload, NotificationSender, ReminderStore, TaskStore};
use crate::infrastructure::retry::RetryPolicy;

/// What firing one reminder produced. Every variant is a handled outcome;
/// only store errors escape as `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// Notification delivered; reminder is `sent`.
    Delivered,
    /// The reminder was already in a terminal state (duplicate trigger).
    AlreadyTerminal,
    /// The task was completed or deleted first; reminder is `cancelled`
    /// and nothing was sent.
    Cancelled,
    /// Delivery exhausted its attempts; reminder is `failed` and will not
    /// be re-queued.
    Failed,
}

pub struct ReminderNotifier {
    reminders: Arc<dyn ReminderStore>,
    tasks: Arc<dyn TaskStore>,
    sender: Arc<dyn NotificationSender>,
    retry: RetryPolicy,
}

impl ReminderNotifier {
    pub fn new(
        reminders: Arc<dyn ReminderStore>,
        tasks: Arc<dyn TaskStore>,
        sender: Arc<dyn NotificationSender>,
        config: &ReminderConfig,
    ) -> Self {
        Self {
            reminders,
            tasks,
            sender,
            retry: RetryPolicy::new(
                config.delivery_max_attempts,
                config.delivery_initial_backoff_ms,
                config.delivery_max_backoff_ms,
            ),
        }
    }

    /// Fire a reminder by id. Safe to call more than once and safe to call
    /// for reminders whose task has moved on.
    pub async fn fire(&self, reminder_id: Uuid) -> EngineResult<FireOutcome> {
        let Some(reminder) = self.reminders.get(reminder_id).await? else {
            return Err(EngineError::ReminderNotFound(reminder_id));
        };

        if reminder.status.is_terminal() {
            info!(
                %reminder_id,
                status = %reminder.status,
                "reminder already settled, skipping"
            );
            return Ok(FireOutcome::AlreadyTerminal);
        }

        let task = self.tasks.get(reminder.task_id).await?;
        let obsolete = match &task {
            None => true,
            Some(task) => task.completed,
        };
        if obsolete {
            self.reminders
                .update_status(reminder_id, ReminderStatus::Cancelled)
                .await?;
            info!(
                %reminder_id,
                task_id = %reminder.task_id,
                "task completed or deleted before fire time, reminder cancelled"
            );
            return Ok(FireOutcome::Cancelled);
        }

        let task = task.ok_or(EngineError::TaskNotFound(reminder.task_id))?;
        let payload = NotificationPayload {
            reminder_id: reminder.id,
            task_id: task.id,
            user_id: reminder.user_id.clone(),
            task_title: task.title.clone(),
            task_description: task.description.clone(),
            due_date: task.due_date,
            fire_at: reminder.fire_at,
            message: match task.due_date {
                Some(due) => format!("Reminder: {} is due at {}", task.title, due.to_rfc3339()),
                None => format!("Reminder: {}", task.title),
            },
        };

        let (attempts, result) = self
            .retry
            .execute(|| {
                let payload = payload.clone();
                async move { self.sender.send(&payload).await }
            })
            .await;

        match result {
            Ok(()) => {
                self.reminders
                    .record_delivery(
                        reminder_id,
                        ReminderStatus::Sent,
                        attempts,
                        Some(Utc::now()),
                    )
                    .await?;
                info!(%reminder_id, attempts, "reminder delivered");
                Ok(FireOutcome::Delivered)
            }
            Err(err) => {
                self.reminders
                    .record_delivery(reminder_id, ReminderStatus::Failed, attempts, None)
                    .await?;
                warn!(
                    %reminder_id,
                    attempts,
                    "reminder delivery failed permanently: {}",
                    err
                );
                Ok(FireOutcome::Failed)
            }
        }
    }
}
