//! Reminder scheduling: offset parsing, fire-time validation, and the
//! sweep loop that stands in for a durable job scheduler.
//!
//! The persisted `pending` row is the source of truth for when a reminder
//! fires. The in-memory timer here is just a cache of it: a tick loop
//! sweeps `pending` rows whose `fire_at` falls inside the next window and
//! hands them to the notifier. After a process restart the sweep re-derives
//! everything from the store, including reminders whose fire time passed
//! while the process was down (firing late beats never; the fire path
//! drops obsolete ones anyway).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{Reminder, ReminderConfig, Task};
use crate::domain::ports::ReminderStore;
use crate::services::reminder_notifier::ReminderNotifier;

/// Parse a natural-language reminder offset ("30 minutes before",
/// "1 hour before", "2 days before") into a duration before the due date.
pub fn parse_offset(offset: &str) -> Option<chrono::Duration> {
    let lowered = offset.trim().to_lowercase();
    let rest = lowered.strip_suffix("before")?.trim_end();

    let mut parts = rest.split_whitespace();
    let amount: i64 = parts.next()?.parse().ok()?;
    let unit = parts.next()?;
    if parts.next().is_some() || amount < 1 {
        return None;
    }

    match unit {
        "minute" | "minutes" => Some(chrono::Duration::minutes(amount)),
        "hour" | "hours" => Some(chrono::Duration::hours(amount)),
        "day" | "days" => Some(chrono::Duration::days(amount)),
        _ => None,
    }
}

pub struct ReminderScheduler {
    reminders: Arc<dyn ReminderStore>,
    notifier: Arc<ReminderNotifier>,
    config: ReminderConfig,
    running: Arc<AtomicBool>,
}

impl ReminderScheduler {
    pub fn new(
        reminders: Arc<dyn ReminderStore>,
        notifier: Arc<ReminderNotifier>,
        config: ReminderConfig,
    ) -> Self {
        Self {
            reminders,
            notifier,
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Schedule a reminder for a task at `offset` before its due date.
    /// Rejected synchronously when the offset is malformed or the computed
    /// fire time is already past (unless `allow_past`), so the boundary
    /// that asked can report the problem immediately.
    pub async fn schedule_for_task(
        &self,
        task: &Task,
        offset: &str,
        allow_past: bool,
    ) -> EngineResult<Reminder> {
        let due_date = task.due_date.ok_or_else(|| {
            EngineError::Validation(format!("task {} has no due date to remind about", task.id))
        })?;
        let offset_duration =
            parse_offset(offset).ok_or_else(|| EngineError::InvalidOffset(offset.to_string()))?;

        self.schedule_at(task, due_date - offset_duration, allow_past)
            .await
    }

    /// Schedule a reminder at an explicit fire time.
    pub async fn schedule_at(
        &self,
        task: &Task,
        fire_at: DateTime<Utc>,
        allow_past: bool,
    ) -> EngineResult<Reminder> {
        if fire_at < Utc::now() && !allow_past {
            return Err(EngineError::FireTimeInPast { fire_at });
        }

        let reminder = Reminder::new(task.id, task.user_id.clone(), fire_at);
        self.reminders.insert(&reminder).await?;

        info!(
            reminder_id = %reminder.id,
            task_id = %task.id,
            fire_at = %fire_at,
            "scheduled reminder"
        );
        Ok(reminder)
    }

    /// Fire every pending reminder due inside the current window. Returns
    /// how many were handed to the notifier.
    pub async fn sweep_once(&self) -> EngineResult<usize> {
        let until = Utc::now()
            + chrono::Duration::seconds(i64::try_from(self.config.sweep_lookahead_secs).unwrap_or(0));
        let due = self.reminders.due_pending(until).await?;
        let count = due.len();

        let firings = due.into_iter().map(|reminder| {
            debug!(reminder_id = %reminder.id, fire_at = %reminder.fire_at, "sweep firing reminder");
            let notifier = self.notifier.clone();
            async move {
                if let Err(err) = notifier.fire(reminder.id).await {
                    // The row stays pending on a store error and the next
                    // sweep retries it; delivery failures are terminal
                    // inside fire().
                    warn!(reminder_id = %reminder.id, "reminder fire failed: {}", err);
                }
            }
        });
        futures::future::join_all(firings).await;
        Ok(count)
    }

    /// Start the sweep tick loop. Returns a JoinHandle that can be aborted
    /// on shutdown.
    pub fn start(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);

        let scheduler = self.clone();
        let tick = Duration::from_millis(self.config.sweep_interval_ms);

        tokio::spawn(async move {
            info!("reminder sweep started");
            while scheduler.running.load(Ordering::SeqCst) {
                tokio::time::sleep(tick).await;
                if let Err(err) = scheduler.sweep_once().await {
                    warn!("reminder sweep pass failed: {}", err);
                }
            }
            info!("reminder sweep stopped");
        })
    }

    /// Stop the sweep loop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_offset_shapes() {
        assert_eq!(
            parse_offset("30 minutes before"),
            Some(chrono::Duration::minutes(30))
        );
        assert_eq!(parse_offset("1 hour before"), Some(chrono::Duration::hours(1)));
        assert_eq!(parse_offset("2 days before"), Some(chrono::Duration::days(2)));
        assert_eq!(parse_offset("1 minute before"), Some(chrono::Duration::minutes(1)));
        assert_eq!(
            parse_offset("  45 Minutes BEFORE "),
            Some(chrono::Duration::minutes(45))
        );
    }

    #[test]
    fn test_parse_offset_rejects_garbage() {
        assert_eq!(parse_offset(""), None);
        assert_eq!(parse_offset("soon"), None);
        assert_eq!(parse_offset("minutes before"), None);
        assert_eq!(parse_offset("3 fortnights before"), None);
        assert_eq!(parse_offset("0 minutes before"), None);
        assert_eq!(parse_offset("-5 minutes before"), None);
        assert_eq!(parse_offset("5 minutes after"), None);
        assert_eq!(parse_offset("5 5 minutes before"), None);
    }
}
