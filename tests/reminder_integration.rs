//! Integration tests for reminder scheduling and delivery.
//!
//! Covers the scheduling validations, the fire-time obsolescence check
//! that doubles as cancellation, delivery retry exhaustion, and the sweep
//! loop that re-derives timers from pending rows.

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};

use common::{fast_reminder_config, harness, StubNotifier};
use metronome::domain::models::{ReminderStatus, Task};
use metronome::domain::ports::{ReminderStore, TaskStore};
use metronome::services::{FireOutcome, ReminderNotifier, ReminderScheduler};
use metronome::EngineError;

struct ReminderHarness {
    h: common::Harness,
    notifier: Arc<StubNotifier>,
    scheduler: Arc<ReminderScheduler>,
}

async fn reminder_harness(notifier: StubNotifier) -> ReminderHarness {
    let h = harness().await;
    let notifier = Arc::new(notifier);
    let fire = Arc::new(ReminderNotifier::new(
        h.reminders.clone(),
        h.tasks.clone(),
        notifier.clone(),
        &fast_reminder_config(),
    ));
    let scheduler = Arc::new(ReminderScheduler::new(
        h.reminders.clone(),
        fire,
        fast_reminder_config(),
    ));
    ReminderHarness {
        h,
        notifier,
        scheduler,
    }
}

// ---------------------------------------------------------------------------
// Scheduling: spec scenario 3 and the past-date rejections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_schedule_with_offset_creates_pending_row() {
    let rh = reminder_harness(StubNotifier::new()).await;
    let due = Utc::now() + Duration::hours(1);
    let task = Task::new("user-1", "Review presentation").with_due_date(due);
    rh.h.tasks.insert(&task).await.unwrap();

    let reminder = rh
        .scheduler
        .schedule_for_task(&task, "30 minutes before", false)
        .await
        .unwrap();

    assert_eq!(reminder.status, ReminderStatus::Pending);
    assert_eq!(reminder.fire_at, due - Duration::minutes(30));

    let stored = rh.h.reminders.get(reminder.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ReminderStatus::Pending);
    assert_eq!(stored.attempt_count, 0);
}

#[tokio::test]
async fn test_past_fire_time_rejected_without_override() {
    let rh = reminder_harness(StubNotifier::new()).await;
    // Due in 10 minutes with an hour offset puts the fire time in the past.
    let task = Task::new("user-1", "Too late").with_due_date(Utc::now() + Duration::minutes(10));
    rh.h.tasks.insert(&task).await.unwrap();

    let err = rh
        .scheduler
        .schedule_for_task(&task, "1 hour before", false)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::FireTimeInPast { .. }));

    // The explicit override schedules it anyway.
    let reminder = rh
        .scheduler
        .schedule_for_task(&task, "1 hour before", true)
        .await
        .unwrap();
    assert_eq!(reminder.status, ReminderStatus::Pending);
}

#[tokio::test]
async fn test_malformed_offset_rejected_synchronously() {
    let rh = reminder_harness(StubNotifier::new()).await;
    let task = Task::new("user-1", "Bad offset").with_due_date(Utc::now() + Duration::hours(2));
    rh.h.tasks.insert(&task).await.unwrap();

    let err = rh
        .scheduler
        .schedule_for_task(&task, "whenever", false)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidOffset(_)));
}

#[tokio::test]
async fn test_task_without_due_date_cannot_be_scheduled() {
    let rh = reminder_harness(StubNotifier::new()).await;
    let task = Task::new("user-1", "No deadline");
    rh.h.tasks.insert(&task).await.unwrap();

    let err = rh
        .scheduler
        .schedule_for_task(&task, "1 hour before", false)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

// ---------------------------------------------------------------------------
// Firing: delivery, obsolescence, retry exhaustion
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_fire_delivers_and_marks_sent() {
    let rh = reminder_harness(StubNotifier::new()).await;
    let due = Utc::now() + Duration::hours(1);
    let task = Task::new("user-1", "Review presentation").with_due_date(due);
    rh.h.tasks.insert(&task).await.unwrap();

    let reminder = rh
        .scheduler
        .schedule_at(&task, Utc::now() + Duration::seconds(1), false)
        .await
        .unwrap();

    let outcome = rh.scheduler_notifier().fire(reminder.id).await.unwrap();
    assert_eq!(outcome, FireOutcome::Delivered);

    let stored = rh.h.reminders.get(reminder.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ReminderStatus::Sent);
    assert_eq!(stored.attempt_count, 1);
    assert!(stored.sent_at.is_some());

    let sent = rh.notifier.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].task_title, "Review presentation");
    assert!(sent[0].message.contains("Review presentation"));
}

// Spec scenario 4: deleting the task before fire time cancels the reminder.
#[tokio::test]
async fn test_deleted_task_cancels_reminder_at_fire_time() {
    let rh = reminder_harness(StubNotifier::new()).await;
    let due = Utc::now() + Duration::hours(1);
    let task = Task::new("user-1", "Doomed").with_due_date(due);
    rh.h.tasks.insert(&task).await.unwrap();

    let reminder = rh
        .scheduler
        .schedule_at(&task, Utc::now() + Duration::seconds(1), false)
        .await
        .unwrap();

    rh.h.tasks.delete(task.id).await.unwrap();

    let outcome = rh.scheduler_notifier().fire(reminder.id).await.unwrap();
    assert_eq!(outcome, FireOutcome::Cancelled);

    let stored = rh.h.reminders.get(reminder.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ReminderStatus::Cancelled);
    assert_eq!(rh.notifier.sent_count(), 0);
}

#[tokio::test]
async fn test_completed_task_cancels_reminder_at_fire_time() {
    let rh = reminder_harness(StubNotifier::new()).await;
    let due = Utc::now() + Duration::hours(1);
    let task = Task::new("user-1", "Done early").with_due_date(due);
    rh.h.tasks.insert(&task).await.unwrap();

    let reminder = rh
        .scheduler
        .schedule_at(&task, Utc::now() + Duration::seconds(1), false)
        .await
        .unwrap();

    let mut completed = task.clone();
    completed.completed = true;
    rh.h.tasks.update(&completed).await.unwrap();

    let outcome = rh.scheduler_notifier().fire(reminder.id).await.unwrap();
    assert_eq!(outcome, FireOutcome::Cancelled);
    assert_eq!(rh.notifier.sent_count(), 0);
}

#[tokio::test]
async fn test_transient_failures_retried_then_delivered() {
    let rh = reminder_harness(StubNotifier::failing(2)).await;
    let task = Task::new("user-1", "Flaky webhook").with_due_date(Utc::now() + Duration::hours(1));
    rh.h.tasks.insert(&task).await.unwrap();

    let reminder = rh
        .scheduler
        .schedule_at(&task, Utc::now() + Duration::seconds(1), false)
        .await
        .unwrap();

    let outcome = rh.scheduler_notifier().fire(reminder.id).await.unwrap();
    assert_eq!(outcome, FireOutcome::Delivered);

    let stored = rh.h.reminders.get(reminder.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ReminderStatus::Sent);
    assert_eq!(stored.attempt_count, 3);
}

#[tokio::test]
async fn test_exhausted_delivery_is_terminal_failure() {
    let rh = reminder_harness(StubNotifier::failing(u32::MAX)).await;
    let task = Task::new("user-1", "Dead webhook").with_due_date(Utc::now() + Duration::hours(1));
    rh.h.tasks.insert(&task).await.unwrap();

    let reminder = rh
        .scheduler
        .schedule_at(&task, Utc::now() + Duration::seconds(1), false)
        .await
        .unwrap();

    let outcome = rh.scheduler_notifier().fire(reminder.id).await.unwrap();
    assert_eq!(outcome, FireOutcome::Failed);

    let stored = rh.h.reminders.get(reminder.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ReminderStatus::Failed);
    assert_eq!(stored.attempt_count, 3);

    // Failed is terminal: a duplicate trigger does not re-deliver.
    let again = rh.scheduler_notifier().fire(reminder.id).await.unwrap();
    assert_eq!(again, FireOutcome::AlreadyTerminal);
    assert_eq!(rh.notifier.sent_count(), 0);
}

// ---------------------------------------------------------------------------
// Sweep loop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_sweep_fires_due_reminders_and_leaves_future_ones() {
    let rh = reminder_harness(StubNotifier::new()).await;
    let task = Task::new("user-1", "Sweep me").with_due_date(Utc::now() + Duration::hours(2));
    rh.h.tasks.insert(&task).await.unwrap();

    let due_now = rh
        .scheduler
        .schedule_at(&task, Utc::now() - Duration::seconds(1), true)
        .await
        .unwrap();
    let due_later = rh
        .scheduler
        .schedule_at(&task, Utc::now() + Duration::hours(1), false)
        .await
        .unwrap();

    let fired = rh.scheduler.sweep_once().await.unwrap();
    assert_eq!(fired, 1);

    let now_row = rh.h.reminders.get(due_now.id).await.unwrap().unwrap();
    assert_eq!(now_row.status, ReminderStatus::Sent);
    let later_row = rh.h.reminders.get(due_later.id).await.unwrap().unwrap();
    assert_eq!(later_row.status, ReminderStatus::Pending);
}

#[tokio::test]
async fn test_sweep_loop_fires_on_its_own() {
    let rh = reminder_harness(StubNotifier::new()).await;
    let task = Task::new("user-1", "Background fire").with_due_date(Utc::now() + Duration::hours(1));
    rh.h.tasks.insert(&task).await.unwrap();

    rh.scheduler
        .schedule_at(&task, Utc::now(), true)
        .await
        .unwrap();

    let handle = rh.scheduler.start();
    tokio::time::sleep(std::time::Duration::from_millis(500)).await;
    rh.scheduler.stop();
    handle.abort();

    assert_eq!(rh.notifier.sent_count(), 1);
}

impl ReminderHarness {
    /// Fresh notifier sharing the harness stores and stub sender.
    fn scheduler_notifier(&self) -> ReminderNotifier {
        ReminderNotifier::new(
            self.h.reminders.clone(),
            self.h.tasks.clone(),
            self.notifier.clone(),
            &fast_reminder_config(),
        )
    }
}
