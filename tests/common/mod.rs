//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use metronome::adapters::broker::InProcessBroker;
use metronome::adapters::sqlite::{
    create_migrated_test_pool, SqliteAuditStore, SqliteRecurrenceStore, SqliteReminderStore,
    SqliteTaskStore,
};
use metronome::domain::models::{
    BrokerConfig, DedupConfig, RecurrencePattern, RecurrenceRule, ReminderConfig, Task,
};
use metronome::domain::ports::{
    NotificationPayload, NotificationSender, RecurrenceStore, TaskStore,
};
use metronome::infrastructure::RetryPolicy;
use metronome::services::{create_rule, EventPublisher};
use metronome::{EngineError, EngineResult};

/// Notification sender that records payloads and can be scripted to fail
/// the first N attempts.
pub struct StubNotifier {
    pub sent: Mutex<Vec<NotificationPayload>>,
    fail_first: AtomicU32,
}

impl Default for StubNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl StubNotifier {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_first: AtomicU32::new(0),
        }
    }

    pub fn failing(times: u32) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_first: AtomicU32::new(times),
        }
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationSender for StubNotifier {
    async fn send(&self, payload: &NotificationPayload) -> EngineResult<()> {
        if self.fail_first.load(Ordering::SeqCst) > 0 {
            self.fail_first.fetch_sub(1, Ordering::SeqCst);
            return Err(EngineError::Notification("webhook timed out".to_string()));
        }
        self.sent.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

/// Fully wired engine over an in-memory database and in-process broker,
/// with backoffs shrunk so retry paths settle in milliseconds.
pub struct Harness {
    pub pool: SqlitePool,
    pub tasks: Arc<SqliteTaskStore>,
    pub rules: Arc<SqliteRecurrenceStore>,
    pub reminders: Arc<SqliteReminderStore>,
    pub audit: Arc<SqliteAuditStore>,
    pub broker: Arc<InProcessBroker>,
    pub publisher: Arc<EventPublisher>,
}

pub fn fast_reminder_config() -> ReminderConfig {
    ReminderConfig {
        delivery_max_attempts: 3,
        delivery_initial_backoff_ms: 1,
        delivery_max_backoff_ms: 4,
        webhook_timeout_secs: 1,
        sweep_interval_ms: 100,
        sweep_lookahead_secs: 1,
    }
}

pub async fn harness() -> Harness {
    let pool = create_migrated_test_pool().await.expect("test pool");
    let tasks = Arc::new(SqliteTaskStore::new(pool.clone()));
    let rules = Arc::new(SqliteRecurrenceStore::new(pool.clone()));
    let reminders = Arc::new(SqliteReminderStore::new(pool.clone()));
    let audit = Arc::new(SqliteAuditStore::new(pool.clone()));
    let broker = Arc::new(InProcessBroker::new(BrokerConfig::default()));
    let publisher = Arc::new(EventPublisher::new(
        broker.clone(),
        RetryPolicy::new(3, 1, 4),
        &DedupConfig {
            creation_ttl_secs: 30,
        },
    ));

    Harness {
        pool,
        tasks,
        rules,
        reminders,
        audit,
        broker,
        publisher,
    }
}

impl Harness {
    /// Insert a recurring task and its rule, due at `due`.
    pub async fn recurring_task(
        &self,
        user_id: &str,
        title: &str,
        pattern: RecurrencePattern,
        interval: u32,
        due: DateTime<Utc>,
    ) -> (Task, RecurrenceRule) {
        let mut task = Task::new(user_id, title).with_due_date(due);
        let rule = create_rule(task.id, pattern, interval).expect("valid rule");
        task.recurrence_id = Some(rule.id);

        self.tasks.insert(&task).await.expect("insert task");
        self.rules.insert(&rule).await.expect("insert rule");
        (task, rule)
    }

    /// Load every task row for a user. Test-only shortcut around the
    /// store port.
    pub async fn tasks_for_user(&self, user_id: &str) -> Vec<Uuid> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT id FROM tasks WHERE user_id = ? ORDER BY created_at")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
                .expect("query tasks");
        rows.iter()
            .map(|(id,)| Uuid::parse_str(id).expect("uuid"))
            .collect()
    }
}

/// Let spawned broker workers drain their queues.
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(400)).await;
}
