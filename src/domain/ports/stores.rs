//! Store ports for the four durable tables.
//!
//! The relational store is the sole owner of durable state. Uniqueness
//! constraints enforced here (audit `event_id`, the recurrence instance
//! lookup) are what make consumer effects safe under arbitrary concurrency
//! and redelivery.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::EngineResult;
use crate::domain::models::{AuditLogEntry, EventType, RecurrenceRule, Reminder, ReminderStatus, Task};

/// Task rows, as far as the engine needs them.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn insert(&self, task: &Task) -> EngineResult<()>;

    async fn get(&self, id: Uuid) -> EngineResult<Option<Task>>;

    /// Durable idempotency lookup for the recurrence generator: an
    /// uncompleted instance of `recurrence_id` for `user_id` due exactly at
    /// `due_date`.
    async fn find_recurrence_instance(
        &self,
        recurrence_id: Uuid,
        user_id: &str,
        due_date: DateTime<Utc>,
    ) -> EngineResult<Option<Task>>;
}

/// Recurrence rule rows.
#[async_trait]
pub trait RecurrenceStore: Send + Sync {
    async fn insert(&self, rule: &RecurrenceRule) -> EngineResult<()>;

    async fn get(&self, id: Uuid) -> EngineResult<Option<RecurrenceRule>>;

    /// Advance `next_due_at`. Monotonic: implementations must not move the
    /// timestamp backwards on redelivered events.
    async fn advance_next_due(&self, id: Uuid, next_due_at: DateTime<Utc>) -> EngineResult<()>;
}

/// Reminder rows.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    async fn insert(&self, reminder: &Reminder) -> EngineResult<()>;

    async fn get(&self, id: Uuid) -> EngineResult<Option<Reminder>>;

    async fn update_status(&self, id: Uuid, status: ReminderStatus) -> EngineResult<()>;

    async fn record_delivery(
        &self,
        id: Uuid,
        status: ReminderStatus,
        attempt_count: u32,
        sent_at: Option<DateTime<Utc>>,
    ) -> EngineResult<()>;

    /// Pending reminders due at or before `until`, the sweep's work list.
    async fn due_pending(&self, until: DateTime<Utc>) -> EngineResult<Vec<Reminder>>;
}

/// Append-only audit rows.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Insert under the UNIQUE(event_id) constraint. Returns `true` when
    /// the row was written, `false` when an entry for this event already
    /// existed (the at-least-once duplicate path).
    async fn insert(&self, entry: &AuditLogEntry) -> EngineResult<bool>;

    async fn get_by_event_id(&self, event_id: Uuid) -> EngineResult<Option<AuditLogEntry>>;

    async fn list_for_user(
        &self,
        user_id: &str,
        event_type: Option<EventType>,
        limit: u32,
    ) -> EngineResult<Vec<AuditLogEntry>>;

    async fn list_for_task(&self, task_id: Uuid) -> EngineResult<Vec<AuditLogEntry>>;

    async fn count(&self) -> EngineResult<u64>;
}
