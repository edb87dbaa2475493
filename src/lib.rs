//! Metronome - event-driven task lifecycle engine.
//!
//! When a task is created, updated, completed, or deleted, the external
//! CRUD/chat layer publishes a lifecycle event through [`services::EventPublisher`].
//! Four independent consumers react to it over an at-least-once broker:
//!
//! - **Recurrence generator**: spawns the next instance of a recurring
//!   task on `task.completed`, idempotently.
//! - **Reminder scheduler/notifier**: schedules future notifications and
//!   delivers them with bounded retry, cancelling obsolete ones at fire
//!   time.
//! - **Audit logger**: records every event exactly once per event id via a
//!   store uniqueness constraint.
//! - **Live-update broadcaster**: fans task updates out to the owning
//!   user's live connections.
//!
//! # Architecture
//!
//! The crate follows a hexagonal layout:
//!
//! - **Domain** (`domain`): models, ports (trait seams), and errors
//! - **Services** (`services`): the publish path and the four consumers
//! - **Adapters** (`adapters`): broker and SQLite implementations of the
//!   ports
//! - **Infrastructure** (`infrastructure`): config, logging, retry, and
//!   outbound webhook delivery
//!
//! Delivery is at-least-once and unordered; correctness comes from
//! idempotent effects (uniqueness-constrained inserts, monotonic cursor
//! advances, fire-time status checks), never from delivery guarantees.

pub mod adapters;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{EngineError, EngineResult};
pub use domain::models::{
    AuditLogEntry, Config, EventId, EventSource, EventType, LiveUpdate, RecurrencePattern,
    RecurrenceRule, Reminder, ReminderStatus, Task, TaskEvent, TaskPriority, TaskSnapshot,
};
pub use domain::ports::{
    BrokerClient, EventHandler, HandlerOutcome, NotificationSender, TOPIC_TASK_EVENTS,
    TOPIC_TASK_UPDATES,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    AuditLogger, ConnectionRegistry, EventPublisher, LiveUpdateBroadcaster, RecurrenceGenerator,
    ReminderNotifier, ReminderScheduler,
};
