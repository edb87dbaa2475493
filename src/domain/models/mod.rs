//! Domain models: the leaf data types of the lifecycle engine.

pub mod audit;
pub mod config;
pub mod event;
pub mod recurrence;
pub mod reminder;
pub mod task;

pub use audit::AuditLogEntry;
pub use config::{
    BroadcasterConfig, BrokerConfig, Config, DatabaseConfig, DedupConfig, LoggingConfig,
    ReminderConfig,
};
pub use event::{
    EventId, EventSource, EventType, LiveUpdate, TaskEvent, TaskSnapshot, SCHEMA_VERSION,
};
pub use recurrence::{RecurrencePattern, RecurrenceRule};
pub use reminder::{Reminder, ReminderStatus};
pub use task::{Task, TaskPriority};
