//! Ports: the trait seams the engine is wired through.

pub mod broker;
pub mod notifier;
pub mod stores;

pub use broker::{
    BrokerClient, DeadLetter, EventHandler, HandlerOutcome, TOPIC_TASK_EVENTS, TOPIC_TASK_UPDATES,
};
pub use notifier::{NotificationPayload, NotificationSender};
pub use stores::{AuditStore, RecurrenceStore, ReminderStore, TaskStore};
