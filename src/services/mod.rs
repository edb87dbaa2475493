//! Service layer: the publish path and the four consumers.

pub mod audit_logger;
pub mod broadcaster;
pub mod idempotency;
pub mod publisher;
pub mod recurrence;
pub mod recurrence_generator;
pub mod reminder_notifier;
pub mod reminder_scheduler;

pub use audit_logger::{AuditLogger, AuditOutcome};
pub use broadcaster::{Connection, ConnectionRegistry, LiveUpdateBroadcaster};
pub use idempotency::{creation_key, GuardOutcome, IdempotencyGuard};
pub use publisher::EventPublisher;
pub use recurrence::create_rule;
pub use recurrence_generator::{GenerationOutcome, RecurrenceGenerator};
pub use reminder_notifier::{FireOutcome, ReminderNotifier};
pub use reminder_scheduler::{parse_offset, ReminderScheduler};
