//! SQLite adapters for the store ports.

pub mod audit_store;
pub mod connection;
pub mod migrations;
pub mod recurrence_store;
pub mod reminder_store;
pub mod task_store;

pub use audit_store::SqliteAuditStore;
pub use connection::{create_pool, create_test_pool, verify_connection, ConnectionError, PoolConfig};
pub use migrations::{all_embedded_migrations, create_migrated_test_pool, Migration, Migrator};
pub use recurrence_store::SqliteRecurrenceStore;
pub use reminder_store::SqliteReminderStore;
pub use task_store::SqliteTaskStore;
