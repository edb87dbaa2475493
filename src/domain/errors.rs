//! Domain errors for the lifecycle engine.
//!
//! Duplicate and obsolete outcomes are deliberately absent here: an
//! idempotency check finding prior work is a terminal success path, modeled
//! as handler/service return values, never as an error.

use thiserror::Error;
use uuid::Uuid;

use super::models::RecurrencePattern;

/// Errors that can occur in the lifecycle engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("Reminder not found: {0}")]
    ReminderNotFound(Uuid),

    #[error("Recurrence rule not found: {0}")]
    RecurrenceRuleNotFound(Uuid),

    /// Rejected at rule creation, never at generation time.
    #[error("Invalid {pattern} interval: {interval}. Must be between {min} and {max}")]
    InvalidInterval {
        pattern: RecurrencePattern,
        interval: u32,
        min: u32,
        max: u32,
    },

    /// Rejected at scheduling time unless the caller explicitly overrides.
    #[error("Reminder fire time {fire_at} is in the past")]
    FireTimeInPast { fire_at: chrono::DateTime<chrono::Utc> },

    #[error("Invalid reminder offset: {0:?}. Use a format like '30 minutes before', '1 hour before', or '2 days before'")]
    InvalidOffset(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    /// Publish failure after bounded retries. Must reach the mutation
    /// boundary; the task mutation has committed and the missing event
    /// needs reconciliation.
    #[error("Failed to publish to '{topic}' after {attempts} attempts: {reason}")]
    PublishFailed {
        topic: String,
        attempts: u32,
        reason: String,
    },

    #[error("Broker error: {0}")]
    Broker(String),

    #[error("Notification delivery failed: {0}")]
    Notification(String),

    #[error("Connection rejected: {0}")]
    ConnectionRejected(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        EngineError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}
