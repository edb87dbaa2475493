//! SQLite implementation of the ReminderStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{Reminder, ReminderStatus};
use crate::domain::ports::ReminderStore;

use super::task_store::{parse_datetime, parse_uuid};

#[derive(Clone)]
pub struct SqliteReminderStore {
    pool: SqlitePool,
}

impl SqliteReminderStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReminderStore for SqliteReminderStore {
    async fn insert(&self, reminder: &Reminder) -> EngineResult<()> {
        sqlx::query(
            r#"INSERT INTO reminders (id, task_id, user_id, fire_at, status, attempt_count,
               sent_at, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(reminder.id.to_string())
        .bind(reminder.task_id.to_string())
        .bind(&reminder.user_id)
        .bind(reminder.fire_at.to_rfc3339())
        .bind(reminder.status.as_str())
        .bind(i64::from(reminder.attempt_count))
        .bind(reminder.sent_at.map(|t| t.to_rfc3339()))
        .bind(reminder.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> EngineResult<Option<Reminder>> {
        let row: Option<ReminderRow> = sqlx::query_as("SELECT * FROM reminders WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Reminder::try_from).transpose()
    }

    async fn update_status(&self, id: Uuid, status: ReminderStatus) -> EngineResult<()> {
        let result = sqlx::query("UPDATE reminders SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(EngineError::ReminderNotFound(id));
        }
        Ok(())
    }

    async fn record_delivery(
        &self,
        id: Uuid,
        status: ReminderStatus,
        attempt_count: u32,
        sent_at: Option<DateTime<Utc>>,
    ) -> EngineResult<()> {
        let result = sqlx::query(
            "UPDATE reminders SET status = ?, attempt_count = ?, sent_at = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(i64::from(attempt_count))
        .bind(sent_at.map(|t| t.to_rfc3339()))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(EngineError::ReminderNotFound(id));
        }
        Ok(())
    }

    async fn due_pending(&self, until: DateTime<Utc>) -> EngineResult<Vec<Reminder>> {
        let rows: Vec<ReminderRow> = sqlx::query_as(
            r#"SELECT * FROM reminders
               WHERE status = 'pending' AND fire_at <= ?
               ORDER BY fire_at"#,
        )
        .bind(until.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Reminder::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct ReminderRow {
    id: String,
    task_id: String,
    user_id: String,
    fire_at: String,
    status: String,
    attempt_count: i64,
    sent_at: Option<String>,
    created_at: String,
}

impl TryFrom<ReminderRow> for Reminder {
    type Error = EngineError;

    fn try_from(row: ReminderRow) -> Result<Self, Self::Error> {
        let status = ReminderStatus::from_str(&row.status).ok_or_else(|| {
            EngineError::Database(format!("unknown reminder status '{}'", row.status))
        })?;
        Ok(Reminder {
            id: parse_uuid(&row.id)?,
            task_id: parse_uuid(&row.task_id)?,
            user_id: row.user_id,
            fire_at: parse_datetime(&row.fire_at)?,
            status,
            attempt_count: u32::try_from(row.attempt_count).map_err(|_| {
                EngineError::Database(format!("negative attempt count {}", row.attempt_count))
            })?,
            sent_at: row.sent_at.as_deref().map(parse_datetime).transpose()?,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}
