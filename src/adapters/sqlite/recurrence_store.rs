//! SQLite implementation of the RecurrenceStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{RecurrencePattern, RecurrenceRule};
use crate::domain::ports::RecurrenceStore;

use super::task_store::{parse_datetime, parse_uuid};

#[derive(Clone)]
pub struct SqliteRecurrenceStore {
    pool: SqlitePool,
}

impl SqliteRecurrenceStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecurrenceStore for SqliteRecurrenceStore {
    async fn insert(&self, rule: &RecurrenceRule) -> EngineResult<()> {
        sqlx::query(
            r#"INSERT INTO recurrence_rules (id, task_id, pattern, interval, next_due_at,
               created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(rule.id.to_string())
        .bind(rule.task_id.to_string())
        .bind(rule.pattern.as_str())
        .bind(i64::from(rule.interval))
        .bind(rule.next_due_at.map(|t| t.to_rfc3339()))
        .bind(rule.created_at.to_rfc3339())
        .bind(rule.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> EngineResult<Option<RecurrenceRule>> {
        let row: Option<RuleRow> = sqlx::query_as("SELECT * FROM recurrence_rules WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(RecurrenceRule::try_from).transpose()
    }

    async fn advance_next_due(&self, id: Uuid, next_due_at: DateTime<Utc>) -> EngineResult<()> {
        // Monotonic: a redelivered event must not move the cursor backwards.
        let next = next_due_at.to_rfc3339();
        let result = sqlx::query(
            r#"UPDATE recurrence_rules SET next_due_at = ?1, updated_at = ?2
               WHERE id = ?3 AND (next_due_at IS NULL OR next_due_at < ?1)"#,
        )
        .bind(&next)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Either the rule is gone or the cursor is already at or past
            // this occurrence; only the former is an error.
            if self.get(id).await?.is_none() {
                return Err(EngineError::RecurrenceRuleNotFound(id));
            }
        }
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct RuleRow {
    id: String,
    task_id: String,
    pattern: String,
    interval: i64,
    next_due_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<RuleRow> for RecurrenceRule {
    type Error = EngineError;

    fn try_from(row: RuleRow) -> Result<Self, Self::Error> {
        let pattern = RecurrencePattern::from_str(&row.pattern).ok_or_else(|| {
            EngineError::Database(format!("unknown recurrence pattern '{}'", row.pattern))
        })?;
        Ok(RecurrenceRule {
            id: parse_uuid(&row.id)?,
            task_id: parse_uuid(&row.task_id)?,
            pattern,
            interval: u32::try_from(row.interval)
                .map_err(|_| EngineError::Database(format!("negative interval {}", row.interval)))?,
            next_due_at: row.next_due_at.as_deref().map(parse_datetime).transpose()?,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}
