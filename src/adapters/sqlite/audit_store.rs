//! SQLite implementation of the AuditStore.
//!
//! The insert path is `INSERT OR IGNORE` against the UNIQUE(event_id)
//! constraint: the store, not in-process locking, is what makes the audit
//! effect exactly-once under concurrent consumers and redelivery.

use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{AuditLogEntry, EventType};
use crate::domain::ports::AuditStore;

use super::task_store::{parse_datetime, parse_uuid};

#[derive(Clone)]
pub struct SqliteAuditStore {
    pool: SqlitePool,
}

impl SqliteAuditStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditStore for SqliteAuditStore {
    async fn insert(&self, entry: &AuditLogEntry) -> EngineResult<bool> {
        let details_json = serde_json::to_string(&entry.details)?;
        let result = sqlx::query(
            r#"INSERT OR IGNORE INTO audit_log
               (id, event_id, event_type, task_id, user_id, details, recorded_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(entry.id.to_string())
        .bind(entry.event_id.to_string())
        .bind(entry.event_type.as_str())
        .bind(entry.task_id.to_string())
        .bind(&entry.user_id)
        .bind(&details_json)
        .bind(entry.recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_by_event_id(&self, event_id: Uuid) -> EngineResult<Option<AuditLogEntry>> {
        let row: Option<AuditRow> = sqlx::query_as("SELECT * FROM audit_log WHERE event_id = ?")
            .bind(event_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(AuditLogEntry::try_from).transpose()
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        event_type: Option<EventType>,
        limit: u32,
    ) -> EngineResult<Vec<AuditLogEntry>> {
        let rows: Vec<AuditRow> = match event_type {
            Some(et) => {
                sqlx::query_as(
                    r#"SELECT * FROM audit_log WHERE user_id = ? AND event_type = ?
                       ORDER BY recorded_at DESC LIMIT ?"#,
                )
                .bind(user_id)
                .bind(et.as_str())
                .bind(i64::from(limit))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    r#"SELECT * FROM audit_log WHERE user_id = ?
                       ORDER BY recorded_at DESC LIMIT ?"#,
                )
                .bind(user_id)
                .bind(i64::from(limit))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(AuditLogEntry::try_from).collect()
    }

    async fn list_for_task(&self, task_id: Uuid) -> EngineResult<Vec<AuditLogEntry>> {
        let rows: Vec<AuditRow> = sqlx::query_as(
            "SELECT * FROM audit_log WHERE task_id = ? ORDER BY recorded_at DESC",
        )
        .bind(task_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(AuditLogEntry::try_from).collect()
    }

    async fn count(&self) -> EngineResult<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM audit_log")
            .fetch_one(&self.pool)
            .await?;
        u64::try_from(count).map_err(|_| EngineError::Database("negative row count".to_string()))
    }
}

#[derive(sqlx::FromRow)]
struct AuditRow {
    id: String,
    event_id: String,
    event_type: String,
    task_id: String,
    user_id: String,
    details: String,
    recorded_at: String,
}

impl TryFrom<AuditRow> for AuditLogEntry {
    type Error = EngineError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        let event_type = EventType::from_str(&row.event_type).ok_or_else(|| {
            EngineError::Database(format!("unknown event type '{}'", row.event_type))
        })?;
        Ok(AuditLogEntry {
            id: parse_uuid(&row.id)?,
            event_id: parse_uuid(&row.event_id)?,
            event_type,
            task_id: parse_uuid(&row.task_id)?,
            user_id: row.user_id,
            details: serde_json::from_str(&row.details)?,
            recorded_at: parse_datetime(&row.recorded_at)?,
        })
    }
}
