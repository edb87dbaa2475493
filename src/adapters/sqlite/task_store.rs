//! SQLite implementation of the TaskStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{Task, TaskPriority};
use crate::domain::ports::TaskStore;

#[derive(Clone)]
pub struct SqliteTaskStore {
    pool: SqlitePool,
}

impl SqliteTaskStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// External-layer mutation used by the engine's tests and by callers
    /// simulating the CRUD surface.
    pub async fn update(&self, task: &Task) -> EngineResult<()> {
        let tags_json = serde_json::to_string(&task.tags)?;
        let result = sqlx::query(
            r#"UPDATE tasks SET user_id = ?, title = ?, description = ?, completed = ?,
               priority = ?, tags = ?, due_date = ?, recurrence_id = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&task.user_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.completed)
        .bind(task.priority.as_str())
        .bind(&tags_json)
        .bind(task.due_date.map(|t| t.to_rfc3339()))
        .bind(task.recurrence_id.map(|id| id.to_string()))
        .bind(Utc::now().to_rfc3339())
        .bind(task.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(EngineError::TaskNotFound(task.id));
        }
        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> EngineResult<()> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(EngineError::TaskNotFound(id));
        }
        Ok(())
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn insert(&self, task: &Task) -> EngineResult<()> {
        let tags_json = serde_json::to_string(&task.tags)?;
        sqlx::query(
            r#"INSERT INTO tasks (id, user_id, title, description, completed, priority,
               tags, due_date, recurrence_id, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(task.id.to_string())
        .bind(&task.user_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.completed)
        .bind(task.priority.as_str())
        .bind(&tags_json)
        .bind(task.due_date.map(|t| t.to_rfc3339()))
        .bind(task.recurrence_id.map(|id| id.to_string()))
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> EngineResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Task::try_from).transpose()
    }

    async fn find_recurrence_instance(
        &self,
        recurrence_id: Uuid,
        user_id: &str,
        due_date: DateTime<Utc>,
    ) -> EngineResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as(
            r#"SELECT * FROM tasks
               WHERE recurrence_id = ? AND user_id = ? AND due_date = ? AND completed = 0
               LIMIT 1"#,
        )
        .bind(recurrence_id.to_string())
        .bind(user_id)
        .bind(due_date.to_rfc3339())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Task::try_from).transpose()
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    user_id: String,
    title: String,
    description: Option<String>,
    completed: bool,
    priority: String,
    tags: String,
    due_date: Option<String>,
    recurrence_id: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<TaskRow> for Task {
    type Error = EngineError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        Ok(Task {
            id: parse_uuid(&row.id)?,
            user_id: row.user_id,
            title: row.title,
            description: row.description,
            completed: row.completed,
            priority: TaskPriority::from_str(&row.priority).unwrap_or_default(),
            tags: serde_json::from_str(&row.tags)?,
            due_date: row.due_date.as_deref().map(parse_datetime).transpose()?,
            recurrence_id: row.recurrence_id.as_deref().map(parse_uuid).transpose()?,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}

pub(crate) fn parse_uuid(s: &str) -> EngineResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| EngineError::Database(format!("malformed uuid '{s}': {e}")))
}

pub(crate) fn parse_datetime(s: &str) -> EngineResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| EngineError::Database(format!("malformed timestamp '{s}': {e}")))
}
