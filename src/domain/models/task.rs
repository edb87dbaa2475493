//! Task domain model.
//!
//! Tasks live in the shared relational store. The engine never owns the
//! CRUD surface; it reads and writes task rows through the store port when
//! consumers act on lifecycle events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::TaskSnapshot;

/// Priority level for tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low = 1,
    Normal = 2,
    High = 3,
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Normal
    }
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "normal" => Some(Self::Normal),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// A task row in the shared store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub user_id: String,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub priority: TaskPriority,
    pub tags: Vec<String>,
    pub due_date: Option<DateTime<Utc>>,
    /// Links recurring instances to their rule. `None` for one-off tasks.
    pub recurrence_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(user_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            title: title.into(),
            description: None,
            completed: false,
            priority: TaskPriority::Normal,
            tags: Vec::new(),
            due_date: None,
            recurrence_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_due_date(mut self, due_date: DateTime<Utc>) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_recurrence(mut self, recurrence_id: Uuid) -> Self {
        self.recurrence_id = Some(recurrence_id);
        self
    }

    /// Capture the state carried inside an event envelope.
    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            title: self.title.clone(),
            description: self.description.clone(),
            completed: self.completed,
            priority: self.priority.as_str().to_string(),
            tags: self.tags.clone(),
            due_date: self.due_date,
            recurrence_id: self.recurrence_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_round_trip() {
        for p in [TaskPriority::Low, TaskPriority::Normal, TaskPriority::High] {
            assert_eq!(TaskPriority::from_str(p.as_str()), Some(p));
        }
        assert_eq!(TaskPriority::from_str("urgent"), None);
        assert_eq!(TaskPriority::from_str("HIGH"), Some(TaskPriority::High));
    }

    #[test]
    fn test_snapshot_carries_recurrence_link() {
        let rule_id = Uuid::new_v4();
        let task = Task::new("user-1", "Weekly sync")
            .with_priority(TaskPriority::High)
            .with_tags(vec!["work".to_string()])
            .with_recurrence(rule_id);

        let snap = task.snapshot();
        assert_eq!(snap.title, "Weekly sync");
        assert_eq!(snap.priority, "high");
        assert_eq!(snap.recurrence_id, Some(rule_id));
        assert!(!snap.completed);
    }
}
