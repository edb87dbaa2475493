//! Recurrence rule model.
//!
//! A rule is anchored to a task and describes how completed instances
//! regenerate. Rules are created alongside their anchor task, read by the
//! recurrence consumer on `task.completed`, and superseded (never rewound)
//! as each new instance is spawned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Supported recurrence cadences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrencePattern {
    Daily,
    Weekly,
    Monthly,
    /// Fixed interval expressed in days.
    Custom,
}

impl RecurrencePattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Custom => "custom",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            "custom" => Some(Self::Custom),
            _ => None,
        }
    }

    /// Inclusive interval bounds accepted at rule creation.
    pub fn interval_range(&self) -> (u32, u32) {
        match self {
            Self::Daily | Self::Custom => (1, 365),
            Self::Weekly => (1, 52),
            Self::Monthly => (1, 12),
        }
    }
}

impl std::fmt::Display for RecurrencePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// "This task regenerates": pattern, interval, and the next expected
/// occurrence. `next_due_at` only ever advances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub id: Uuid,
    /// The rule's anchor task.
    pub task_id: Uuid,
    pub pattern: RecurrencePattern,
    pub interval: u32,
    pub next_due_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecurrenceRule {
    pub fn new(task_id: Uuid, pattern: RecurrencePattern, interval: u32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            task_id,
            pattern,
            interval,
            next_due_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_round_trip() {
        for p in [
            RecurrencePattern::Daily,
            RecurrencePattern::Weekly,
            RecurrencePattern::Monthly,
            RecurrencePattern::Custom,
        ] {
            assert_eq!(RecurrencePattern::from_str(p.as_str()), Some(p));
        }
        assert_eq!(RecurrencePattern::from_str("yearly"), None);
    }

    #[test]
    fn test_interval_ranges() {
        assert_eq!(RecurrencePattern::Daily.interval_range(), (1, 365));
        assert_eq!(RecurrencePattern::Weekly.interval_range(), (1, 52));
        assert_eq!(RecurrencePattern::Monthly.interval_range(), (1, 12));
        assert_eq!(RecurrencePattern::Custom.interval_range(), (1, 365));
    }
}
