//! Recurrence generator: the `task.completed` consumer.
//!
//! When a recurring task completes, spawn the next instance. Delivery is
//! at-least-once, so before creating anything the generator asks the store
//! whether an uncompleted instance of this rule already exists at the
//! computed due date — the durable idempotency check that an in-memory
//! guard could not provide across consumer restarts. Instance creation and
//! the rule's `next_due_at` advance are both commutative under redelivery.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{EventSource, EventType, Task, TaskEvent, TaskPriority};
use crate::domain::ports::{EventHandler, HandlerOutcome, RecurrenceStore, TaskStore};
use crate::services::publisher::EventPublisher;
use crate::services::recurrence;

/// What processing one completion produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// A new instance was created and its `task.created` published.
    Generated {
        task_id: Uuid,
        due_date: DateTime<Utc>,
    },
    /// The next instance already exists; redelivery did its job.
    Duplicate,
    /// The referenced rule is gone (deleted with its anchor task).
    RuleMissing,
    /// The completed task has no due date to anchor the next occurrence.
    NoDueDate,
}

pub struct RecurrenceGenerator {
    tasks: Arc<dyn TaskStore>,
    rules: Arc<dyn RecurrenceStore>,
    publisher: Arc<EventPublisher>,
}

impl RecurrenceGenerator {
    pub fn new(
        tasks: Arc<dyn TaskStore>,
        rules: Arc<dyn RecurrenceStore>,
        publisher: Arc<EventPublisher>,
    ) -> Self {
        Self {
            tasks,
            rules,
            publisher,
        }
    }

    /// Process one `task.completed` envelope for a recurring task.
    pub async fn process(
        &self,
        event: &TaskEvent,
        recurrence_id: Uuid,
    ) -> EngineResult<GenerationOutcome> {
        let Some(rule) = self.rules.get(recurrence_id).await? else {
            warn!(%recurrence_id, task_id = %event.task_id, "recurrence rule not found, skipping");
            return Ok(GenerationOutcome::RuleMissing);
        };

        let Some(current_due) = event.task_snapshot.due_date else {
            warn!(
                task_id = %event.task_id,
                "completed recurring task has no due date, cannot compute next occurrence"
            );
            return Ok(GenerationOutcome::NoDueDate);
        };

        let next_due = recurrence::next_occurrence(current_due, rule.pattern, rule.interval)?;
        debug!(
            %recurrence_id,
            pattern = %rule.pattern,
            interval = rule.interval,
            next_due = %next_due,
            "computed next occurrence"
        );

        if let Some(existing) = self
            .tasks
            .find_recurrence_instance(rule.id, &event.user_id, next_due)
            .await?
        {
            info!(
                existing_task_id = %existing.id,
                %recurrence_id,
                "next instance already exists, skipping creation"
            );
            return Ok(GenerationOutcome::Duplicate);
        }

        let snapshot = &event.task_snapshot;
        let mut instance = Task::new(event.user_id.clone(), snapshot.title.clone())
            .with_due_date(next_due)
            .with_priority(TaskPriority::from_str(&snapshot.priority).unwrap_or_default())
            .with_tags(snapshot.tags.clone())
            .with_recurrence(rule.id);
        instance.description = snapshot.description.clone();

        // The store's unique index on open (rule, user, due) instances is
        // the real guard: a concurrent redelivery that passed the lookup
        // above loses the insert race here and resolves as a duplicate.
        if let Err(err) = self.tasks.insert(&instance).await {
            if is_unique_violation(&err) {
                info!(%recurrence_id, "lost instance-creation race to a concurrent delivery");
                return Ok(GenerationOutcome::Duplicate);
            }
            return Err(err);
        }
        self.rules.advance_next_due(rule.id, next_due).await?;

        info!(
            new_task_id = %instance.id,
            %recurrence_id,
            due_date = %next_due,
            "created next recurring task instance"
        );

        // The instance is committed; a failed event publish here must not
        // undo or retry the generation (redelivery would just dedup). Log
        // for reconciliation instead.
        if let Err(err) = self
            .publisher
            .publish_task_created(&instance, EventSource::Recurrence)
            .await
        {
            error!(
                new_task_id = %instance.id,
                "instance created but task.created publish failed: {}",
                err
            );
        }

        Ok(GenerationOutcome::Generated {
            task_id: instance.id,
            due_date: next_due,
        })
    }
}

fn is_unique_violation(err: &EngineError) -> bool {
    matches!(err, EngineError::Database(msg) if msg.contains("UNIQUE constraint failed"))
}

#[async_trait]
impl EventHandler for RecurrenceGenerator {
    fn name(&self) -> &str {
        "recurrence-generator"
    }

    async fn handle(&self, event: &TaskEvent) -> HandlerOutcome {
        if event.event_type != EventType::TaskCompleted {
            return HandlerOutcome::Ack;
        }
        let Some(recurrence_id) = event.task_snapshot.recurrence_id else {
            return HandlerOutcome::Ack;
        };

        match self.process(event, recurrence_id).await {
            Ok(_) => HandlerOutcome::Ack,
            // Store/broker hiccups are worth a redelivery; anything else
            // (calendar overflow, malformed rule) will never succeed.
            Err(EngineError::Database(msg)) => {
                warn!("recurrence generation hit a store error, requesting redelivery: {msg}");
                HandlerOutcome::Retry
            }
            Err(err) => {
                error!("recurrence generation failed permanently: {err}");
                HandlerOutcome::Drop
            }
        }
    }
}
