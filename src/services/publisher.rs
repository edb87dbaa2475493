//! Event publisher: turns committed task mutations into lifecycle events.
//!
//! Must be called after the mutation has committed, never speculatively
//! before; an envelope must describe state that actually persisted. A
//! publish failure after the commit is returned to the caller rather than
//! swallowed — every downstream consumer depends on the event, so the
//! external layer is expected to respond degraded-but-successful (task
//! saved, automation delayed) and flag the row for reconciliation.
//!
//! Envelopes go to `task-events` with bounded retry. A compact copy goes to
//! `task-updates` for the broadcaster on a best-effort basis: a missed live
//! update only costs a UI refresh, so failures there are logged and
//! dropped.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{DedupConfig, EventId, EventSource, EventType, Task, TaskEvent};
use crate::domain::ports::{BrokerClient, TOPIC_TASK_EVENTS, TOPIC_TASK_UPDATES};
use crate::infrastructure::retry::RetryPolicy;
use crate::services::idempotency::{creation_key, GuardOutcome, IdempotencyGuard};

pub struct EventPublisher {
    broker: Arc<dyn BrokerClient>,
    retry: RetryPolicy,
    creation_guard: IdempotencyGuard,
    creation_ttl: Duration,
}

impl EventPublisher {
    pub fn new(broker: Arc<dyn BrokerClient>, retry: RetryPolicy, dedup: &DedupConfig) -> Self {
        Self {
            broker,
            retry,
            creation_guard: IdempotencyGuard::new(),
            creation_ttl: Duration::from_secs(dedup.creation_ttl_secs),
        }
    }

    /// Tool-boundary duplicate check, called before a creation call mutates
    /// anything. An upstream agent may invoke the same logical "create
    /// task" twice for one user request; the second call within the window
    /// reports `Duplicate` and should be collapsed before a task row or an
    /// event exists. Process-local by design (§ the guard damps one agent
    /// session, not cross-process races).
    pub fn guard_task_creation(&self, user_id: &str, title: &str) -> GuardOutcome {
        self.creation_guard
            .check_and_record(&creation_key(user_id, title), self.creation_ttl)
    }

    /// Publish `task.created` for a committed task row.
    pub async fn publish_task_created(
        &self,
        task: &Task,
        source: EventSource,
    ) -> EngineResult<EventId> {
        let event = TaskEvent::new(
            EventType::TaskCreated,
            task.id,
            task.user_id.clone(),
            task.snapshot(),
            source,
        );
        self.publish(event).await
    }

    /// Publish `task.updated` with the changed fields before the mutation.
    pub async fn publish_task_updated(
        &self,
        task: &Task,
        previous: serde_json::Value,
        source: EventSource,
    ) -> EngineResult<EventId> {
        let event = TaskEvent::new(
            EventType::TaskUpdated,
            task.id,
            task.user_id.clone(),
            task.snapshot(),
            source,
        )
        .with_previous(previous);
        self.publish(event).await
    }

    /// Publish `task.completed`. The trigger for recurring-task generation.
    pub async fn publish_task_completed(
        &self,
        task: &Task,
        source: EventSource,
    ) -> EngineResult<EventId> {
        let event = TaskEvent::new(
            EventType::TaskCompleted,
            task.id,
            task.user_id.clone(),
            task.snapshot(),
            source,
        )
        .with_previous(serde_json::json!({ "completed": false }));
        self.publish(event).await
    }

    /// Publish `task.deleted` with the task state before deletion.
    pub async fn publish_task_deleted(
        &self,
        task: &Task,
        source: EventSource,
    ) -> EngineResult<EventId> {
        let event = TaskEvent::new(
            EventType::TaskDeleted,
            task.id,
            task.user_id.clone(),
            task.snapshot(),
            source,
        );
        self.publish(event).await
    }

    async fn publish(&self, event: TaskEvent) -> EngineResult<EventId> {
        let event_id = event.event_id;

        let (attempts, result) = self
            .retry
            .execute(|| {
                let event = event.clone();
                async move { self.broker.publish(TOPIC_TASK_EVENTS, &event).await }
            })
            .await;

        if let Err(err) = result {
            error!(
                event_id = %event_id,
                event_type = %event.event_type,
                task_id = %event.task_id,
                "failed to publish lifecycle event: {}",
                err
            );
            return Err(EngineError::PublishFailed {
                topic: TOPIC_TASK_EVENTS.to_string(),
                attempts,
                reason: err.to_string(),
            });
        }

        info!(
            event_id = %event_id,
            event_type = %event.event_type,
            task_id = %event.task_id,
            user_id = %event.user_id,
            "published lifecycle event"
        );

        self.publish_live_update(&event).await;
        Ok(event_id)
    }

    /// Best-effort fan-out copy for the broadcaster. Never propagates.
    async fn publish_live_update(&self, event: &TaskEvent) {
        let mut compact = event.clone();
        compact.previous = None;
        if let Err(err) = self.broker.publish(TOPIC_TASK_UPDATES, &compact).await {
            warn!(
                event_id = %event.event_id,
                "failed to publish live update (UI refresh will recover): {}",
                err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use crate::domain::ports::EventHandler;

    #[derive(Default)]
    struct RecordingBroker {
        published: Mutex<Vec<(String, TaskEvent)>>,
        fail_first: AtomicU32,
        fail_updates: std::sync::atomic::AtomicBool,
    }

    impl RecordingBroker {
        fn failing(times: u32) -> Self {
            Self {
                fail_first: AtomicU32::new(times),
                ..Default::default()
            }
        }

        fn with_broken_updates() -> Self {
            Self {
                fail_updates: std::sync::atomic::AtomicBool::new(true),
                ..Default::default()
            }
        }

        fn topics(&self) -> Vec<String> {
            self.published
                .lock()
                .unwrap()
                .iter()
                .map(|(t, _)| t.clone())
                .collect()
        }
    }

    #[async_trait]
    impl BrokerClient for RecordingBroker {
        async fn publish(&self, topic: &str, event: &TaskEvent) -> EngineResult<()> {
            if topic == TOPIC_TASK_EVENTS && self.fail_first.load(Ordering::SeqCst) > 0 {
                self.fail_first.fetch_sub(1, Ordering::SeqCst);
                return Err(EngineError::Broker("transport unavailable".to_string()));
            }
            if topic == TOPIC_TASK_UPDATES && self.fail_updates.load(Ordering::SeqCst) {
                return Err(EngineError::Broker("updates topic unavailable".to_string()));
            }
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), event.clone()));
            Ok(())
        }

        async fn subscribe(&self, _topic: &str, _handler: Arc<dyn EventHandler>) {}
    }

    fn publisher_with(broker: Arc<RecordingBroker>) -> EventPublisher {
        EventPublisher::new(
            broker,
            RetryPolicy::new(3, 1, 2),
            &DedupConfig { creation_ttl_secs: 30 },
        )
    }

    #[tokio::test]
    async fn test_publishes_envelope_and_live_update() {
        let broker = Arc::new(RecordingBroker::default());
        let publisher = publisher_with(broker.clone());
        let task = Task::new("user-1", "Weekly sync");

        publisher
            .publish_task_created(&task, EventSource::Api)
            .await
            .unwrap();

        assert_eq!(
            broker.topics(),
            vec![TOPIC_TASK_EVENTS.to_string(), TOPIC_TASK_UPDATES.to_string()]
        );
    }

    #[tokio::test]
    async fn test_completed_event_carries_previous_state() {
        let broker = Arc::new(RecordingBroker::default());
        let publisher = publisher_with(broker.clone());
        let mut task = Task::new("user-1", "Weekly sync");
        task.completed = true;

        publisher
            .publish_task_completed(&task, EventSource::Api)
            .await
            .unwrap();

        let published = broker.published.lock().unwrap();
        let (_, event) = &published[0];
        assert_eq!(event.event_type, EventType::TaskCompleted);
        assert_eq!(
            event.previous,
            Some(serde_json::json!({ "completed": false }))
        );
    }

    #[tokio::test]
    async fn test_retries_transient_publish_failure() {
        let broker = Arc::new(RecordingBroker::failing(2));
        let publisher = publisher_with(broker.clone());
        let task = Task::new("user-1", "Weekly sync");

        let result = publisher.publish_task_created(&task, EventSource::Api).await;
        assert!(result.is_ok());
        assert_eq!(broker.topics().len(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_publish_surfaces_to_caller() {
        let broker = Arc::new(RecordingBroker::failing(10));
        let publisher = publisher_with(broker.clone());
        let task = Task::new("user-1", "Weekly sync");

        let err = publisher
            .publish_task_created(&task, EventSource::Api)
            .await
            .unwrap_err();
        match err {
            EngineError::PublishFailed { topic, attempts, .. } => {
                assert_eq!(topic, TOPIC_TASK_EVENTS);
                assert_eq!(attempts, 3);
            }
            other => panic!("expected PublishFailed, got {other:?}"),
        }
        // Nothing reached the live-update topic either.
        assert!(broker.topics().is_empty());
    }

    #[tokio::test]
    async fn test_live_update_failure_does_not_propagate() {
        let broker = Arc::new(RecordingBroker::with_broken_updates());
        let publisher = publisher_with(broker.clone());
        let task = Task::new("user-1", "Weekly sync");

        // The lifecycle event landed, so the caller sees success even
        // though the UI copy was lost.
        publisher
            .publish_task_created(&task, EventSource::Api)
            .await
            .unwrap();
        assert_eq!(broker.topics(), vec![TOPIC_TASK_EVENTS.to_string()]);
    }

    #[tokio::test]
    async fn test_creation_guard_collapses_repeat_calls() {
        let broker = Arc::new(RecordingBroker::default());
        let publisher = publisher_with(broker);

        assert_eq!(
            publisher.guard_task_creation("user-1", "Buy milk"),
            GuardOutcome::Fresh
        );
        assert_eq!(
            publisher.guard_task_creation("user-1", "  buy   MILK "),
            GuardOutcome::Duplicate
        );
        assert_eq!(
            publisher.guard_task_creation("user-2", "Buy milk"),
            GuardOutcome::Fresh
        );
    }
}
