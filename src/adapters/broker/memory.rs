//! In-process broker.
//!
//! Implements the `BrokerClient` port on tokio channels for single-process
//! deployments and tests. The contract consumers see is the same one a
//! durable transport gives them: at-least-once delivery, no ordering
//! guarantee across in-flight handlers, bounded redelivery on `Retry`, and
//! a dead-letter record once redeliveries are exhausted. Handler
//! concurrency per subscription is capped by a semaphore.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::{Mutex, RwLock, Semaphore};
use tracing::{debug, error, warn};

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::models::{BrokerConfig, TaskEvent};
use crate::domain::ports::{BrokerClient, DeadLetter, EventHandler, HandlerOutcome};

struct Delivery {
    event: TaskEvent,
    attempt: u32,
}

struct Subscription {
    queue: UnboundedSender<Delivery>,
}

pub struct InProcessBroker {
    config: BrokerConfig,
    subscriptions: RwLock<HashMap<String, Vec<Subscription>>>,
    dead_letters: Arc<Mutex<Vec<DeadLetter>>>,
}

impl InProcessBroker {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            subscriptions: RwLock::new(HashMap::new()),
            dead_letters: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Messages that exhausted their redeliveries, for manual inspection.
    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters.lock().await.clone()
    }

    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.subscriptions
            .read()
            .await
            .get(topic)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl BrokerClient for InProcessBroker {
    async fn publish(&self, topic: &str, event: &TaskEvent) -> EngineResult<()> {
        let subscriptions = self.subscriptions.read().await;
        let Some(subs) = subscriptions.get(topic) else {
            // No consumers yet; a durable transport would buffer, an
            // in-process one just notes it.
            debug!(topic, event_id = %event.event_id, "publish with no subscribers");
            return Ok(());
        };

        for sub in subs {
            sub.queue
                .send(Delivery {
                    event: event.clone(),
                    attempt: 1,
                })
                .map_err(|_| {
                    EngineError::Broker(format!("subscription worker for '{topic}' is gone"))
                })?;
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str, handler: Arc<dyn EventHandler>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Delivery>();
        let requeue = tx.clone();
        let topic_name = topic.to_string();
        let max_redeliveries = self.config.max_redeliveries;
        let semaphore = Arc::new(Semaphore::new(self.config.handler_concurrency.max(1) as usize));
        let dead_letters = self.dead_letters.clone();

        tokio::spawn(async move {
            while let Some(delivery) = rx.recv().await {
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    break;
                };
                let handler = handler.clone();
                let requeue = requeue.clone();
                let topic_name = topic_name.clone();
                let dead_letters = dead_letters.clone();

                tokio::spawn(async move {
                    let _permit = permit;
                    let outcome = handler.handle(&delivery.event).await;
                    match outcome {
                        HandlerOutcome::Ack => {}
                        HandlerOutcome::Drop => {
                            warn!(
                                topic = %topic_name,
                                handler = handler.name(),
                                event_id = %delivery.event.event_id,
                                "handler dropped event"
                            );
                        }
                        HandlerOutcome::Retry => {
                            if delivery.attempt > max_redeliveries {
                                error!(
                                    topic = %topic_name,
                                    handler = handler.name(),
                                    event_id = %delivery.event.event_id,
                                    deliveries = delivery.attempt,
                                    "redeliveries exhausted, dead-lettering event"
                                );
                                dead_letters.lock().await.push(DeadLetter {
                                    topic: topic_name.clone(),
                                    handler: handler.name().to_string(),
                                    event: delivery.event,
                                    deliveries: delivery.attempt,
                                });
                                return;
                            }
                            // Brief pause so a struggling store is not
                            // hammered in a tight loop.
                            tokio::time::sleep(Duration::from_millis(
                                50 * u64::from(delivery.attempt),
                            ))
                            .await;
                            let _ = requeue.send(Delivery {
                                event: delivery.event,
                                attempt: delivery.attempt + 1,
                            });
                        }
                    }
                });
            }
        });

        let mut subscriptions = self.subscriptions.write().await;
        subscriptions
            .entry(topic.to_string())
            .or_default()
            .push(Subscription { queue: tx });
    }
}
