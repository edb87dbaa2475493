//! Webhook notification delivery.
//!
//! POSTs the reminder payload to a configured URL. A 2xx response is a
//! delivery; anything else, including a timeout, is a failed attempt the
//! notifier's retry policy may repeat. One attempt per call — retrying
//! lives in the caller.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::domain::errors::{EngineError, EngineResult};
use crate::domain::ports::{NotificationPayload, NotificationSender};

pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> EngineResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Notification(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotificationSender for WebhookNotifier {
    async fn send(&self, payload: &NotificationPayload) -> EngineResult<()> {
        let response = self
            .client
            .post(&self.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| EngineError::Notification(format!("webhook request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            debug!(reminder_id = %payload.reminder_id, %status, "webhook delivery succeeded");
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(EngineError::Notification(format!(
                "webhook returned {status}: {body}"
            )))
        }
    }
}
