//! Owner notifications.
//!
//! The orchestrator publishes an [`OwnerNotification`] after committing a
//! violation. A [`NotificationDispatcher`] drains the channel independently
//! and delivers each event with its own retry; a failed delivery is logged
//! and never affects the scan that produced it.

pub mod alert;

pub use alert::{AlertSink, LogAlertSink, OperationalAlert};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use backoff::{future::retry_notify, ExponentialBackoff};
use copyguard_core::ContentRef;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Notification type sent for restricted content.
pub const COPYRIGHT_VIOLATION: &str = "copyright_violation";

const VIOLATION_MESSAGE: &str =
    "Your content was restricted because it matches a protected copyrighted work.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

/// Event addressed to the owner of a piece of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerNotification {
    pub content_id: String,
    pub content: ContentRef,
    pub scan_id: Uuid,
    pub payload: NotificationPayload,
}

impl OwnerNotification {
    pub fn copyright_violation(content: &ContentRef, scan_id: Uuid) -> Self {
        Self {
            content_id: content.id.clone(),
            content: content.clone(),
            scan_id,
            payload: NotificationPayload {
                kind: COPYRIGHT_VIOLATION.to_string(),
                message: VIOLATION_MESSAGE.to_string(),
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification transport error: {0}")]
    Transport(String),

    #[error("Notification rejected: {0}")]
    Rejected(String),
}

impl NotifyError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

/// Destination for owner notifications.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify_owner(&self, notification: &OwnerNotification) -> Result<(), NotifyError>;
}

/// Logs notifications instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn notify_owner(&self, notification: &OwnerNotification) -> Result<(), NotifyError> {
        tracing::info!(
            content = %notification.content,
            scan_id = %notification.scan_id,
            kind = %notification.payload.kind,
            "Owner notification"
        );
        Ok(())
    }
}

/// POSTs notifications as JSON to a webhook.
pub struct WebhookNotificationSink {
    client: Client,
    url: String,
}

impl WebhookNotificationSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Transport(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookNotificationSink {
    async fn notify_owner(&self, notification: &OwnerNotification) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Err(NotifyError::Transport(format!("webhook returned {status}")))
        } else {
            Err(NotifyError::Rejected(format!("webhook returned {status}")))
        }
    }
}

/// Sending half handed to the orchestrator.
#[derive(Debug, Clone)]
pub struct NotificationPublisher {
    tx: mpsc::UnboundedSender<OwnerNotification>,
}

impl NotificationPublisher {
    /// Queue a notification for delivery. Never blocks or fails the caller.
    pub fn publish(&self, notification: OwnerNotification) {
        if self.tx.send(notification).is_err() {
            tracing::warn!("Notification dispatcher stopped, notification dropped");
        }
    }
}

/// Create a connected publisher and receiver.
pub fn channel() -> (NotificationPublisher, mpsc::UnboundedReceiver<OwnerNotification>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (NotificationPublisher { tx }, rx)
}

/// Retry settings for notification delivery.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    /// Give up on a notification after this long.
    pub max_elapsed: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(10),
            max_elapsed: Duration::from_secs(60),
        }
    }
}

/// Drains the notification channel into a sink.
pub struct NotificationDispatcher {
    rx: mpsc::UnboundedReceiver<OwnerNotification>,
    sink: Arc<dyn NotificationSink>,
    config: DispatchConfig,
}

impl NotificationDispatcher {
    pub fn new(
        rx: mpsc::UnboundedReceiver<OwnerNotification>,
        sink: Arc<dyn NotificationSink>,
        config: DispatchConfig,
    ) -> Self {
        Self { rx, sink, config }
    }

    /// Deliver notifications until every publisher is dropped.
    pub async fn run(mut self) {
        while let Some(notification) = self.rx.recv().await {
            self.deliver(&notification).await;
        }
        tracing::debug!("Notification dispatcher stopped");
    }

    /// Deliver one notification with retry; returns whether it was delivered.
    pub async fn deliver(&self, notification: &OwnerNotification) -> bool {
        let backoff = ExponentialBackoff {
            initial_interval: self.config.initial_interval,
            max_interval: self.config.max_interval,
            max_elapsed_time: Some(self.config.max_elapsed),
            ..Default::default()
        };

        let result = retry_notify(
            backoff,
            || async move {
                self.sink.notify_owner(notification).await.map_err(|e| {
                    if e.is_transient() {
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            },
            |err: NotifyError, duration: Duration| {
                tracing::warn!(
                    error = %err,
                    content = %notification.content,
                    retry_after_ms = duration.as_millis() as u64,
                    "Retry scheduled"
                );
            },
        )
        .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    content = %notification.content,
                    scan_id = %notification.scan_id,
                    "Owner notification could not be delivered"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakySink {
        failures_left: AtomicUsize,
        delivered: AtomicUsize,
        permanent: bool,
    }

    #[async_trait]
    impl NotificationSink for FlakySink {
        async fn notify_owner(&self, _: &OwnerNotification) -> Result<(), NotifyError> {
            if self.permanent {
                return Err(NotifyError::Rejected("410 Gone".into()));
            }
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(NotifyError::Transport("connection reset".into()));
            }
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fast() -> DispatchConfig {
        DispatchConfig {
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(5),
            max_elapsed: Duration::from_secs(2),
        }
    }

    #[test]
    fn test_violation_payload_shape() {
        let n = OwnerNotification::copyright_violation(&ContentRef::post("p1"), Uuid::nil());
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["contentId"], "p1");
        assert_eq!(json["payload"]["type"], COPYRIGHT_VIOLATION);
        assert!(json["payload"]["message"].as_str().unwrap().contains("copyrighted"));
    }

    #[tokio::test]
    async fn test_dispatcher_retries_transient_failures() {
        let sink = Arc::new(FlakySink {
            failures_left: AtomicUsize::new(2),
            delivered: AtomicUsize::new(0),
            permanent: false,
        });
        let (_publisher, rx) = channel();
        let dispatcher = NotificationDispatcher::new(rx, sink.clone(), fast());

        let n = OwnerNotification::copyright_violation(&ContentRef::post("p1"), Uuid::new_v4());
        assert!(dispatcher.deliver(&n).await);
        assert_eq!(sink.delivered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_dispatcher_gives_up_on_rejection() {
        let sink = Arc::new(FlakySink {
            failures_left: AtomicUsize::new(0),
            delivered: AtomicUsize::new(0),
            permanent: true,
        });
        let (_publisher, rx) = channel();
        let dispatcher = NotificationDispatcher::new(rx, sink.clone(), fast());

        let n = OwnerNotification::copyright_violation(&ContentRef::post("p1"), Uuid::new_v4());
        assert!(!dispatcher.deliver(&n).await);
    }

    #[tokio::test]
    async fn test_run_drains_until_publishers_drop() {
        let sink = Arc::new(FlakySink {
            failures_left: AtomicUsize::new(0),
            delivered: AtomicUsize::new(0),
            permanent: false,
        });
        let (publisher, rx) = channel();
        let dispatcher = NotificationDispatcher::new(rx, sink.clone(), fast());

        publisher.publish(OwnerNotification::copyright_violation(
            &ContentRef::post("a"),
            Uuid::new_v4(),
        ));
        publisher.publish(OwnerNotification::copyright_violation(
            &ContentRef::post_meta("b"),
            Uuid::new_v4(),
        ));
        drop(publisher);

        dispatcher.run().await;
        assert_eq!(sink.delivered.load(Ordering::SeqCst), 2);
    }
}
