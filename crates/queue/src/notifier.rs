//! Queue notifier trait and types.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::QueueError;
use crate::message::IngestionMessage;

/// Health status of a queue connection.
#[derive(Debug, Clone, Serialize)]
pub struct QueueHealth {
    /// Whether the queue is reachable.
    pub connected: bool,
    /// Approximate number of messages waiting in the queue.
    pub approximate_message_count: Option<u64>,
    /// Queue provider name (e.g., "sqs").
    pub provider: String,
}

impl fmt::Display for QueueHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "QueueHealth {{ connected: {}, messages: {:?}, provider: {} }}",
            self.connected, self.approximate_message_count, self.provider
        )
    }
}

/// Sends ingestion notifications to a backend queue.
///
/// Retry policy, if any, belongs to the implementation.
#[async_trait]
pub trait QueueNotifier: Send + Sync {
    /// Enqueue `message` on the queue at `queue_url`.
    async fn enqueue(&self, queue_url: &str, message: &IngestionMessage) -> Result<(), QueueError>;

    /// Check queue connectivity and return health status.
    async fn health_check(&self, queue_url: &str) -> Result<QueueHealth, QueueError>;
}

/// Outcome of checking one queue.
#[derive(Debug, Clone, Serialize)]
pub struct QueueReport {
    pub queue_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<QueueHealth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueueReport {
    pub fn is_healthy(&self) -> bool {
        self.health.as_ref().is_some_and(|h| h.connected)
    }
}

/// Check every queue in `queue_urls`, in order. A failed check is recorded
/// in its report and does not stop the remaining checks.
pub async fn check_queues(notifier: &dyn QueueNotifier, queue_urls: &[String]) -> Vec<QueueReport> {
    let mut reports = Vec::with_capacity(queue_urls.len());
    for url in queue_urls {
        let report = match notifier.health_check(url).await {
            Ok(health) => {
                debug!(queue_url = %url, %health, "Queue health checked");
                QueueReport {
                    queue_url: url.clone(),
                    health: Some(health),
                    error: None,
                }
            }
            Err(e) => {
                warn!(queue_url = %url, error = %e, "Queue health check failed");
                QueueReport {
                    queue_url: url.clone(),
                    health: None,
                    error: Some(e.to_string()),
                }
            }
        };
        reports.push(report);
    }
    reports
}
