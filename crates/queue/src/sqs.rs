//! AWS SQS notifier implementation.

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_sqs::config::BehaviorVersion;
use aws_sdk_sqs::types::QueueAttributeName;
use aws_sdk_sqs::Client;
use tracing::{debug, info};

use sluice_core::config::AwsConfig;

use crate::error::QueueError;
use crate::message::IngestionMessage;
use crate::notifier::{QueueHealth, QueueNotifier};

/// SQS-backed ingestion notifier.
///
/// The queue URL is supplied per call, so one notifier serves every queue
/// the resource manager hands out.
pub struct SqsNotifier {
    client: Client,
}

impl SqsNotifier {
    /// Create a new SQS notifier from project config.
    ///
    /// Static credentials from config win; otherwise the default AWS
    /// credential chain is used.
    pub async fn new(aws: &AwsConfig) -> Self {
        let region = aws_sdk_sqs::config::Region::new(aws.region.clone());

        let sqs_config = if let (Some(key_id), Some(secret)) =
            (&aws.access_key_id, &aws.secret_access_key)
        {
            let creds = Credentials::new(
                key_id,
                secret,
                aws.session_token.clone(),
                None,
                "sluice-queue-static",
            );
            aws_sdk_sqs::Config::builder()
                .region(region)
                .behavior_version(BehaviorVersion::latest())
                .credentials_provider(creds)
                .build()
        } else {
            let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
                .region(region)
                .load()
                .await;
            aws_sdk_sqs::config::Builder::from(&shared).build()
        };

        let client = Client::from_conf(sqs_config);

        info!(region = %aws.region, "SQS notifier initialized");

        Self { client }
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QueueNotifier for SqsNotifier {
    async fn enqueue(&self, queue_url: &str, message: &IngestionMessage) -> Result<(), QueueError> {
        let body = message.to_json()?;

        debug!(queue_url, message_id = %message.id, bytes = body.len(), "Sending SQS message");

        self.client
            .send_message()
            .queue_url(queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| QueueError::Send(format!("SQS send failed: {e:?}")))?;

        Ok(())
    }

    async fn health_check(&self, queue_url: &str) -> Result<QueueHealth, QueueError> {
        let resp = self
            .client
            .get_queue_attributes()
            .queue_url(queue_url)
            .attribute_names(QueueAttributeName::ApproximateNumberOfMessages)
            .send()
            .await
            .map_err(|e| QueueError::Connection(format!("SQS health check failed: {e:?}")))?;

        let count = resp
            .attributes()
            .and_then(|attrs| attrs.get(&QueueAttributeName::ApproximateNumberOfMessages))
            .and_then(|v| v.parse::<u64>().ok());

        Ok(QueueHealth {
            connected: true,
            approximate_message_count: count,
            provider: "sqs".to_string(),
        })
    }
}
