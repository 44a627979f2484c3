//! Streaming connection: a direct write of one payload to the backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_ENCODING;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use sluice_core::DataFormat;
use sluice_resources::{ResourceError, TokenProvider};
use sluice_storage::Payload;

const CLIENT_REQUEST_ID_HEADER: &str = "x-ms-client-request-id";

#[derive(Debug, Error)]
pub enum ConnError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("payload read error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend refused the payload (e.g. size ceiling, bad format).
    #[error("streaming ingestion rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("authentication error: {0}")]
    Auth(#[from] ResourceError),

    #[error("invalid endpoint: {0}")]
    Endpoint(String),

    #[error("write cancelled")]
    Cancelled,
}

/// Routing and tagging for one streaming write.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamRequest {
    pub database: String,
    pub table: String,
    pub format: DataFormat,
    pub mapping_ref: Option<String>,
    pub client_request_id: String,
}

/// Persistent connection for streaming ingestion.
///
/// Payloads are always gzip-compressed. Implementations serialize writes
/// internally if the transport requires it.
#[async_trait]
pub trait StreamConnection: Send + Sync {
    async fn write(
        &self,
        cancel: &CancellationToken,
        request: &StreamRequest,
        payload: Payload,
    ) -> Result<(), ConnError>;
}

/// Opens [`StreamConnection`]s. Called at most once per streaming ingestor.
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn connect(&self) -> Result<Arc<dyn StreamConnection>, ConnError>;
}

/// HTTP streaming endpoint: `POST {endpoint}/v1/rest/ingest/{db}/{table}`.
pub struct HttpStreamConnection {
    http: reqwest::Client,
    endpoint: Url,
    auth: Arc<dyn TokenProvider>,
}

impl HttpStreamConnection {
    pub fn new(
        endpoint: Url,
        auth: Arc<dyn TokenProvider>,
        timeout: Duration,
    ) -> Result<Self, ConnError> {
        if endpoint.cannot_be_a_base() {
            return Err(ConnError::Endpoint(endpoint.to_string()));
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint,
            auth,
        })
    }

    pub fn ingest_url(&self, request: &StreamRequest) -> Result<Url, ConnError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| ConnError::Endpoint(self.endpoint.to_string()))?
            .pop_if_empty()
            .extend([
                "v1",
                "rest",
                "ingest",
                request.database.as_str(),
                request.table.as_str(),
            ]);
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("streamFormat", request.format.as_str());
            if let Some(mapping) = &request.mapping_ref {
                query.append_pair("mappingName", mapping);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl StreamConnection for HttpStreamConnection {
    async fn write(
        &self,
        cancel: &CancellationToken,
        request: &StreamRequest,
        mut payload: Payload,
    ) -> Result<(), ConnError> {
        let send = async {
            let token = self.auth.token().await?;
            let url = self.ingest_url(request)?;

            let mut body = Vec::new();
            payload.read_to_end(&mut body).await?;
            debug!(
                url = %url,
                request_id = %request.client_request_id,
                bytes = body.len(),
                "Streaming payload"
            );

            let resp = self
                .http
                .post(url)
                .bearer_auth(token)
                .header(CLIENT_REQUEST_ID_HEADER, &request.client_request_id)
                .header(CONTENT_ENCODING, "gzip")
                .body(body)
                .send()
                .await?;

            let status = resp.status();
            if status.is_success() {
                return Ok(());
            }
            let body = resp.text().await.unwrap_or_default();
            Err(ConnError::Rejected {
                status: status.as_u16(),
                body,
            })
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ConnError::Cancelled),
            res = send => res,
        }
    }
}

/// Factory for [`HttpStreamConnection`]s against one cluster.
pub struct HttpConnectionFactory {
    endpoint: Url,
    auth: Arc<dyn TokenProvider>,
    timeout: Duration,
}

impl HttpConnectionFactory {
    pub fn new(endpoint: Url, auth: Arc<dyn TokenProvider>, timeout: Duration) -> Self {
        Self {
            endpoint,
            auth,
            timeout,
        }
    }
}

#[async_trait]
impl ConnectionFactory for HttpConnectionFactory {
    async fn connect(&self) -> Result<Arc<dyn StreamConnection>, ConnError> {
        let conn =
            HttpStreamConnection::new(self.endpoint.clone(), Arc::clone(&self.auth), self.timeout)?;
        Ok(Arc::new(conn))
    }
}
