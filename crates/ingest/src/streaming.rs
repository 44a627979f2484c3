//! Streaming ingestion: push content straight to the backend over a
//! connection opened on first use.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use sluice_core::{
    apply_options, CompressionType, DataFormat, IngestError, IngestMode, IngestOption,
    IngestionResult, Op, Properties,
};
use sluice_resources::ClusterClient;
use sluice_storage::{
    compression_discovery, is_local_path, payload, sniff_compression, GzipStream, Payload,
};

use crate::conn::{
    ConnError, ConnectionFactory, HttpConnectionFactory, StreamConnection, StreamRequest,
};
use crate::errors::{conn_error, ensure_live, staging_error};

const REQUEST_ID_PREFIX: &str = "sluice";

/// Ingests into one table by writing directly to the backend.
///
/// The connection is created on the first write. Concurrent first writes
/// wait on a single initializer; a failed initialization is retried by the
/// next call.
pub struct StreamingIngestor {
    database: String,
    table: String,
    factory: Arc<dyn ConnectionFactory>,
    conn: OnceCell<Arc<dyn StreamConnection>>,
}

impl StreamingIngestor {
    pub fn new(
        database: impl Into<String>,
        table: impl Into<String>,
        factory: Arc<dyn ConnectionFactory>,
    ) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
            factory,
            conn: OnceCell::new(),
        }
    }

    /// Streaming ingestor that writes to `client`'s HTTP streaming endpoint.
    pub fn with_http(
        client: &ClusterClient,
        database: impl Into<String>,
        table: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let factory = HttpConnectionFactory::new(client.endpoint().clone(), client.auth(), timeout);
        Self::new(database, table, Arc::new(factory))
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// True once a connection has been established.
    pub fn is_connected(&self) -> bool {
        self.conn.initialized()
    }

    async fn connection(&self) -> Result<Arc<dyn StreamConnection>, IngestError> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                let conn = self.factory.connect().await?;
                info!(database = %self.database, table = %self.table, "Opened streaming connection");
                Ok::<_, ConnError>(conn)
            })
            .await
            .map_err(|e| conn_error(Op::Connect, e))?;
        Ok(Arc::clone(conn))
    }

    /// Stream a local file. Gzip files are sent as-is; zip archives are rejected.
    pub async fn from_file(
        &self,
        cancel: &CancellationToken,
        path: &str,
        options: &[IngestOption],
    ) -> Result<IngestionResult, IngestError> {
        let op = Op::FileIngest;
        ensure_live(cancel, op)?;

        let local = is_local_path(path).map_err(|e| staging_error(op, e))?;
        if !local {
            return Err(IngestError::argument(
                op,
                format!("{path}: streaming ingestion only accepts local files"),
            ));
        }

        let mut props = self.prepare(op, IngestMode::StreamingFile, options, Some(path))?;
        props.infer_format(path);

        let mut file = tokio::fs::File::open(Path::new(path))
            .await
            .map_err(|e| IngestError::io(op, e))?;

        let compression = match compression_discovery(path) {
            CompressionType::Unknown | CompressionType::None => {
                let mut head = Vec::with_capacity(4);
                (&mut file)
                    .take(4)
                    .read_to_end(&mut head)
                    .await
                    .map_err(|e| IngestError::io(op, e))?;
                file.rewind().await.map_err(|e| IngestError::io(op, e))?;
                sniff_compression(&head)
            }
            known => known,
        };

        match compression {
            CompressionType::Gzip => props.streaming.should_compress = false,
            CompressionType::Zip => {
                return Err(IngestError::argument(
                    op,
                    format!("{path}: zip archives cannot be streamed"),
                ))
            }
            CompressionType::None | CompressionType::Unknown => {
                props.streaming.should_compress = true
            }
        }
        debug!(path, ?compression, "Streaming file");

        self.stream_impl(op, cancel, payload(file), props, path).await
    }

    /// Stream reader content. The content is always compressed; the format
    /// defaults to csv.
    pub async fn from_reader<R>(
        &self,
        cancel: &CancellationToken,
        reader: R,
        options: &[IngestOption],
    ) -> Result<IngestionResult, IngestError>
    where
        R: AsyncRead + Send + 'static,
    {
        let op = Op::ReaderIngest;
        ensure_live(cancel, op)?;

        let mut props = self.prepare(op, IngestMode::StreamingReader, options, None)?;
        props
            .ingestion
            .additional
            .format
            .get_or_insert(DataFormat::Csv);
        props.streaming.should_compress = true;

        self.stream_impl(op, cancel, payload(reader), props, "").await
    }

    /// Stream an in-memory payload with an explicit format and optional
    /// mapping reference.
    pub async fn stream(
        &self,
        cancel: &CancellationToken,
        data: Bytes,
        format: DataFormat,
        mapping_name: Option<&str>,
    ) -> Result<IngestionResult, IngestError> {
        let op = Op::StreamIngest;
        ensure_live(cancel, op)?;

        let mut props = Properties::for_table(&self.database, &self.table);
        props.ingestion.additional.format = Some(format);
        props.ingestion.additional.ingestion_mapping_ref = mapping_name.map(str::to_string);
        props.streaming.should_compress = true;

        self.stream_impl(op, cancel, payload(std::io::Cursor::new(data)), props, "")
            .await
    }

    fn prepare(
        &self,
        op: Op,
        mode: IngestMode,
        options: &[IngestOption],
        source_path: Option<&str>,
    ) -> Result<Properties, IngestError> {
        let mut props = Properties::for_table(&self.database, &self.table);
        props.ingestion.additional.format = source_path.and_then(DataFormat::from_path);
        apply_options(&mut props, op, mode, options)?;
        Ok(props)
    }

    async fn stream_impl(
        &self,
        op: Op,
        cancel: &CancellationToken,
        source: Payload,
        mut props: Properties,
        source_path: &str,
    ) -> Result<IngestionResult, IngestError> {
        let conn = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(IngestError::Cancelled { op }),
            conn = self.connection() => conn?,
        };

        let client_request_id = props
            .streaming
            .client_request_id
            .get_or_insert_with(|| format!("{REQUEST_ID_PREFIX};{}", Uuid::new_v4()))
            .clone();
        let request = StreamRequest {
            database: self.database.clone(),
            table: self.table.clone(),
            format: props.ingestion.additional.format.unwrap_or(DataFormat::Csv),
            mapping_ref: props.ingestion.additional.ingestion_mapping_ref.clone(),
            client_request_id,
        };

        let body = if props.streaming.should_compress {
            GzipStream::new(source).into_payload()
        } else {
            source
        };

        conn.write(cancel, &request, body)
            .await
            .map_err(|e| conn_error(op, e))?;

        info!(
            database = %self.database,
            table = %self.table,
            request_id = %request.client_request_id,
            format = %request.format,
            "Streamed ingestion"
        );
        Ok(IngestionResult::pending(props, source_path).succeeded())
    }
}
