//! Staging: put content in durable storage, then enqueue a notification.

use std::future::Future;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use object_store::path::Path as ObjectPath;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use sluice_core::Properties;
use sluice_queue::{IngestionMessage, QueueNotifier};
use sluice_resources::ResourceManager;

use crate::backend::StagingBackend;
use crate::compress::{gzip_all, payload, Payload};
use crate::error::StagingError;
use crate::path::compression_discovery;

/// Stages source content and notifies the backend queue.
///
/// Every method races its I/O against `cancel` and returns
/// [`StagingError::Cancelled`] if the token fires first.
#[async_trait]
pub trait Stager: Send + Sync {
    /// Upload a local file and enqueue it.
    async fn upload_local(
        &self,
        cancel: &CancellationToken,
        path: &Path,
        props: &Properties,
    ) -> Result<(), StagingError>;

    /// Enqueue an object that already lives in remote storage.
    async fn upload_remote_ref(
        &self,
        cancel: &CancellationToken,
        uri: &str,
        raw_size: u64,
        props: &Properties,
    ) -> Result<(), StagingError>;

    /// Compress and upload reader content, enqueue it, and return the staged URI.
    async fn upload_reader(
        &self,
        cancel: &CancellationToken,
        reader: Payload,
        props: &Properties,
    ) -> Result<String, StagingError>;
}

async fn until_cancelled<T, E, F>(cancel: &CancellationToken, fut: F) -> Result<T, StagingError>
where
    F: Future<Output = Result<T, E>>,
    StagingError: From<E>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StagingError::Cancelled),
        res = fut => res.map_err(StagingError::from),
    }
}

/// [`Stager`] over an object_store backend, notifying through a [`QueueNotifier`].
///
/// Queues come from the resource manager's current snapshot and are used
/// round-robin. If enqueueing fails after this stager uploaded an object,
/// the object is deleted best-effort before the error is returned.
pub struct ObjectStoreStager {
    backend: StagingBackend,
    manager: Arc<ResourceManager>,
    notifier: Arc<dyn QueueNotifier>,
    next_queue: AtomicUsize,
}

impl ObjectStoreStager {
    pub fn new(
        backend: StagingBackend,
        manager: Arc<ResourceManager>,
        notifier: Arc<dyn QueueNotifier>,
    ) -> Self {
        Self {
            backend,
            manager,
            notifier,
            next_queue: AtomicUsize::new(0),
        }
    }

    pub fn backend(&self) -> &StagingBackend {
        &self.backend
    }

    fn object_name(props: &Properties, suffix: &str) -> String {
        format!(
            "{}__{}__{}__{}",
            props.ingestion.database_name,
            props.ingestion.table_name,
            Uuid::new_v4(),
            suffix
        )
    }

    fn pick_queue(&self) -> Result<String, StagingError> {
        let resources = self.manager.resources();
        if resources.queues.is_empty() {
            return Err(StagingError::NotConfigured(
                "no ingestion queue resources available".into(),
            ));
        }
        let i = self.next_queue.fetch_add(1, Ordering::Relaxed) % resources.queues.len();
        Ok(resources.queues[i].url().to_string())
    }

    async fn put(
        &self,
        cancel: &CancellationToken,
        name: &str,
        data: Vec<u8>,
    ) -> Result<ObjectPath, StagingError> {
        let path = self.backend.object_path(name);
        let size = data.len();
        until_cancelled(
            cancel,
            self.backend.store().put(&path, bytes::Bytes::from(data).into()),
        )
        .await?;
        debug!(object = %path, bytes = size, "Staged object");
        Ok(path)
    }

    async fn notify(
        &self,
        cancel: &CancellationToken,
        queue: &str,
        props: &Properties,
        blob_path: &str,
        raw_size: u64,
    ) -> Result<(), StagingError> {
        let message = IngestionMessage::from_properties(props, blob_path, raw_size);
        until_cancelled(cancel, self.notifier.enqueue(queue, &message)).await?;
        info!(
            database = %props.ingestion.database_name,
            table = %props.ingestion.table_name,
            blob_path,
            queue,
            message_id = %message.id,
            "Enqueued ingestion"
        );
        Ok(())
    }

    /// Enqueue an object this stager uploaded, deleting it if the enqueue fails.
    async fn notify_staged(
        &self,
        cancel: &CancellationToken,
        queue: &str,
        props: &Properties,
        path: &ObjectPath,
        raw_size: u64,
    ) -> Result<String, StagingError> {
        let uri = self.backend.object_uri(path);
        if let Err(e) = self.notify(cancel, queue, props, &uri, raw_size).await {
            if let Err(del) = self.backend.store().delete(path).await {
                warn!(object = %path, error = %del, "Failed to remove staged object after enqueue failure");
            }
            return Err(e);
        }
        Ok(uri)
    }
}

#[async_trait]
impl Stager for ObjectStoreStager {
    async fn upload_local(
        &self,
        cancel: &CancellationToken,
        path: &Path,
        props: &Properties,
    ) -> Result<(), StagingError> {
        let path_str = path.to_string_lossy();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StagingError::InvalidPath {
                path: path_str.to_string(),
                reason: "missing file name".into(),
            })?;

        let queue = self.pick_queue()?;
        let raw = until_cancelled(cancel, tokio::fs::read(path)).await?;
        let raw_size = props.ingestion.raw_data_size.unwrap_or(raw.len() as u64);

        let (name, body) = if compression_discovery(&path_str).is_compressed() {
            (Self::object_name(props, file_name), raw)
        } else {
            let compressed =
                until_cancelled(cancel, gzip_all(payload(io::Cursor::new(raw)))).await?;
            (Self::object_name(props, &format!("{file_name}.gz")), compressed)
        };

        let staged = self.put(cancel, &name, body).await?;
        self.notify_staged(cancel, &queue, props, &staged, raw_size).await?;

        if props.source.delete_local_source {
            if let Err(e) = tokio::fs::remove_file(path).await {
                warn!(path = %path_str, error = %e, "Failed to delete local source after ingestion");
            }
        }
        Ok(())
    }

    async fn upload_remote_ref(
        &self,
        cancel: &CancellationToken,
        uri: &str,
        raw_size: u64,
        props: &Properties,
    ) -> Result<(), StagingError> {
        let queue = self.pick_queue()?;
        let raw_size = props.ingestion.raw_data_size.unwrap_or(raw_size);
        self.notify(cancel, &queue, props, uri, raw_size).await
    }

    async fn upload_reader(
        &self,
        cancel: &CancellationToken,
        mut reader: Payload,
        props: &Properties,
    ) -> Result<String, StagingError> {
        let queue = self.pick_queue()?;
        let mut raw = Vec::new();
        until_cancelled(cancel, reader.read_to_end(&mut raw)).await?;
        let raw_size = raw.len() as u64;

        let compressed = until_cancelled(cancel, gzip_all(payload(io::Cursor::new(raw)))).await?;
        let name = Self::object_name(props, "stream.gz");

        let staged = self.put(cancel, &name, compressed).await?;
        self.notify_staged(cancel, &queue, props, &staged, raw_size).await
    }
}
