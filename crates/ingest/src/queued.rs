//! Queued ingestion: stage content, then enqueue a notification.

use std::path::Path;
use std::sync::Arc;

use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use sluice_core::{
    apply_options, DataFormat, IngestError, IngestMode, IngestOption, IngestionResult, Op,
    Properties, ReportLevel, STATUS_ROW_KEY,
};
use sluice_queue::QueueNotifier;
use sluice_resources::{ClusterClient, ManagerCache, ResourceManager};
use sluice_storage::{is_local_path, payload, ObjectStoreStager, Stager, StagingBackend};

use crate::errors::{ensure_live, staging_error};

/// Ingests into one table through the staging-plus-queue path.
///
/// Safe to share across tasks; every call builds its own property set.
pub struct QueuedIngestor {
    database: String,
    table: String,
    manager: Arc<ResourceManager>,
    stager: Arc<dyn Stager>,
}

impl QueuedIngestor {
    pub fn new(
        database: impl Into<String>,
        table: impl Into<String>,
        manager: Arc<ResourceManager>,
        stager: Arc<dyn Stager>,
    ) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
            manager,
            stager,
        }
    }

    /// Resolve the cluster's resource manager through `cache` and stage
    /// through `backend`, notifying via `notifier`.
    pub async fn connect(
        cache: &ManagerCache,
        client: &ClusterClient,
        database: impl Into<String>,
        table: impl Into<String>,
        backend: StagingBackend,
        notifier: Arc<dyn QueueNotifier>,
    ) -> Result<Self, IngestError> {
        let manager = cache
            .get_or_create(client)
            .await
            .map_err(|e| IngestError::backend(Op::ResourceDiscovery, e))?;
        let stager = Arc::new(ObjectStoreStager::new(
            backend,
            Arc::clone(&manager),
            notifier,
        ));
        Ok(Self::new(database, table, manager, stager))
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Ingest a local file or a remote object reference.
    ///
    /// Local files are compressed (unless already compressed) and staged;
    /// remote references are enqueued as-is.
    pub async fn from_file(
        &self,
        cancel: &CancellationToken,
        path: &str,
        options: &[IngestOption],
    ) -> Result<IngestionResult, IngestError> {
        ensure_live(cancel, Op::FileIngest)?;

        let local = is_local_path(path).map_err(|e| staging_error(Op::FileIngest, e))?;
        let (op, mode) = if local {
            (Op::FileIngest, IngestMode::QueuedFile)
        } else {
            (Op::BlobIngest, IngestMode::QueuedBlob)
        };

        let mut props = self.prepare(op, mode, options, Some(path))?;
        let format = props.infer_format(path);
        debug!(path, %format, local, "Queued ingestion from file");

        let staged = if local {
            self.stager.upload_local(cancel, Path::new(path), &props).await
        } else {
            self.stager.upload_remote_ref(cancel, path, 0, &props).await
        };
        staged.map_err(|e| staging_error(op, e))?;

        info!(
            database = %self.database,
            table = %self.table,
            source_id = ?props.source.id,
            path,
            "Queued ingestion"
        );
        Ok(IngestionResult::pending(props, path).queued())
    }

    /// Ingest reader content. A format option is required: there is no file
    /// name to infer one from.
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

        let props = self.prepare(op, IngestMode::QueuedReader, options, None)?;
        if props.ingestion.additional.format.is_none() {
            return Err(IngestError::argument(
                op,
                "a FileFormat option is required when ingesting from a reader",
            ));
        }

        let uri = self
            .stager
            .upload_reader(cancel, payload(reader), &props)
            .await
            .map_err(|e| staging_error(op, e))?;

        info!(
            database = %self.database,
            table = %self.table,
            source_id = ?props.source.id,
            staged = %uri,
            "Queued ingestion from reader"
        );
        Ok(IngestionResult::pending(props, uri).queued())
    }

    /// Build the per-call property set: defaults and the format implied by
    /// `source_path`, then options, then the correlation id and status-table
    /// entry that status reporting needs.
    fn prepare(
        &self,
        op: Op,
        mode: IngestMode,
        options: &[IngestOption],
        source_path: Option<&str>,
    ) -> Result<Properties, IngestError> {
        let mut props = Properties::for_table(&self.database, &self.table);
        props.ingestion.retain_blob_on_success = true;
        props.ingestion.additional.auth_context = self.manager.auth_context();
        props.ingestion.additional.format = source_path.and_then(DataFormat::from_path);

        apply_options(&mut props, op, mode, options)?;

        // A report method only matters when something will be reported.
        if props.ingestion.report_level == ReportLevel::None {
            return Ok(props);
        }
        let id = props.source.id.get_or_insert_with(Uuid::new_v4).to_string();

        if props.ingestion.report_method.targets_table() {
            let resources = self.manager.resources();
            let table = resources.status_table().ok_or_else(|| {
                IngestError::configuration(
                    op,
                    "status reporting to a table requested but no status table is available",
                )
            })?;
            let entry = &mut props.ingestion.table_entry_ref;
            entry.table_connection_string = table.url().to_string();
            entry.partition_key = id;
            entry.row_key = STATUS_ROW_KEY.to_string();
        }

        Ok(props)
    }
}
