//! Test doubles shared by the ingestion integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_compression::tokio::bufread::GzipDecoder;
use async_trait::async_trait;
use tokio::io::{AsyncReadExt, BufReader};
use uuid::Uuid;

use sluice_core::Properties;
use sluice_ingest::{CancellationToken, ConnError, ConnectionFactory, StreamConnection, StreamRequest};
use sluice_queue::QueueError;
use sluice_resources::{ResourceManager, ResourceSet, ResourceUri, StaticDiscovery};
use sluice_storage::{Payload, Stager, StagingError};

/// Payload ceiling enforced by [`LimitConnection`], after decompression.
pub const MAX_STREAM_BYTES: usize = 4 * 1024 * 1024;

pub const STATUS_TABLE_URL: &str = "https://acct.table.example.net/ingestionstatus";

pub async fn manager(with_status_table: bool) -> Arc<ResourceManager> {
    let mut set = ResourceSet {
        queues: vec![ResourceUri::parse("https://acct.queue.example.net/ingest-0").unwrap()],
        ..Default::default()
    };
    if with_status_table {
        set.tables.push(ResourceUri::parse(STATUS_TABLE_URL).unwrap());
    }
    Arc::new(
        ResourceManager::connect(Arc::new(StaticDiscovery::new(set, "auth-ctx")))
            .await
            .unwrap(),
    )
}

#[derive(Debug, Clone, PartialEq)]
pub enum Upload {
    Local(PathBuf),
    Remote { uri: String, raw_size: u64 },
    Reader { bytes: Vec<u8> },
}

/// Records every upload along with the properties it carried.
#[derive(Default)]
pub struct FakeStager {
    pub uploads: Mutex<Vec<(Upload, Properties)>>,
    pub fail: bool,
    /// Block until the caller cancels.
    pub hang: bool,
}

impl FakeStager {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn hanging() -> Self {
        Self {
            hang: true,
            ..Default::default()
        }
    }

    pub fn count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    pub fn last(&self) -> (Upload, Properties) {
        self.uploads.lock().unwrap().last().cloned().unwrap()
    }

    async fn record(
        &self,
        cancel: &CancellationToken,
        upload: Upload,
        props: &Properties,
    ) -> Result<(), StagingError> {
        if self.hang {
            cancel.cancelled().await;
            return Err(StagingError::Cancelled);
        }
        if self.fail {
            return Err(StagingError::Queue(QueueError::Send("queue unavailable".into())));
        }
        self.uploads.lock().unwrap().push((upload, props.clone()));
        Ok(())
    }
}

#[async_trait]
impl Stager for FakeStager {
    async fn upload_local(
        &self,
        cancel: &CancellationToken,
        path: &Path,
        props: &Properties,
    ) -> Result<(), StagingError> {
        self.record(cancel, Upload::Local(path.to_path_buf()), props).await
    }

    async fn upload_remote_ref(
        &self,
        cancel: &CancellationToken,
        uri: &str,
        raw_size: u64,
        props: &Properties,
    ) -> Result<(), StagingError> {
        let upload = Upload::Remote {
            uri: uri.to_string(),
            raw_size,
        };
        self.record(cancel, upload, props).await
    }

    async fn upload_reader(
        &self,
        cancel: &CancellationToken,
        mut reader: Payload,
        props: &Properties,
    ) -> Result<String, StagingError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        self.record(cancel, Upload::Reader { bytes }, props).await?;
        Ok("memory://staging/stream.gz".to_string())
    }
}

pub async fn gunzip(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    GzipDecoder::new(BufReader::new(data))
        .read_to_end(&mut out)
        .await?;
    Ok(out)
}

/// Accepts gzip payloads whose decompressed size is under [`MAX_STREAM_BYTES`].
#[derive(Default)]
pub struct LimitConnection {
    pub writes: Mutex<Vec<(StreamRequest, Vec<u8>)>>,
    /// Block until the caller cancels.
    pub hang: bool,
}

impl LimitConnection {
    pub fn last(&self) -> (StreamRequest, Vec<u8>) {
        self.writes.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl StreamConnection for LimitConnection {
    async fn write(
        &self,
        cancel: &CancellationToken,
        request: &StreamRequest,
        mut payload: Payload,
    ) -> Result<(), ConnError> {
        if self.hang {
            cancel.cancelled().await;
            return Err(ConnError::Cancelled);
        }
        let mut wire = Vec::new();
        payload.read_to_end(&mut wire).await?;
        let raw = gunzip(&wire).await?;
        if raw.len() >= MAX_STREAM_BYTES {
            return Err(ConnError::Rejected {
                status: 413,
                body: format!("payload of {} bytes exceeds limit", raw.len()),
            });
        }
        self.writes.lock().unwrap().push((request.clone(), raw));
        Ok(())
    }
}

/// Hands out one shared [`LimitConnection`], counting how often it is asked.
pub struct CountingFactory {
    pub conn: Arc<LimitConnection>,
    pub connects: AtomicUsize,
    pub fail: bool,
}

impl CountingFactory {
    pub fn new() -> Self {
        Self::with_connection(LimitConnection::default())
    }

    pub fn with_connection(conn: LimitConnection) -> Self {
        Self {
            conn: Arc::new(conn),
            connects: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionFactory for CountingFactory {
    async fn connect(&self) -> Result<Arc<dyn StreamConnection>, ConnError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        if self.fail {
            return Err(ConnError::Endpoint("cluster unreachable".into()));
        }
        Ok(self.conn.clone())
    }
}

/// Temporary directory removed on drop.
pub struct TempDir(pub PathBuf);

impl TempDir {
    pub fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("sluice-ingest-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        Self(dir)
    }

    pub fn file(&self, name: &str, contents: &[u8]) -> String {
        let path = self.0.join(name);
        std::fs::write(&path, contents).unwrap();
        path.to_string_lossy().to_string()
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.0).ok();
    }
}
