use std::path::{Path, PathBuf};
use std::sync::Arc;

use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use tracing::info;

use sluice_core::config::{AwsConfig, Config};

use crate::error::StagingError;

/// Durable store that staged content is uploaded to.
pub enum StagingBackend {
    Local(LocalBackend),
    S3(S3Backend),
}

impl StagingBackend {
    /// S3 when AWS credentials and a bucket are configured, otherwise the
    /// local staging directory (created if missing).
    pub fn from_config(config: &Config) -> Result<Self, StagingError> {
        if config.aws.is_configured() {
            return Ok(StagingBackend::S3(S3Backend::new(&config.aws)?));
        }
        std::fs::create_dir_all(&config.staging.local_dir)?;
        Ok(StagingBackend::Local(LocalBackend::new(
            &config.staging.local_dir,
        )?))
    }

    pub fn store(&self) -> &dyn ObjectStore {
        match self {
            StagingBackend::Local(b) => b.store.as_ref(),
            StagingBackend::S3(b) => b.store.as_ref(),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, StagingBackend::S3(_))
    }

    /// Store path for a staged object name, under the S3 key prefix if any.
    pub fn object_path(&self, name: &str) -> ObjectPath {
        match self {
            StagingBackend::S3(b) if !b.key_prefix.is_empty() => {
                ObjectPath::from(format!("{}/{}", b.key_prefix, name))
            }
            _ => ObjectPath::from(name),
        }
    }

    /// URI the backend fetches a staged object from.
    pub fn object_uri(&self, path: &ObjectPath) -> String {
        match self {
            StagingBackend::Local(b) => format!("file://{}/{}", b.root.display(), path),
            StagingBackend::S3(b) => format!("s3://{}/{}", b.bucket, path),
        }
    }
}

/// Staging directory on the local filesystem.
pub struct LocalBackend {
    store: Arc<dyn ObjectStore>,
    root: PathBuf,
}

impl LocalBackend {
    pub fn new(dir: &Path) -> Result<Self, StagingError> {
        let root = std::fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf());
        let store = LocalFileSystem::new_with_prefix(&root)?;
        info!(root = %root.display(), "Staging to local directory");
        Ok(Self {
            store: Arc::new(store),
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Staging bucket on S3 (or an S3-compatible endpoint).
pub struct S3Backend {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    key_prefix: String,
}

impl S3Backend {
    pub fn new(aws: &AwsConfig) -> Result<Self, StagingError> {
        let bucket = aws
            .s3_bucket
            .as_deref()
            .ok_or_else(|| StagingError::NotConfigured("S3_BUCKET not set".into()))?;

        let mut builder = AmazonS3Builder::new()
            .with_region(&aws.region)
            .with_bucket_name(bucket);
        if let Some(key) = &aws.access_key_id {
            builder = builder.with_access_key_id(key);
        }
        if let Some(secret) = &aws.secret_access_key {
            builder = builder.with_secret_access_key(secret);
        }
        if let Some(token) = &aws.session_token {
            builder = builder.with_token(token);
        }
        if let Some(endpoint) = aws.endpoint_url.as_deref().filter(|e| !e.is_empty()) {
            // object_store needs a scheme on custom endpoints
            let endpoint = if endpoint.contains("://") {
                endpoint.to_string()
            } else {
                format!("https://{endpoint}")
            };
            builder = builder
                .with_allow_http(endpoint.starts_with("http://"))
                .with_endpoint(endpoint);
        }

        let key_prefix = aws
            .s3_prefix
            .as_deref()
            .unwrap_or_default()
            .trim_matches('/')
            .to_string();
        info!(bucket, prefix = %key_prefix, region = %aws.region, "Staging to S3");

        Ok(Self {
            store: Arc::new(builder.build()?),
            bucket: bucket.to_string(),
            key_prefix,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}
