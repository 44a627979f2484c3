use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use crate::error::ResourceError;
use crate::manager::ResourceDiscovery;

/// Supplies bearer tokens for calls to the cluster.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<String, ResourceError>;
}

/// Fixed token, for pre-acquired credentials and local development.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<String, ResourceError> {
        if self.0.is_empty() {
            return Err(ResourceError::Auth("no token configured".into()));
        }
        Ok(self.0.clone())
    }
}

/// Handle to one backend cluster.
///
/// Two clients with the same endpoint share one identity and therefore one
/// [`ResourceManager`](crate::ResourceManager) in a [`ManagerCache`](crate::ManagerCache).
#[derive(Clone)]
pub struct ClusterClient {
    endpoint: Url,
    identity: String,
    discovery: Arc<dyn ResourceDiscovery>,
    auth: Arc<dyn TokenProvider>,
}

impl ClusterClient {
    pub fn new(
        endpoint: &str,
        discovery: Arc<dyn ResourceDiscovery>,
        auth: Arc<dyn TokenProvider>,
    ) -> Result<Self, ResourceError> {
        let endpoint = Url::parse(endpoint).map_err(|e| ResourceError::InvalidUri {
            uri: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        let identity = endpoint.as_str().trim_end_matches('/').to_ascii_lowercase();
        Ok(Self {
            endpoint,
            identity,
            discovery,
            auth,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Normalized endpoint used as the cache key.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn discovery(&self) -> Arc<dyn ResourceDiscovery> {
        Arc::clone(&self.discovery)
    }

    pub fn auth(&self) -> Arc<dyn TokenProvider> {
        Arc::clone(&self.auth)
    }
}

impl fmt::Debug for ClusterClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterClient")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}
