//! Resource manager: the current ingestion resource snapshot and its refresh.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::ResourceError;
use crate::resource::ResourceSet;

/// Backend resource-discovery RPC.
#[async_trait]
pub trait ResourceDiscovery: Send + Sync {
    /// Fetch the current queue / container / status-table endpoints.
    async fn fetch_resources(&self) -> Result<ResourceSet, ResourceError>;

    /// Fetch the identity token embedded in queue messages.
    async fn fetch_auth_context(&self) -> Result<String, ResourceError>;
}

struct Snapshot {
    resources: Arc<ResourceSet>,
    auth_context: Arc<str>,
}

/// Cached ingestion resources and auth context for one cluster.
///
/// Readers always observe a complete snapshot: [`refresh`](Self::refresh)
/// fetches everything first and then swaps the whole snapshot in one write.
pub struct ResourceManager {
    discovery: Arc<dyn ResourceDiscovery>,
    snapshot: RwLock<Snapshot>,
}

impl ResourceManager {
    /// Create a manager and perform the initial fetch.
    pub async fn connect(discovery: Arc<dyn ResourceDiscovery>) -> Result<Self, ResourceError> {
        let snapshot = Self::fetch(discovery.as_ref()).await?;
        info!(
            queues = snapshot.resources.queues.len(),
            containers = snapshot.resources.containers.len(),
            tables = snapshot.resources.tables.len(),
            "Resource manager initialized"
        );
        Ok(Self {
            discovery,
            snapshot: RwLock::new(snapshot),
        })
    }

    async fn fetch(discovery: &dyn ResourceDiscovery) -> Result<Snapshot, ResourceError> {
        let resources = discovery.fetch_resources().await?;
        let auth_context = discovery.fetch_auth_context().await?;
        Ok(Snapshot {
            resources: Arc::new(resources),
            auth_context: Arc::from(auth_context),
        })
    }

    /// Current resource snapshot (possibly stale up to the refresh interval).
    pub fn resources(&self) -> Arc<ResourceSet> {
        let guard = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard.resources)
    }

    pub fn auth_context(&self) -> String {
        let guard = self.snapshot.read().unwrap_or_else(PoisonError::into_inner);
        guard.auth_context.to_string()
    }

    /// Re-run discovery and replace the cached snapshot.
    ///
    /// On failure the previous snapshot stays in place.
    pub async fn refresh(&self) -> Result<(), ResourceError> {
        let fresh = Self::fetch(self.discovery.as_ref()).await?;
        debug!(queues = fresh.resources.queues.len(), "Resource snapshot refreshed");
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        *guard = fresh;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::resource::ResourceUri;

    /// Returns one more queue on every fetch; fails once `fail_after` fetches happened.
    struct GrowingDiscovery {
        fetches: AtomicUsize,
        fail_after: usize,
    }

    #[async_trait]
    impl ResourceDiscovery for GrowingDiscovery {
        async fn fetch_resources(&self) -> Result<ResourceSet, ResourceError> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
            if n > self.fail_after {
                return Err(ResourceError::Discovery("backend unavailable".into()));
            }
            let queues = (0..n)
                .map(|i| ResourceUri::parse(&format!("https://acct.queue.example.net/q{i}")))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ResourceSet {
                queues,
                ..Default::default()
            })
        }

        async fn fetch_auth_context(&self) -> Result<String, ResourceError> {
            Ok(format!("token-{}", self.fetches.load(Ordering::SeqCst)))
        }
    }

    #[tokio::test]
    async fn refresh_replaces_whole_snapshot() {
        let discovery = Arc::new(GrowingDiscovery {
            fetches: AtomicUsize::new(0),
            fail_after: usize::MAX,
        });
        let mgr = ResourceManager::connect(discovery).await.unwrap();

        let before = mgr.resources();
        assert_eq!(before.queues.len(), 1);
        assert_eq!(mgr.auth_context(), "token-1");

        mgr.refresh().await.unwrap();

        // The old snapshot held by a reader is unaffected.
        assert_eq!(before.queues.len(), 1);
        assert_eq!(mgr.resources().queues.len(), 2);
        assert_eq!(mgr.auth_context(), "token-2");
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_snapshot() {
        let discovery = Arc::new(GrowingDiscovery {
            fetches: AtomicUsize::new(0),
            fail_after: 1,
        });
        let mgr = ResourceManager::connect(discovery).await.unwrap();

        assert!(mgr.refresh().await.is_err());
        assert_eq!(mgr.resources().queues.len(), 1);
        assert_eq!(mgr.auth_context(), "token-1");
    }

    #[tokio::test]
    async fn connect_propagates_discovery_failure() {
        let discovery = Arc::new(GrowingDiscovery {
            fetches: AtomicUsize::new(0),
            fail_after: 0,
        });
        let err = ResourceManager::connect(discovery).await.err().unwrap();
        assert!(matches!(err, ResourceError::Discovery(_)));
    }
}
