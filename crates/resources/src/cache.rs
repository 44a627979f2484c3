//! Process-wide cache of resource managers, one per cluster.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Mutex;
use tracing::info;

use crate::client::ClusterClient;
use crate::error::ResourceError;
use crate::manager::ResourceManager;

/// One [`ResourceManager`] per cluster identity.
///
/// Owned by the application's composition root. Lookups take a shared read
/// lock; construction is serialized behind an async mutex and re-checks the
/// map, so concurrent first use builds exactly one manager per identity.
/// Managers live as long as the cache.
#[derive(Default)]
pub struct ManagerCache {
    managers: RwLock<HashMap<String, Arc<ResourceManager>>>,
    init: Mutex<()>,
}

impl ManagerCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_create(
        &self,
        client: &ClusterClient,
    ) -> Result<Arc<ResourceManager>, ResourceError> {
        if let Some(mgr) = self.lookup(client.identity()) {
            return Ok(mgr);
        }

        let _guard = self.init.lock().await;
        if let Some(mgr) = self.lookup(client.identity()) {
            return Ok(mgr);
        }

        let mgr = Arc::new(ResourceManager::connect(client.discovery()).await?);
        self.managers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(client.identity().to_string(), Arc::clone(&mgr));
        info!(cluster = %client.identity(), "Created resource manager");
        Ok(mgr)
    }

    fn lookup(&self, identity: &str) -> Option<Arc<ResourceManager>> {
        self.managers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.managers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
