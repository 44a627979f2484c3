use async_trait::async_trait;

use sluice_core::config::ResourcesConfig;

use crate::error::ResourceError;
use crate::manager::ResourceDiscovery;
use crate::resource::ResourceSet;

/// Discovery backed by a fixed resource set, typically read from config.
pub struct StaticDiscovery {
    resources: ResourceSet,
    auth_context: String,
}

impl StaticDiscovery {
    pub fn new(resources: ResourceSet, auth_context: impl Into<String>) -> Self {
        Self {
            resources,
            auth_context: auth_context.into(),
        }
    }

    pub fn from_config(config: &ResourcesConfig) -> Result<Self, ResourceError> {
        let resources = ResourceSet::from_urls(
            &config.queue_urls,
            &config.container_urls,
            &config.status_table_urls,
        )?;
        Ok(Self::new(
            resources,
            config.auth_context.clone().unwrap_or_default(),
        ))
    }
}

#[async_trait]
impl ResourceDiscovery for StaticDiscovery {
    async fn fetch_resources(&self) -> Result<ResourceSet, ResourceError> {
        Ok(self.resources.clone())
    }

    async fn fetch_auth_context(&self) -> Result<String, ResourceError> {
        Ok(self.auth_context.clone())
    }
}
