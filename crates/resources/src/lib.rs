//! Backend-discovered ingestion resources and the per-cluster manager cache.

pub mod cache;
pub mod client;
pub mod discovery;
pub mod error;
pub mod manager;
pub mod resource;

pub use cache::ManagerCache;
pub use client::{ClusterClient, StaticToken, TokenProvider};
pub use discovery::StaticDiscovery;
pub use error::ResourceError;
pub use manager::{ResourceDiscovery, ResourceManager};
pub use resource::{ResourceSet, ResourceUri};
