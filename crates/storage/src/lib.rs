//! Staging collaborator: source classification, compression, durable
//! upload and queue notification.

pub mod backend;
pub mod compress;
pub mod error;
pub mod path;
pub mod stager;

pub use backend::{LocalBackend, S3Backend, StagingBackend};
pub use compress::{gzip_all, payload, GzipStream, Payload};
pub use error::StagingError;
pub use path::{compression_discovery, is_local_path, sniff_compression};
pub use stager::{ObjectStoreStager, Stager};
