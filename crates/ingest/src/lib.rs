//! Queued and streaming ingestion orchestrators.
//!
//! [`QueuedIngestor`] stages content in durable storage and enqueues a
//! notification for the backend to process asynchronously.
//! [`StreamingIngestor`] pushes content directly over a lazily opened
//! connection and returns once the backend acknowledges it.

pub mod conn;
mod errors;
pub mod queued;
pub mod streaming;

pub use conn::{
    ConnError, ConnectionFactory, HttpConnectionFactory, HttpStreamConnection, StreamConnection,
    StreamRequest,
};
pub use queued::QueuedIngestor;
pub use streaming::StreamingIngestor;

pub use sluice_core::{
    DataFormat, ErrorKind, IngestError, IngestOption, IngestionResult, MappingKind, Op, Status,
};
pub use tokio_util::sync::CancellationToken;
