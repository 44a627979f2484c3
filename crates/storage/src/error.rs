use thiserror::Error;

use sluice_queue::QueueError;

#[derive(Error, Debug)]
pub enum StagingError {
    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("enqueue failed: {0}")]
    Queue(#[from] QueueError),

    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("not configured: {0}")]
    NotConfigured(String),

    #[error("staging cancelled")]
    Cancelled,
}
