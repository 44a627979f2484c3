//! Queue error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("message encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("send error: {0}")]
    Send(String),

    #[error("queue not found: {0}")]
    NotFound(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("provider error: {0}")]
    Provider(String),
}
