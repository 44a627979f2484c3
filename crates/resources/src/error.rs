use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("invalid resource URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("resource discovery failed: {0}")]
    Discovery(String),

    #[error("authentication error: {0}")]
    Auth(String),
}
