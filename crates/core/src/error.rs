use std::fmt;

use thiserror::Error;

/// Boxed collaborator error, kept intact so callers can downcast it.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The operation that failed, attached to every [`IngestError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    FileIngest,
    BlobIngest,
    ReaderIngest,
    StreamIngest,
    ResourceDiscovery,
    Connect,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Op::FileIngest => "FileIngest",
            Op::BlobIngest => "BlobIngest",
            Op::ReaderIngest => "ReaderIngest",
            Op::StreamIngest => "StreamIngest",
            Op::ResourceDiscovery => "ResourceDiscovery",
            Op::Connect => "Connect",
        };
        f.write_str(name)
    }
}

/// Coarse classification of an [`IngestError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Argument,
    Configuration,
    Backend,
    Cancelled,
    Io,
}

/// Error returned by every ingestion entry point.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Invalid or missing caller input. Raised before any I/O.
    #[error("{op}: invalid argument: {reason}")]
    Argument { op: Op, reason: String },

    /// A backend resource the call depends on is not available.
    #[error("{op}: configuration error: {reason}")]
    Configuration { op: Op, reason: String },

    /// Staging, enqueue or streaming-write failure from a collaborator.
    #[error("{op}: {source}")]
    Backend {
        op: Op,
        #[source]
        source: BoxError,
    },

    #[error("{op}: operation cancelled")]
    Cancelled { op: Op },

    #[error("{op}: IO error: {source}")]
    Io {
        op: Op,
        #[source]
        source: std::io::Error,
    },
}

impl IngestError {
    pub fn argument(op: Op, reason: impl Into<String>) -> Self {
        IngestError::Argument {
            op,
            reason: reason.into(),
        }
    }

    pub fn configuration(op: Op, reason: impl Into<String>) -> Self {
        IngestError::Configuration {
            op,
            reason: reason.into(),
        }
    }

    pub fn backend(op: Op, source: impl Into<BoxError>) -> Self {
        IngestError::Backend {
            op,
            source: source.into(),
        }
    }

    pub fn io(op: Op, source: std::io::Error) -> Self {
        IngestError::Io { op, source }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::Argument { .. } => ErrorKind::Argument,
            IngestError::Configuration { .. } => ErrorKind::Configuration,
            IngestError::Backend { .. } => ErrorKind::Backend,
            IngestError::Cancelled { .. } => ErrorKind::Cancelled,
            IngestError::Io { .. } => ErrorKind::Io,
        }
    }

    pub fn op(&self) -> Op {
        match self {
            IngestError::Argument { op, .. }
            | IngestError::Configuration { op, .. }
            | IngestError::Backend { op, .. }
            | IngestError::Cancelled { op }
            | IngestError::Io { op, .. } => *op,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, IngestError::Cancelled { .. })
    }
}
