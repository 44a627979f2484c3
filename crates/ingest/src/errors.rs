//! Mapping collaborator failures onto [`IngestError`].

use tokio_util::sync::CancellationToken;

use sluice_core::{IngestError, Op};
use sluice_storage::StagingError;

use crate::conn::ConnError;

/// Fail fast when the caller has already given up.
pub(crate) fn ensure_live(cancel: &CancellationToken, op: Op) -> Result<(), IngestError> {
    if cancel.is_cancelled() {
        return Err(IngestError::Cancelled { op });
    }
    Ok(())
}

pub(crate) fn staging_error(op: Op, err: StagingError) -> IngestError {
    match err {
        StagingError::Cancelled => IngestError::Cancelled { op },
        StagingError::InvalidPath { path, reason } => {
            IngestError::argument(op, format!("{path}: {reason}"))
        }
        StagingError::NotConfigured(reason) => IngestError::configuration(op, reason),
        other => IngestError::backend(op, other),
    }
}

pub(crate) fn conn_error(op: Op, err: ConnError) -> IngestError {
    match err {
        ConnError::Cancelled => IngestError::Cancelled { op },
        other => IngestError::backend(op, other),
    }
}
