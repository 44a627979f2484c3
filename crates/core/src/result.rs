//! Handle returned by ingestion entry points.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::properties::{Properties, ReportLevel, ReportMethod};

/// Ingestion status as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    /// Not yet handed to the backend.
    Pending,
    /// Staged and enqueued; the backend processes it asynchronously.
    Queued,
    Success,
    Failed,
    PartiallySucceeded,
    Skipped,
}

impl Status {
    pub fn is_final(&self) -> bool {
        !matches!(self, Status::Pending | Status::Queued)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Pending => "Pending",
            Status::Queued => "Queued",
            Status::Success => "Success",
            Status::Failed => "Failed",
            Status::PartiallySucceeded => "PartiallySucceeded",
            Status::Skipped => "Skipped",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusRecord {
    pub status: Status,
    pub ingestion_source_id: Option<Uuid>,
    pub ingestion_source_path: String,
    pub database: String,
    pub table: String,
    pub updated_on: DateTime<Utc>,
}

/// Where and how to poll for the outcome of a queued ingestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollingHint {
    pub report_level: ReportLevel,
    pub report_method: ReportMethod,
    /// Status table URI, present when the report method targets a table.
    pub status_table: Option<String>,
    pub partition_key: Option<String>,
    pub row_key: Option<String>,
}

impl PollingHint {
    pub fn from_properties(props: &Properties) -> Self {
        let entry = &props.ingestion.table_entry_ref;
        let set = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Self {
            report_level: props.ingestion.report_level,
            report_method: props.ingestion.report_method,
            status_table: set(&entry.table_connection_string),
            partition_key: set(&entry.partition_key),
            row_key: set(&entry.row_key),
        }
    }

    /// False when the backend was asked not to report anything.
    pub fn is_pollable(&self) -> bool {
        self.report_level != ReportLevel::None
    }
}

/// Outcome of one ingestion call.
///
/// Built by the orchestrator, finalized once, then handed to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct IngestionResult {
    properties: Properties,
    record: StatusRecord,
    hint: Option<PollingHint>,
}

impl IngestionResult {
    /// Pending result snapshotting `props`.
    pub fn pending(props: Properties, source_path: impl Into<String>) -> Self {
        let record = StatusRecord {
            status: Status::Pending,
            ingestion_source_id: props.source.id,
            ingestion_source_path: source_path.into(),
            database: props.ingestion.database_name.clone(),
            table: props.ingestion.table_name.clone(),
            updated_on: Utc::now(),
        };
        Self {
            properties: props,
            record,
            hint: None,
        }
    }

    /// Mark as handed to the queue, attaching polling hints.
    pub fn queued(mut self) -> Self {
        self.hint = Some(PollingHint::from_properties(&self.properties));
        self.finish(Status::Queued)
    }

    /// Mark as acknowledged by the backend.
    pub fn succeeded(self) -> Self {
        self.finish(Status::Success)
    }

    fn finish(mut self, status: Status) -> Self {
        self.record.status = status;
        self.record.updated_on = Utc::now();
        self
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn record(&self) -> &StatusRecord {
        &self.record
    }

    pub fn status(&self) -> Status {
        self.record.status
    }

    pub fn source_id(&self) -> Option<Uuid> {
        self.record.ingestion_source_id
    }

    pub fn source_path(&self) -> &str {
        &self.record.ingestion_source_path
    }

    pub fn polling_hint(&self) -> Option<&PollingHint> {
        self.hint.as_ref()
    }
}
