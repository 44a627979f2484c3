//! Ingestion modes and the options callers pass to entry points.
//!
//! Options are applied in two phases: every option is first checked against
//! the active [`IngestMode`], then all of them are applied in call order to a
//! scratch copy of the property set. The copy replaces the caller's set only
//! when every option applied and no two options conflict.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::{IngestError, Op};
use crate::properties::{DataFormat, MappingKind, Properties, ReportLevel, ReportMethod};

/// Source kind × delivery path of an ingestion call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IngestMode {
    QueuedFile,
    QueuedBlob,
    QueuedReader,
    StreamingFile,
    StreamingReader,
}

impl IngestMode {
    pub fn is_queued(&self) -> bool {
        matches!(
            self,
            IngestMode::QueuedFile | IngestMode::QueuedBlob | IngestMode::QueuedReader
        )
    }

    pub fn is_streaming(&self) -> bool {
        !self.is_queued()
    }
}

impl fmt::Display for IngestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IngestMode::QueuedFile => "queued file",
            IngestMode::QueuedBlob => "queued blob",
            IngestMode::QueuedReader => "queued reader",
            IngestMode::StreamingFile => "streaming file",
            IngestMode::StreamingReader => "streaming reader",
        };
        f.write_str(name)
    }
}

const ALL_MODES: &[IngestMode] = &[
    IngestMode::QueuedFile,
    IngestMode::QueuedBlob,
    IngestMode::QueuedReader,
    IngestMode::StreamingFile,
    IngestMode::StreamingReader,
];

const QUEUED: &[IngestMode] = &[
    IngestMode::QueuedFile,
    IngestMode::QueuedBlob,
    IngestMode::QueuedReader,
];

const STREAMING: &[IngestMode] = &[IngestMode::StreamingFile, IngestMode::StreamingReader];

/// A caller-supplied ingestion option.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOption {
    FileFormat(DataFormat),
    /// Reference to a mapping pre-created on the table.
    IngestionMappingRef { name: String, kind: MappingKind },
    /// Inline mapping JSON.
    IngestionMapping { mapping: String, kind: MappingKind },
    FlushImmediately,
    IgnoreFirstRecord,
    /// Remove the local file once it has been staged and enqueued.
    DeleteSource,
    /// Report failures and successes to the status table.
    ReportResultToTable,
    ReportStatus { level: ReportLevel, method: ReportMethod },
    Tags(Vec<String>),
    /// Skip the ingestion if an extent with one of these tags exists.
    IfNotExists(Vec<String>),
    CreationTime(DateTime<Utc>),
    RawDataSize(u64),
    ClientRequestId(String),
}

impl IngestOption {
    pub fn format(format: DataFormat) -> Self {
        IngestOption::FileFormat(format)
    }

    pub fn mapping_ref(name: impl Into<String>, kind: MappingKind) -> Self {
        IngestOption::IngestionMappingRef {
            name: name.into(),
            kind,
        }
    }

    pub fn mapping(mapping: impl Into<String>, kind: MappingKind) -> Self {
        IngestOption::IngestionMapping {
            mapping: mapping.into(),
            kind,
        }
    }

    pub fn client_request_id(id: impl Into<String>) -> Self {
        IngestOption::ClientRequestId(id.into())
    }

    pub fn name(&self) -> &'static str {
        match self {
            IngestOption::FileFormat(_) => "FileFormat",
            IngestOption::IngestionMappingRef { .. } => "IngestionMappingRef",
            IngestOption::IngestionMapping { .. } => "IngestionMapping",
            IngestOption::FlushImmediately => "FlushImmediately",
            IngestOption::IgnoreFirstRecord => "IgnoreFirstRecord",
            IngestOption::DeleteSource => "DeleteSource",
            IngestOption::ReportResultToTable => "ReportResultToTable",
            IngestOption::ReportStatus { .. } => "ReportStatus",
            IngestOption::Tags(_) => "Tags",
            IngestOption::IfNotExists(_) => "IfNotExists",
            IngestOption::CreationTime(_) => "CreationTime",
            IngestOption::RawDataSize(_) => "RawDataSize",
            IngestOption::ClientRequestId(_) => "ClientRequestId",
        }
    }

    /// Modes in which this option may be used.
    pub fn supported_modes(&self) -> &'static [IngestMode] {
        match self {
            IngestOption::FileFormat(_) | IngestOption::IngestionMappingRef { .. } => ALL_MODES,
            IngestOption::IngestionMapping { .. }
            | IngestOption::FlushImmediately
            | IngestOption::IgnoreFirstRecord
            | IngestOption::ReportResultToTable
            | IngestOption::ReportStatus { .. }
            | IngestOption::Tags(_)
            | IngestOption::IfNotExists(_)
            | IngestOption::CreationTime(_) => QUEUED,
            IngestOption::DeleteSource => &[IngestMode::QueuedFile],
            IngestOption::RawDataSize(_) => &[IngestMode::QueuedFile, IngestMode::QueuedBlob],
            IngestOption::ClientRequestId(_) => STREAMING,
        }
    }

    pub fn supports(&self, mode: IngestMode) -> bool {
        self.supported_modes().contains(&mode)
    }

    /// Mutate the fields this option owns.
    fn apply(&self, props: &mut Properties) {
        let ingestion = &mut props.ingestion;
        match self {
            IngestOption::FileFormat(format) => ingestion.additional.format = Some(*format),
            IngestOption::IngestionMappingRef { name, kind } => {
                ingestion.additional.ingestion_mapping_ref = Some(name.clone());
                ingestion.additional.ingestion_mapping_kind = Some(*kind);
            }
            IngestOption::IngestionMapping { mapping, kind } => {
                ingestion.additional.ingestion_mapping = Some(mapping.clone());
                ingestion.additional.ingestion_mapping_kind = Some(*kind);
            }
            IngestOption::FlushImmediately => ingestion.flush_immediately = true,
            IngestOption::IgnoreFirstRecord => ingestion.ignore_first_record = true,
            IngestOption::DeleteSource => props.source.delete_local_source = true,
            IngestOption::ReportResultToTable => {
                ingestion.report_level = ReportLevel::FailuresAndSuccesses;
                ingestion.report_method = ReportMethod::Table;
            }
            IngestOption::ReportStatus { level, method } => {
                ingestion.report_level = *level;
                ingestion.report_method = *method;
            }
            IngestOption::Tags(tags) => ingestion.additional.tags.extend(tags.iter().cloned()),
            IngestOption::IfNotExists(tags) => ingestion
                .additional
                .ingest_if_not_exists
                .extend(tags.iter().cloned()),
            IngestOption::CreationTime(at) => ingestion.additional.creation_time = Some(*at),
            IngestOption::RawDataSize(size) => ingestion.raw_data_size = Some(*size),
            IngestOption::ClientRequestId(id) => {
                props.streaming.client_request_id = Some(id.clone())
            }
        }
    }
}

/// Apply `options` to `props` for an ingestion running in `mode`.
///
/// On error `props` is left untouched.
pub fn apply_options(
    props: &mut Properties,
    op: Op,
    mode: IngestMode,
    options: &[IngestOption],
) -> Result<(), IngestError> {
    if let Some(bad) = options.iter().find(|o| !o.supports(mode)) {
        return Err(IngestError::argument(
            op,
            format!("option {} is not supported for {} ingestion", bad.name(), mode),
        ));
    }

    let mut scratch = props.clone();
    for option in options {
        option.apply(&mut scratch);
    }
    check_conflicts(&scratch, op)?;

    *props = scratch;
    Ok(())
}

fn check_conflicts(props: &Properties, op: Op) -> Result<(), IngestError> {
    let additional = &props.ingestion.additional;

    if additional.ingestion_mapping.is_some() && additional.ingestion_mapping_ref.is_some() {
        return Err(IngestError::argument(
            op,
            "IngestionMapping and IngestionMappingRef cannot be used together",
        ));
    }

    if let (Some(format), Some(kind)) = (additional.format, additional.ingestion_mapping_kind) {
        if format.mapping_kind() != kind {
            return Err(IngestError::argument(
                op,
                format!(
                    "mapping kind {} does not match format {}",
                    kind.as_str(),
                    format
                ),
            ));
        }
    }

    Ok(())
}
