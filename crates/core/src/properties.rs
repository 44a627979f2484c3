//! Per-call ingestion property set.
//!
//! A fresh [`Properties`] value is built for every ingestion call, seeded by
//! the orchestrator and then mutated by [`IngestOption`](crate::IngestOption)s.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Row key written for every status-table entry. Partition key carries the
/// source id, so one row per partition is enough.
pub const STATUS_ROW_KEY: Uuid = Uuid::nil();

// ── Data formats ──────────────────────────────────────────────

/// Wire format of the ingested payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    Csv,
    Tsv,
    Tsve,
    Scsv,
    Sohsv,
    Psv,
    Txt,
    Raw,
    Json,
    MultiJson,
    SingleJson,
    Avro,
    ApacheAvro,
    Parquet,
    Orc,
    SStream,
    W3cLogFile,
}

const ALL_FORMATS: &[DataFormat] = &[
    DataFormat::Csv,
    DataFormat::Tsv,
    DataFormat::Tsve,
    DataFormat::Scsv,
    DataFormat::Sohsv,
    DataFormat::Psv,
    DataFormat::Txt,
    DataFormat::Raw,
    DataFormat::Json,
    DataFormat::MultiJson,
    DataFormat::SingleJson,
    DataFormat::Avro,
    DataFormat::ApacheAvro,
    DataFormat::Parquet,
    DataFormat::Orc,
    DataFormat::SStream,
    DataFormat::W3cLogFile,
];

impl DataFormat {
    /// Name used on the wire (`streamFormat` parameter, queue message `format`).
    pub fn as_str(&self) -> &'static str {
        match self {
            DataFormat::Csv => "csv",
            DataFormat::Tsv => "tsv",
            DataFormat::Tsve => "tsve",
            DataFormat::Scsv => "scsv",
            DataFormat::Sohsv => "sohsv",
            DataFormat::Psv => "psv",
            DataFormat::Txt => "txt",
            DataFormat::Raw => "raw",
            DataFormat::Json => "json",
            DataFormat::MultiJson => "multijson",
            DataFormat::SingleJson => "singlejson",
            DataFormat::Avro => "avro",
            DataFormat::ApacheAvro => "apacheavro",
            DataFormat::Parquet => "parquet",
            DataFormat::Orc => "orc",
            DataFormat::SStream => "sstream",
            DataFormat::W3cLogFile => "w3clogfile",
        }
    }

    /// Parse a wire name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.trim().to_ascii_lowercase();
        ALL_FORMATS.iter().copied().find(|f| f.as_str() == lower)
    }

    /// Kind of ingestion mapping this format accepts.
    pub fn mapping_kind(&self) -> MappingKind {
        match self {
            DataFormat::Csv
            | DataFormat::Tsv
            | DataFormat::Tsve
            | DataFormat::Scsv
            | DataFormat::Sohsv
            | DataFormat::Psv
            | DataFormat::Txt
            | DataFormat::Raw
            | DataFormat::SStream => MappingKind::Csv,
            DataFormat::Json | DataFormat::MultiJson | DataFormat::SingleJson => MappingKind::Json,
            DataFormat::Avro | DataFormat::ApacheAvro => MappingKind::Avro,
            DataFormat::Parquet => MappingKind::Parquet,
            DataFormat::Orc => MappingKind::Orc,
            DataFormat::W3cLogFile => MappingKind::W3cLogFile,
        }
    }

    /// Infer the format from a file name, ignoring a trailing `.gz` / `.zip`.
    ///
    /// `data.csv.gz` is csv; `data.gz` has no inferable format. A query
    /// string or fragment on a URL is ignored.
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        let name = Path::new(path).file_name()?.to_str()?.to_ascii_lowercase();
        let name = name
            .strip_suffix(".gz")
            .or_else(|| name.strip_suffix(".zip"))
            .unwrap_or(&name);
        let ext = Path::new(name).extension()?.to_str()?;
        Self::parse(ext)
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of a server-side ingestion mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingKind {
    Csv,
    Json,
    Avro,
    Parquet,
    Orc,
    W3cLogFile,
}

impl MappingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MappingKind::Csv => "Csv",
            MappingKind::Json => "Json",
            MappingKind::Avro => "Avro",
            MappingKind::Parquet => "Parquet",
            MappingKind::Orc => "Orc",
            MappingKind::W3cLogFile => "W3CLogFile",
        }
    }
}

// ── Compression ───────────────────────────────────────────────

/// Compression detected on a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionType {
    /// The source could not be inspected.
    #[default]
    Unknown,
    /// Plain, uncompressed content.
    None,
    Gzip,
    Zip,
}

impl CompressionType {
    /// True for a recognized compression scheme.
    pub fn is_compressed(&self) -> bool {
        matches!(self, CompressionType::Gzip | CompressionType::Zip)
    }
}

// ── Status reporting ──────────────────────────────────────────

/// Which outcomes the backend reports back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ReportLevel {
    #[default]
    FailuresOnly,
    None,
    FailuresAndSuccesses,
}

impl ReportLevel {
    /// Numeric code used in queue messages.
    pub fn code(&self) -> u8 {
        match self {
            ReportLevel::FailuresOnly => 0,
            ReportLevel::None => 1,
            ReportLevel::FailuresAndSuccesses => 2,
        }
    }
}

/// Where the backend reports ingestion status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ReportMethod {
    #[default]
    Queue,
    Table,
    QueueAndTable,
}

impl ReportMethod {
    /// Numeric code used in queue messages.
    pub fn code(&self) -> u8 {
        match self {
            ReportMethod::Queue => 0,
            ReportMethod::Table => 1,
            ReportMethod::QueueAndTable => 2,
        }
    }

    pub fn targets_table(&self) -> bool {
        matches!(self, ReportMethod::Table | ReportMethod::QueueAndTable)
    }
}

// ── Property set ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Properties {
    pub ingestion: Ingestion,
    pub streaming: Streaming,
    pub source: Source,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Ingestion {
    pub database_name: String,
    pub table_name: String,
    pub retain_blob_on_success: bool,
    pub flush_immediately: bool,
    pub ignore_first_record: bool,
    pub report_level: ReportLevel,
    pub report_method: ReportMethod,
    /// Populated only when status goes to a status table.
    pub table_entry_ref: TableEntryRef,
    /// Uncompressed size hint for the backend.
    pub raw_data_size: Option<u64>,
    pub additional: Additional,
}

/// Location of the status-table row for one ingestion.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableEntryRef {
    pub table_connection_string: String,
    pub partition_key: String,
    pub row_key: String,
}

impl TableEntryRef {
    pub fn is_set(&self) -> bool {
        !self.table_connection_string.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Additional {
    pub format: Option<DataFormat>,
    pub ingestion_mapping_ref: Option<String>,
    /// Inline mapping JSON.
    pub ingestion_mapping: Option<String>,
    pub ingestion_mapping_kind: Option<MappingKind>,
    /// Never serialized.
    #[serde(skip_serializing)]
    pub auth_context: String,
    pub tags: Vec<String>,
    pub ingest_if_not_exists: Vec<String>,
    pub creation_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Streaming {
    pub should_compress: bool,
    pub client_request_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Source {
    /// Correlation id linking a queued ingestion to its status record.
    pub id: Option<Uuid>,
    pub delete_local_source: bool,
}

impl Properties {
    /// Property set seeded with the target database and table.
    pub fn for_table(database: &str, table: &str) -> Self {
        Self {
            ingestion: Ingestion {
                database_name: database.to_string(),
                table_name: table.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Fill the format from the file name when no option set one.
    ///
    /// Returns the format in effect afterwards; unknown extensions fall back to csv.
    pub fn infer_format(&mut self, path: &str) -> DataFormat {
        let format = *self
            .ingestion
            .additional
            .format
            .get_or_insert_with(|| DataFormat::from_path(path).unwrap_or(DataFormat::Csv));
        format
    }
}
