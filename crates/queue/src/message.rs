//! Notification enqueued after content has been staged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sluice_core::Properties;

/// Queue message telling the backend where staged content lives and how to
/// ingest it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IngestionMessage {
    pub id: Uuid,
    pub blob_path: String,
    pub raw_data_size: u64,
    pub database_name: String,
    pub table_name: String,
    pub retain_blob_on_success: bool,
    pub flush_immediately: bool,
    pub ignore_first_record: bool,
    pub report_level: u8,
    pub report_method: u8,
    pub source_message_creation_time: DateTime<Utc>,
    pub additional_properties: AdditionalProperties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingestion_status_in_table: Option<StatusTableEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalProperties {
    pub authorization_context: String,
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingestion_mapping_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingestion_mapping: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingestion_mapping_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingest_if_not_exists: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatusTableEntry {
    pub table_connection_string: String,
    pub partition_key: String,
    pub row_key: String,
}

impl IngestionMessage {
    /// Build the message for content staged at `blob_path`.
    ///
    /// The message id is the property set's source id when one was assigned,
    /// so status records can be correlated with the original call.
    pub fn from_properties(props: &Properties, blob_path: &str, raw_data_size: u64) -> Self {
        let ingestion = &props.ingestion;
        let additional = &ingestion.additional;
        let entry = &ingestion.table_entry_ref;

        Self {
            id: props.source.id.unwrap_or_else(Uuid::new_v4),
            blob_path: blob_path.to_string(),
            raw_data_size,
            database_name: ingestion.database_name.clone(),
            table_name: ingestion.table_name.clone(),
            retain_blob_on_success: ingestion.retain_blob_on_success,
            flush_immediately: ingestion.flush_immediately,
            ignore_first_record: ingestion.ignore_first_record,
            report_level: ingestion.report_level.code(),
            report_method: ingestion.report_method.code(),
            source_message_creation_time: Utc::now(),
            additional_properties: AdditionalProperties {
                authorization_context: additional.auth_context.clone(),
                format: additional
                    .format
                    .map(|f| f.as_str().to_string())
                    .unwrap_or_else(|| "csv".to_string()),
                ingestion_mapping_reference: additional.ingestion_mapping_ref.clone(),
                ingestion_mapping: additional.ingestion_mapping.clone(),
                ingestion_mapping_type: additional
                    .ingestion_mapping_kind
                    .map(|k| k.as_str().to_string()),
                tags: additional.tags.clone(),
                ingest_if_not_exists: additional.ingest_if_not_exists.clone(),
                creation_time: additional.creation_time,
            },
            ingestion_status_in_table: entry.is_set().then(|| StatusTableEntry {
                table_connection_string: entry.table_connection_string.clone(),
                partition_key: entry.partition_key.clone(),
                row_key: entry.row_key.clone(),
            }),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_core::{DataFormat, MappingKind, ReportLevel, ReportMethod};

    fn props() -> Properties {
        let mut p = Properties::for_table("telemetry", "events");
        p.ingestion.retain_blob_on_success = true;
        p.ingestion.additional.auth_context = "ctx-token".into();
        p.ingestion.additional.format = Some(DataFormat::Json);
        p.ingestion.additional.ingestion_mapping_ref = Some("events_map".into());
        p.ingestion.additional.ingestion_mapping_kind = Some(MappingKind::Json);
        p
    }

    #[test]
    fn wire_field_names() {
        let msg = IngestionMessage::from_properties(&props(), "s3://bucket/a.json.gz", 1024);
        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();

        assert_eq!(json["BlobPath"], "s3://bucket/a.json.gz");
        assert_eq!(json["RawDataSize"], 1024);
        assert_eq!(json["DatabaseName"], "telemetry");
        assert_eq!(json["RetainBlobOnSuccess"], true);
        assert_eq!(json["ReportLevel"], 0);
        assert_eq!(json["AdditionalProperties"]["authorizationContext"], "ctx-token");
        assert_eq!(json["AdditionalProperties"]["format"], "json");
        assert_eq!(json["AdditionalProperties"]["ingestionMappingReference"], "events_map");
        assert_eq!(json["AdditionalProperties"]["ingestionMappingType"], "Json");
        assert!(json.get("IngestionStatusInTable").is_none());
        assert!(json["AdditionalProperties"].get("tags").is_none());
    }

    #[test]
    fn source_id_becomes_message_id() {
        let mut p = props();
        let id = Uuid::new_v4();
        p.source.id = Some(id);
        let msg = IngestionMessage::from_properties(&p, "file:///tmp/a", 1);
        assert_eq!(msg.id, id);
    }

    #[test]
    fn status_table_entry_included_when_set() {
        let mut p = props();
        let id = Uuid::new_v4();
        p.source.id = Some(id);
        p.ingestion.report_level = ReportLevel::FailuresAndSuccesses;
        p.ingestion.report_method = ReportMethod::Table;
        p.ingestion.table_entry_ref.table_connection_string =
            "https://acct.table.example.net/status".into();
        p.ingestion.table_entry_ref.partition_key = id.to_string();
        p.ingestion.table_entry_ref.row_key = Uuid::nil().to_string();

        let msg = IngestionMessage::from_properties(&p, "s3://bucket/a", 1);
        assert_eq!(msg.report_level, 2);
        assert_eq!(msg.report_method, 1);
        let entry = msg.ingestion_status_in_table.unwrap();
        assert_eq!(entry.partition_key, id.to_string());
    }
}
