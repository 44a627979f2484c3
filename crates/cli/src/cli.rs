use clap::{Args, Parser, Subcommand};

use sluice_core::{DataFormat, IngestOption, MappingKind};

/// Ingest files and streams into a cluster table.
///
/// Connection settings come from the environment (and `.env`); see
/// `sluice config` for the effective values.
#[derive(Parser, Debug)]
#[command(name = "sluice", about = "Queued and streaming ingestion client")]
pub struct CliArgs {
    /// Target database (overrides INGEST_DATABASE)
    #[arg(long, global = true)]
    pub database: Option<String>,

    /// Target table (overrides INGEST_TABLE)
    #[arg(long, global = true)]
    pub table: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Stage a local file or remote object reference and enqueue it
    Queue {
        /// Local file path or https:// / s3:// object reference
        path: String,

        #[command(flatten)]
        target: TargetArgs,

        /// Report failures and successes to the status table
        #[arg(long)]
        report_to_table: bool,

        /// Ask the backend to skip aggregation and flush immediately
        #[arg(long)]
        flush: bool,

        /// Delete the local file once it has been enqueued
        #[arg(long)]
        delete_source: bool,
    },

    /// Push a local file directly to the streaming endpoint
    Stream {
        path: String,

        #[command(flatten)]
        target: TargetArgs,

        /// Client request id sent with the write
        #[arg(long)]
        request_id: Option<String>,
    },

    /// Push stdin directly to the streaming endpoint
    StreamStdin {
        #[command(flatten)]
        target: TargetArgs,

        #[arg(long)]
        request_id: Option<String>,
    },

    /// Print the effective configuration (secrets redacted)
    Config,

    /// Check that every configured ingestion queue is reachable
    Health,
}

#[derive(Args, Debug, Default)]
pub struct TargetArgs {
    /// Data format, e.g. csv, json, multijson, parquet
    #[arg(long, value_parser = parse_format)]
    pub format: Option<DataFormat>,

    /// Name of a pre-created ingestion mapping
    #[arg(long)]
    pub mapping_ref: Option<String>,
}

impl TargetArgs {
    pub fn options(&self) -> Vec<IngestOption> {
        let mut options = Vec::new();
        if let Some(format) = self.format {
            options.push(IngestOption::format(format));
        }
        if let Some(name) = &self.mapping_ref {
            let kind = self
                .format
                .map(|f| f.mapping_kind())
                .unwrap_or(MappingKind::Csv);
            options.push(IngestOption::mapping_ref(name.clone(), kind));
        }
        options
    }
}

fn parse_format(s: &str) -> Result<DataFormat, String> {
    DataFormat::parse(s).ok_or_else(|| format!("unknown data format '{s}'"))
}
