mod cli;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use sluice_core::config::{load_dotenv, Config};
use sluice_core::IngestOption;
use sluice_ingest::{IngestionResult, QueuedIngestor, StreamingIngestor};
use sluice_queue::{check_queues, SqsNotifier};
use sluice_resources::{ClusterClient, ManagerCache, StaticDiscovery, StaticToken};
use sluice_storage::StagingBackend;

use crate::cli::{CliArgs, Command};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();

    load_dotenv();
    let config = Config::from_env();
    config.log_summary();

    let database = args.database.unwrap_or_else(|| config.cluster.database.clone());
    let table = args.table.unwrap_or_else(|| config.cluster.table.clone());

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling ingestion");
                cancel.cancel();
            }
        });
    }

    let result = match args.command {
        Command::Queue {
            path,
            target,
            report_to_table,
            flush,
            delete_source,
        } => {
            let mut options = target.options();
            if report_to_table {
                options.push(IngestOption::ReportResultToTable);
            }
            if flush {
                options.push(IngestOption::FlushImmediately);
            }
            if delete_source {
                options.push(IngestOption::DeleteSource);
            }

            let client = cluster_client(&config)?;
            let cache = ManagerCache::new();
            let backend =
                StagingBackend::from_config(&config).context("failed to open staging storage")?;
            let notifier = Arc::new(SqsNotifier::new(&config.aws).await);
            let ingestor =
                QueuedIngestor::connect(&cache, &client, database, table, backend, notifier)
                    .await
                    .context("failed to resolve ingestion resources")?;

            ingestor
                .from_file(&cancel, &path, &options)
                .await
                .with_context(|| format!("queued ingestion of '{path}' failed"))?
        }
        Command::Stream {
            path,
            target,
            request_id,
        } => {
            let options = streaming_options(target.options(), request_id);
            streaming(&config, database, table)?
                .from_file(&cancel, &path, &options)
                .await
                .with_context(|| format!("streaming ingestion of '{path}' failed"))?
        }
        Command::StreamStdin { target, request_id } => {
            let options = streaming_options(target.options(), request_id);
            streaming(&config, database, table)?
                .from_reader(&cancel, tokio::io::stdin(), &options)
                .await
                .context("streaming ingestion from stdin failed")?
        }
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config.redacted_summary())?);
            return Ok(());
        }
        Command::Health => {
            let queues = &config.resources.queue_urls;
            if queues.is_empty() {
                bail!("no ingestion queues configured (INGEST_QUEUE_URLS)");
            }
            let notifier = SqsNotifier::new(&config.aws).await;
            let reports = check_queues(&notifier, queues).await;
            println!("{}", serde_json::to_string_pretty(&reports)?);

            let unhealthy = reports.iter().filter(|r| !r.is_healthy()).count();
            if unhealthy > 0 {
                bail!("{unhealthy} of {} queues failed the health check", reports.len());
            }
            return Ok(());
        }
    };

    report(&result)
}

/// Cluster handle built from statically configured resources and token.
fn cluster_client(config: &Config) -> Result<ClusterClient> {
    let discovery = StaticDiscovery::from_config(&config.resources)
        .context("invalid ingestion resource configuration")?;
    let token = StaticToken::new(config.cluster.auth_token.clone().unwrap_or_default());
    ClusterClient::new(&config.cluster.endpoint, Arc::new(discovery), Arc::new(token))
        .with_context(|| format!("invalid cluster endpoint '{}'", config.cluster.endpoint))
}

fn streaming(config: &Config, database: String, table: String) -> Result<StreamingIngestor> {
    let client = cluster_client(config)?;
    let timeout = Duration::from_secs(config.streaming.timeout_secs);
    Ok(StreamingIngestor::with_http(&client, database, table, timeout))
}

fn streaming_options(
    mut options: Vec<IngestOption>,
    request_id: Option<String>,
) -> Vec<IngestOption> {
    if let Some(id) = request_id {
        options.push(IngestOption::client_request_id(id));
    }
    options
}

fn report(result: &IngestionResult) -> Result<()> {
    info!(
        status = %result.status(),
        source_id = ?result.source_id(),
        "Ingestion finished"
    );
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}
