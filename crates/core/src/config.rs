use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_list(profile: &str, key: &str) -> Vec<String> {
    profiled_env_opt(profile, key)
        .map(|v| split_list(&v))
        .unwrap_or_default()
}

/// Split a comma-separated list, dropping blanks.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub cluster: ClusterConfig,
    pub resources: ResourcesConfig,
    pub aws: AwsConfig,
    pub staging: StagingConfig,
    pub streaming: StreamingConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `SLUICE_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("SLUICE_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            cluster: ClusterConfig::from_env_profiled(p),
            resources: ResourcesConfig::from_env_profiled(p),
            aws: AwsConfig::from_env_profiled(p),
            staging: StagingConfig::from_env_profiled(p),
            streaming: StreamingConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  cluster:     endpoint={}, target={}.{}", self.cluster.endpoint, self.cluster.database, self.cluster.table);
        tracing::info!(
            "  resources:   queues={}, containers={}, status_tables={}",
            self.resources.queue_urls.len(),
            self.resources.container_urls.len(),
            self.resources.status_table_urls.len()
        );
        tracing::info!("  aws:         region={}, bucket={}", self.aws.region, self.aws.s3_bucket.as_deref().unwrap_or("(none)"));
        tracing::info!("  staging:     dir={}", self.staging.local_dir.display());
        tracing::info!("  streaming:   timeout={}s", self.streaming.timeout_secs);
    }

    /// Return a redacted view safe for printing (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "cluster": {
                "endpoint": self.cluster.endpoint,
                "database": self.cluster.database,
                "table": self.cluster.table,
                "authenticated": self.cluster.auth_token.is_some(),
            },
            "resources": {
                "queues": self.resources.queue_urls.len(),
                "containers": self.resources.container_urls.len(),
                "status_tables": self.resources.status_table_urls.len(),
            },
            "aws": {
                "region": self.aws.region,
                "s3_bucket": self.aws.s3_bucket,
                "configured": self.aws.is_configured(),
            },
            "staging": { "local_dir": self.staging.local_dir },
            "streaming": { "timeout_secs": self.streaming.timeout_secs },
        })
    }
}

// ── Cluster ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub endpoint: String,
    pub database: String,
    pub table: String,
    pub auth_token: Option<String>,
}

impl ClusterConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            endpoint: profiled_env_or(p, "CLUSTER_ENDPOINT", "https://localhost:8080"),
            database: profiled_env_or(p, "INGEST_DATABASE", "default"),
            table: profiled_env_or(p, "INGEST_TABLE", "events"),
            auth_token: profiled_env_opt(p, "CLUSTER_AUTH_TOKEN"),
        }
    }
}

// ── Ingestion resources ───────────────────────────────────────

/// Statically configured ingestion resources, used in place of discovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesConfig {
    pub queue_urls: Vec<String>,
    pub container_urls: Vec<String>,
    pub status_table_urls: Vec<String>,
    pub auth_context: Option<String>,
}

impl ResourcesConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            queue_urls: profiled_env_list(p, "INGEST_QUEUE_URLS"),
            container_urls: profiled_env_list(p, "INGEST_CONTAINER_URLS"),
            status_table_urls: profiled_env_list(p, "INGEST_STATUS_TABLE_URLS"),
            auth_context: profiled_env_opt(p, "INGEST_AUTH_CONTEXT"),
        }
    }
}

// ── AWS / S3 / SQS ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub s3_bucket: Option<String>,
    pub s3_prefix: Option<String>,
    pub endpoint_url: Option<String>,
}

impl AwsConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            region: profiled_env_or(p, "AWS_REGION", "us-east-1"),
            access_key_id: profiled_env_opt(p, "AWS_ACCESS_KEY_ID"),
            secret_access_key: profiled_env_opt(p, "AWS_SECRET_ACCESS_KEY"),
            session_token: profiled_env_opt(p, "AWS_SESSION_TOKEN"),
            s3_bucket: profiled_env_opt(p, "S3_BUCKET"),
            s3_prefix: profiled_env_opt(p, "S3_PREFIX"),
            endpoint_url: profiled_env_opt(p, "AWS_ENDPOINT_URL"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.access_key_id.is_some() && self.s3_bucket.is_some()
    }
}

// ── Staging ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingConfig {
    /// Staging directory used when S3 is not configured.
    pub local_dir: PathBuf,
}

impl StagingConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            local_dir: PathBuf::from(profiled_env_or(p, "STAGING_DIR", "data/staging")),
        }
    }
}

// ── Streaming ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    pub timeout_secs: u64,
}

impl StreamingConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            timeout_secs: profiled_env_u64(p, "STREAM_TIMEOUT_SECS", 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_list_drops_blanks() {
        assert_eq!(
            split_list(" https://a/q1 ,, https://a/q2,"),
            vec!["https://a/q1", "https://a/q2"]
        );
        assert!(split_list("").is_empty());
    }

    #[test]
    fn profiled_key_wins_over_plain_key() {
        env::set_var("SLUICE_CFG_TEST_INGEST_TABLE", "profiled_events");
        env::set_var("SLUICE_CFG_TEST_STREAM_TIMEOUT_SECS", "15");
        let cfg = Config::for_profile("sluice_cfg_test");

        assert_eq!(cfg.profile, "SLUICE_CFG_TEST");
        assert_eq!(cfg.cluster.table, "profiled_events");
        assert_eq!(cfg.streaming.timeout_secs, 15);

        env::remove_var("SLUICE_CFG_TEST_INGEST_TABLE");
        env::remove_var("SLUICE_CFG_TEST_STREAM_TIMEOUT_SECS");
    }

    #[test]
    fn redacted_summary_hides_token() {
        let mut cfg = Config::for_profile("sluice_redact_test");
        cfg.cluster.auth_token = Some("very-secret".into());
        let summary = cfg.redacted_summary().to_string();
        assert!(!summary.contains("very-secret"));
        assert!(summary.contains("\"authenticated\":true"));
    }
}
