use crate::api::DEFAULT_BASE_URL;
use crate::graph::EntityRef;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Douban-Ripple
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub crawler: CrawlerConfig,
    pub output: OutputConfig,
}

/// Remote API access configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// API root URL
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// API key given inline
    #[serde(rename = "api-key", default)]
    pub api_key: Option<String>,

    /// File whose first line is the API key (relative to the config file)
    #[serde(rename = "api-key-file", default)]
    pub api_key_file: Option<PathBuf>,

    /// Deadline for a single API call (seconds)
    #[serde(rename = "call-timeout-secs", default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Identities the crawl starts from (numeric ids or textual uids)
    pub seeds: Vec<String>,

    /// Records requested per relation page
    #[serde(rename = "page-size", default = "default_page_size")]
    pub page_size: usize,

    /// Minimum time between paced API requests (milliseconds)
    #[serde(rename = "min-interval-ms", default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// First backoff after a transient failure (seconds, doubles per attempt)
    #[serde(rename = "retry-base-secs", default = "default_retry_base_secs")]
    pub retry_base_secs: u64,

    /// First backoff after an access-denied response (seconds, doubles per attempt)
    #[serde(rename = "ban-backoff-secs", default = "default_ban_backoff_secs")]
    pub ban_backoff_secs: u64,

    /// Estimated total number of entities, used for the ETA
    #[serde(rename = "population-estimate", default = "default_population_estimate")]
    pub population_estimate: u64,

    /// Flush the checkpoint every N processed entries (0 = only on shutdown)
    #[serde(rename = "checkpoint-every", default = "default_checkpoint_every")]
    pub checkpoint_every: u64,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Path to the frontier checkpoint file
    #[serde(rename = "queue-path")]
    pub queue_path: String,

    /// Path to the visited-set checkpoint file
    #[serde(rename = "visited-path")]
    pub visited_path: String,
}

impl ApiConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl CrawlerConfig {
    /// Seeds parsed into frontier entries
    pub fn seed_refs(&self) -> Vec<EntityRef> {
        self.seeds.iter().map(|s| EntityRef::parse(s)).collect()
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn retry_base(&self) -> Duration {
        Duration::from_secs(self.retry_base_secs)
    }

    pub fn ban_backoff(&self) -> Duration {
        Duration::from_secs(self.ban_backoff_secs)
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_call_timeout_secs() -> u64 {
    10
}

fn default_page_size() -> usize {
    50
}

fn default_min_interval_ms() -> u64 {
    1500
}

fn default_retry_base_secs() -> u64 {
    2
}

fn default_ban_backoff_secs() -> u64 {
    1800
}

fn default_population_estimate() -> u64 {
    10_000_000
}

fn default_checkpoint_every() -> u64 {
    100
}
