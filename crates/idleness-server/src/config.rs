use anyhow::{bail, Context};
use idleness_cloud::RetryPolicy;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    /// Discovered from credentials or the metadata server when absent.
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_regions")]
    pub regions: Vec<String>,
    #[serde(default)]
    pub gcp: GcpConfig,
    #[serde(default)]
    pub collectors: CollectorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcpConfig {
    #[serde(default)]
    pub max_retries: u32,
    /// Bounds one provider call, retries included.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_backoff_jitter_base_ms")]
    pub backoff_jitter_base_ms: u64,
    #[serde(default = "default_retry_statuses")]
    pub retry_statuses: Vec<u16>,
    #[serde(default = "default_compute_endpoint")]
    pub compute_endpoint: String,
    #[serde(default = "default_dataproc_endpoint")]
    pub dataproc_endpoint: String,
    /// Static bearer token. The metadata server is used when unset.
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_metadata_endpoint")]
    pub metadata_endpoint: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectorsConfig {
    /// Turns every default-enabled collector off; `enabled` still applies.
    #[serde(default)]
    pub disable_defaults: bool,
    #[serde(default)]
    pub enabled: Vec<String>,
    /// Wins over `enabled`.
    #[serde(default)]
    pub disabled: Vec<String>,
}

fn default_listen_address() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_max_backoff_ms() -> u64 {
    5000
}

fn default_backoff_jitter_base_ms() -> u64 {
    1000
}

fn default_retry_statuses() -> Vec<u16> {
    vec![503]
}

fn default_compute_endpoint() -> String {
    "https://compute.googleapis.com/compute/v1".to_string()
}

fn default_dataproc_endpoint() -> String {
    "https://dataproc.googleapis.com/v1".to_string()
}

fn default_metadata_endpoint() -> String {
    "http://metadata.google.internal/computeMetadata/v1".to_string()
}

impl Default for GcpConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            http_timeout_secs: default_http_timeout_secs(),
            max_backoff_ms: default_max_backoff_ms(),
            backoff_jitter_base_ms: default_backoff_jitter_base_ms(),
            retry_statuses: default_retry_statuses(),
            compute_endpoint: default_compute_endpoint(),
            dataproc_endpoint: default_dataproc_endpoint(),
            access_token: None,
            metadata_endpoint: default_metadata_endpoint(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            project_id: None,
            regions: Vec::new(),
            gcp: GcpConfig::default(),
            collectors: CollectorsConfig::default(),
        }
    }
}

/// Accepts either a list or one comma-separated string. Repeated names keep
/// their first position.
fn deserialize_regions<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RegionsInput {
        One(String),
        Many(Vec<String>),
    }

    match RegionsInput::deserialize(deserializer)? {
        RegionsInput::One(regions) => Ok(distinct(split_list(&regions))),
        RegionsInput::Many(regions) => Ok(distinct(
            regions
                .iter()
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
        )),
    }
}

fn distinct(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_env<T>(key: &str, value: &str) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("invalid value for {key}: {value:?}"))
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{path}'"))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("Failed to parse config file '{path}'"))?;
        Ok(config)
    }

    /// Applies `GCP_*`, `GCP_EXPORTER_*` and `LISTEN_ADDRESS` overrides.
    pub fn apply_env(&mut self) -> anyhow::Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    pub fn apply_env_with<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("GCP_PROJECT_ID") {
            self.project_id = Some(v.trim().to_string());
        }
        if let Some(v) = lookup("GCP_REGIONS") {
            self.regions = distinct(split_list(&v));
        }
        if let Some(v) = lookup("LISTEN_ADDRESS") {
            self.listen_address = v.trim().to_string();
        }
        if let Some(v) = lookup("GCP_EXPORTER_MAX_RETRIES") {
            self.gcp.max_retries = parse_env("GCP_EXPORTER_MAX_RETRIES", &v)?;
        }
        if let Some(v) = lookup("GCP_EXPORTER_HTTP_TIMEOUT_SECS") {
            self.gcp.http_timeout_secs = parse_env("GCP_EXPORTER_HTTP_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("GCP_EXPORTER_MAX_BACKOFF_MS") {
            self.gcp.max_backoff_ms = parse_env("GCP_EXPORTER_MAX_BACKOFF_MS", &v)?;
        }
        if let Some(v) = lookup("GCP_EXPORTER_BACKOFF_JITTER_BASE_MS") {
            self.gcp.backoff_jitter_base_ms = parse_env("GCP_EXPORTER_BACKOFF_JITTER_BASE_MS", &v)?;
        }
        if let Some(v) = lookup("GCP_EXPORTER_RETRY_STATUSES") {
            self.gcp.retry_statuses = split_list(&v)
                .iter()
                .map(|s| parse_env::<u16>("GCP_EXPORTER_RETRY_STATUSES", s))
                .collect::<anyhow::Result<_>>()?;
        }
        if let Some(v) = lookup("GCP_ACCESS_TOKEN") {
            self.gcp.access_token = Some(v.trim().to_string());
        }
        Ok(())
    }

    /// Rejects configurations the exporter cannot serve with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.regions.is_empty() {
            bail!("no regions configured: set `regions` or GCP_REGIONS");
        }
        self.listen_address
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid listen_address '{}'", self.listen_address))?;
        if self.gcp.http_timeout_secs == 0 {
            bail!("gcp.http_timeout_secs must be greater than zero");
        }
        if self.gcp.max_retries > 0 && self.gcp.retry_statuses.is_empty() {
            tracing::warn!(
                max_retries = self.gcp.max_retries,
                "gcp.retry_statuses is empty, no response will be retried"
            );
        }
        Ok(())
    }
}

impl GcpConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            retry_statuses: self.retry_statuses.iter().copied().collect::<BTreeSet<u16>>(),
            jitter_base: Duration::from_millis(self.backoff_jitter_base_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Static token with surrounding whitespace removed, if one is set.
    pub fn static_token(&self) -> Option<&str> {
        self.access_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}
