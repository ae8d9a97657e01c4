//! Ingestion configuration
//!
//! Defaults target the public NCBI and ENA archives. Every value can be
//! overridden through `CONTIG_ALIAS_*` environment variables (a `.env` file is
//! honoured) and through the `with_*` builder setters.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_NCBI_FTP_HOST: &str = "ftp.ncbi.nlm.nih.gov";
pub const DEFAULT_ENA_FTP_HOST: &str = "ftp.ebi.ac.uk";
pub const DEFAULT_FTP_PORT: u16 = 21;
pub const NCBI_BASE_PATH: &str = "/genomes/all/";
pub const ENA_BASE_PATH: &str = "/pub/databases/ena/assembly/";

pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_INITIAL_DELAY_MS: u64 = 2_000;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 30_000;
pub const DEFAULT_FTP_TIMEOUT_SECS: u64 = 60;

pub const DEFAULT_CHECKSUM_BASE_URL: &str = "https://www.ebi.ac.uk";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_ENRICHMENT_PAGE_SIZE: usize = 10_000;
pub const DEFAULT_LOOKUP_CONCURRENCY: usize = 16;
pub const DEFAULT_ENRICHMENT_WORKERS: usize = 4;

/// HTTP proxy used to tunnel FTP connections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
}

impl ProxyConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// One anonymous FTP archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FtpEndpoint {
    pub host: String,

    pub port: u16,

    /// Archive root, always ending in `/`
    pub base_path: String,

    pub proxy: Option<ProxyConfig>,

    /// Connect and read timeout in seconds
    pub timeout_secs: u64,
}

impl FtpEndpoint {
    pub fn ncbi() -> Self {
        Self {
            host: DEFAULT_NCBI_FTP_HOST.to_string(),
            port: DEFAULT_FTP_PORT,
            base_path: NCBI_BASE_PATH.to_string(),
            proxy: None,
            timeout_secs: DEFAULT_FTP_TIMEOUT_SECS,
        }
    }

    pub fn ena() -> Self {
        Self {
            host: DEFAULT_ENA_FTP_HOST.to_string(),
            port: DEFAULT_FTP_PORT,
            base_path: ENA_BASE_PATH.to_string(),
            proxy: None,
            timeout_secs: DEFAULT_FTP_TIMEOUT_SECS,
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn with_host(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    pub fn with_proxy(mut self, host: impl Into<String>, port: u16) -> Self {
        self.proxy = Some(ProxyConfig {
            host: host.into(),
            port,
        });
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_secs = seconds;
        self
    }
}

/// Bounded exponential backoff for FTP and HTTP calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            initial_delay_ms: DEFAULT_RETRY_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
        }
    }
}

/// Background enrichment settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    /// Base URL of the checksum service
    pub checksum_base_url: String,

    pub http_timeout_secs: u64,

    /// Sequences fetched and bulk-updated per page
    pub page_size: usize,

    /// Concurrent lookups within one page
    pub lookup_concurrency: usize,

    /// Assemblies enriched at the same time
    pub worker_limit: usize,

    /// Queue an ENA sequence-name job ahead of the checksum job after ingestion
    pub enqueue_sequence_names: bool,

    /// Period of the missing-checksum sweep; `None` disables it
    pub sweep_interval_secs: Option<u64>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            checksum_base_url: DEFAULT_CHECKSUM_BASE_URL.to_string(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            page_size: DEFAULT_ENRICHMENT_PAGE_SIZE,
            lookup_concurrency: DEFAULT_LOOKUP_CONCURRENCY,
            worker_limit: DEFAULT_ENRICHMENT_WORKERS,
            enqueue_sequence_names: true,
            sweep_interval_secs: None,
        }
    }
}

impl EnrichmentConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        self.sweep_interval_secs.map(Duration::from_secs)
    }
}

/// Main ingestion configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    pub ncbi: FtpEndpoint,
    pub ena: FtpEndpoint,

    /// Where reports are downloaded before parsing
    pub scratch_dir: PathBuf,

    pub retry: RetryConfig,
    pub enrichment: EnrichmentConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            ncbi: FtpEndpoint::ncbi(),
            ena: FtpEndpoint::ena(),
            scratch_dir: std::env::temp_dir().join("contig-alias"),
            retry: RetryConfig::default(),
            enrichment: EnrichmentConfig::default(),
        }
    }
}

impl IngestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `.env`, apply `CONTIG_ALIAS_*` overrides and validate
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Build from defaults and `CONTIG_ALIAS_*` environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(host) = env_var("NCBI_FTP_HOST") {
            config.ncbi.host = host;
        }
        if let Some(port) = env_parse("NCBI_FTP_PORT")? {
            config.ncbi.port = port;
        }
        if let Some(host) = env_var("ENA_FTP_HOST") {
            config.ena.host = host;
        }
        if let Some(port) = env_parse("ENA_FTP_PORT")? {
            config.ena.port = port;
        }
        if let Some(host) = env_var("ENA_PROXY_HOST") {
            let port = env_parse("ENA_PROXY_PORT")?.unwrap_or(3128);
            config.ena.proxy = Some(ProxyConfig { host, port });
        }
        if let Some(timeout) = env_parse("FTP_TIMEOUT_SECS")? {
            config.ncbi.timeout_secs = timeout;
            config.ena.timeout_secs = timeout;
        }
        if let Some(dir) = env_var("SCRATCH_DIR") {
            config.scratch_dir = PathBuf::from(dir);
        }

        if let Some(attempts) = env_parse("RETRY_MAX_ATTEMPTS")? {
            config.retry.max_attempts = attempts;
        }
        if let Some(delay) = env_parse("RETRY_INITIAL_DELAY_MS")? {
            config.retry.initial_delay_ms = delay;
        }
        if let Some(delay) = env_parse("RETRY_MAX_DELAY_MS")? {
            config.retry.max_delay_ms = delay;
        }

        let enrichment = &mut config.enrichment;
        if let Some(url) = env_var("CHECKSUM_BASE_URL") {
            enrichment.checksum_base_url = url;
        }
        if let Some(timeout) = env_parse("HTTP_TIMEOUT_SECS")? {
            enrichment.http_timeout_secs = timeout;
        }
        if let Some(size) = env_parse("ENRICHMENT_PAGE_SIZE")? {
            enrichment.page_size = size;
        }
        if let Some(concurrency) = env_parse("LOOKUP_CONCURRENCY")? {
            enrichment.lookup_concurrency = concurrency;
        }
        if let Some(workers) = env_parse("ENRICHMENT_WORKERS")? {
            enrichment.worker_limit = workers;
        }
        if let Some(enabled) = env_parse("ENQUEUE_SEQUENCE_NAMES")? {
            enrichment.enqueue_sequence_names = enabled;
        }
        if let Some(interval) = env_parse::<u64>("SWEEP_INTERVAL_SECS")? {
            enrichment.sweep_interval_secs = (interval > 0).then_some(interval);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, endpoint) in [("NCBI", &self.ncbi), ("ENA", &self.ena)] {
            if endpoint.host.trim().is_empty() {
                bail!("{} FTP host must not be empty", name);
            }
            if !endpoint.base_path.ends_with('/') {
                bail!("{} base path must end with '/': {}", name, endpoint.base_path);
            }
            if endpoint.timeout_secs == 0 {
                bail!("CONTIG_ALIAS_FTP_TIMEOUT_SECS must be greater than 0");
            }
        }
        if self.retry.max_attempts == 0 {
            bail!("CONTIG_ALIAS_RETRY_MAX_ATTEMPTS must be greater than 0");
        }
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            bail!(
                "CONTIG_ALIAS_RETRY_INITIAL_DELAY_MS ({}) exceeds CONTIG_ALIAS_RETRY_MAX_DELAY_MS ({})",
                self.retry.initial_delay_ms,
                self.retry.max_delay_ms
            );
        }
        if self.enrichment.page_size == 0 {
            bail!("CONTIG_ALIAS_ENRICHMENT_PAGE_SIZE must be greater than 0");
        }
        if self.enrichment.lookup_concurrency == 0 {
            bail!("CONTIG_ALIAS_LOOKUP_CONCURRENCY must be greater than 0");
        }
        if self.enrichment.worker_limit == 0 {
            bail!("CONTIG_ALIAS_ENRICHMENT_WORKERS must be greater than 0");
        }
        Ok(())
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_page_size(mut self, size: usize) -> Self {
        self.enrichment.page_size = size;
        self
    }

    pub fn with_checksum_base_url(mut self, url: impl Into<String>) -> Self {
        self.enrichment.checksum_base_url = url.into();
        self
    }

    pub fn with_sequence_names(mut self, enabled: bool) -> Self {
        self.enrichment.enqueue_sequence_names = enabled;
        self
    }
}

fn env_var(suffix: &str) -> Option<String> {
    std::env::var(format!("CONTIG_ALIAS_{}", suffix))
        .ok()
        .filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(suffix: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env_var(suffix)
        .map(|raw| {
            raw.trim()
                .parse()
                .with_context(|| format!("Invalid value for CONTIG_ALIAS_{}: '{}'", suffix, raw))
        })
        .transpose()
}
