// src/config.rs

use std::{path::PathBuf, time::Duration};
use thiserror::Error;
use url::Url;

use crate::months::{MonthId, ANCHOR};

pub const MONTH_PLACEHOLDER: &str = "{month}";

pub const DEFAULT_SOURCE_URL_TEMPLATE: &str =
    "https://d37ci6vzurychx.cloudfront.net/trip-data/yellow_tripdata_{month}.parquet";
pub const DEFAULT_SCRATCH_DIR: &str = "temp_data";
pub const DEFAULT_PROFILE_NAME: &str = "nyc_taxi_analysis";
pub const DEFAULT_TARGET_NAME: &str = "dev";
pub const DEFAULT_STAGE: &str = "RAW.MY_INTERNAL_STAGE";
pub const DEFAULT_RAW_TABLE: &str = "RAW.yellow_taxi_trips";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_PROGRESS_EVERY_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("source URL template {template:?} has no {{month}} placeholder")]
    MissingPlaceholder { template: String },

    #[error("source URL template produces an invalid URL {url:?}: {source}")]
    InvalidSourceUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Everything the loader needs to know besides credentials.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Remote file URL with a `{month}` placeholder (`YYYY-MM`).
    pub source_url_template: String,
    /// Local scratch directory; wiped before and removed after a run.
    pub scratch_dir: PathBuf,
    /// Profile name looked up in `profiles.yml`.
    pub profile_name: String,
    /// Target under the profile's `outputs`.
    pub target_name: String,
    /// Candidate `profiles.yml` locations, searched in order.
    pub profile_paths: Vec<PathBuf>,
    /// Internal stage receiving uploads.
    pub stage: String,
    /// Table loaded by `COPY INTO`.
    pub raw_table: String,
    pub anchor: MonthId,
    pub end: Option<MonthId>,
    /// Limit on establishing the TCP/TLS connection.
    pub connect_timeout: Duration,
    /// Longest wait for response headers or for the next body chunk. A
    /// download that keeps moving is never cut off, however long it takes.
    pub stall_timeout: Duration,
    pub progress_every_bytes: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_url_template: DEFAULT_SOURCE_URL_TEMPLATE.to_string(),
            scratch_dir: PathBuf::from(DEFAULT_SCRATCH_DIR),
            profile_name: DEFAULT_PROFILE_NAME.to_string(),
            target_name: DEFAULT_TARGET_NAME.to_string(),
            profile_paths: default_profile_paths(),
            stage: DEFAULT_STAGE.to_string(),
            raw_table: DEFAULT_RAW_TABLE.to_string(),
            anchor: ANCHOR,
            end: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            stall_timeout: DEFAULT_STALL_TIMEOUT,
            progress_every_bytes: DEFAULT_PROGRESS_EVERY_BYTES,
        }
    }
}

impl PipelineConfig {
    /// Substitute `month` into the source template.
    pub fn source_url(&self, month: MonthId) -> Result<Url, ConfigError> {
        source_url(&self.source_url_template, month)
    }
}

pub(crate) fn source_url(template: &str, month: MonthId) -> Result<Url, ConfigError> {
    if !template.contains(MONTH_PLACEHOLDER) {
        return Err(ConfigError::MissingPlaceholder {
            template: template.to_string(),
        });
    }
    let url = template.replace(MONTH_PLACEHOLDER, &month.to_string());
    Url::parse(&url).map_err(|source| ConfigError::InvalidSourceUrl { url, source })
}

/// `./profiles.yml` first, then `~/.dbt/profiles.yml`.
pub fn default_profile_paths() -> Vec<PathBuf> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut paths = vec![cwd.join("profiles.yml")];
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".dbt").join("profiles.yml"));
    }
    paths
}
