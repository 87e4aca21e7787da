//! Operator configuration.
//!
//! Values come from `harvest.ron` (every field optional), then from
//! environment variables, which win. A `.env` file is honoured when present.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use harvest_core::{BatchSize, BatchSizeError, DEFAULT_BATCH_SIZE};
use harvest_engine::{PipelineSettings, ProviderSettings};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "harvest.ron";

pub const ENV_API_KEY: &str = "HARVEST_API_KEY";
pub const ENV_DATABASE_URL: &str = "HARVEST_DATABASE_URL";
pub const ENV_BASE_URL: &str = "HARVEST_BASE_URL";
pub const ENV_DATASET_ID: &str = "HARVEST_DATASET_ID";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error(transparent)]
    BatchSize(#[from] BatchSizeError),
    #[error("extract_page_size must be at least 1")]
    PageSize,
    #[error("no API key configured; set HARVEST_API_KEY or api_key in harvest.ron")]
    MissingApiKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub database_url: String,
    pub api_key: String,
    pub base_url: String,
    pub dataset_id: String,
    pub search_url: String,
    pub language: String,
    pub uule: String,
    pub mobile: String,
    pub output_format: String,
    pub batch_size: usize,
    pub submit_delay_ms: u64,
    pub poll_delay_ms: u64,
    pub extract_page_size: usize,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        let provider = ProviderSettings::default();
        let pipeline = PipelineSettings::default();
        Self {
            database_url: "sqlite://harvest.db".to_string(),
            api_key: provider.api_key,
            base_url: provider.base_url,
            dataset_id: provider.dataset_id,
            search_url: provider.search_url,
            language: provider.language,
            uule: provider.uule,
            mobile: provider.mobile,
            output_format: provider.output_format,
            batch_size: DEFAULT_BATCH_SIZE,
            submit_delay_ms: millis(pipeline.submit_delay),
            poll_delay_ms: millis(pipeline.poll_delay),
            extract_page_size: pipeline.extract_page_size,
            connect_timeout_secs: provider.connect_timeout.as_secs(),
            request_timeout_secs: provider.request_timeout.as_secs(),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl HarvestConfig {
    /// Load from `path`, or from `harvest.ron` in the working directory when
    /// no path is given and that file exists, then apply the process
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::from_file(fallback)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_ron(text: &str) -> Result<Self, ron::error::SpannedError> {
        ron::from_str(text)
    }

    /// Replace fields with non-empty values returned by `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let targets: [(&str, &mut String); 4] = [
            (ENV_API_KEY, &mut self.api_key),
            (ENV_DATABASE_URL, &mut self.database_url),
            (ENV_BASE_URL, &mut self.base_url),
            (ENV_DATASET_ID, &mut self.dataset_id),
        ];
        for (name, field) in targets {
            if let Some(value) = lookup(name).filter(|v| !v.trim().is_empty()) {
                *field = value.trim().to_string();
            }
        }
    }

    /// Commands that talk to the provider need credentials.
    pub fn require_api_key(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        Ok(())
    }

    pub fn pipeline_settings(&self) -> Result<PipelineSettings, ConfigError> {
        if self.extract_page_size == 0 {
            return Err(ConfigError::PageSize);
        }
        Ok(PipelineSettings {
            batch_size: BatchSize::new(self.batch_size)?,
            submit_delay: Duration::from_millis(self.submit_delay_ms),
            poll_delay: Duration::from_millis(self.poll_delay_ms),
            extract_page_size: self.extract_page_size,
        })
    }

    pub fn provider_settings(&self) -> ProviderSettings {
        ProviderSettings {
            base_url: self.base_url.clone(),
            dataset_id: self.dataset_id.clone(),
            api_key: self.api_key.clone(),
            search_url: self.search_url.clone(),
            language: self.language.clone(),
            uule: self.uule.clone(),
            mobile: self.mobile.clone(),
            output_format: self.output_format.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}
