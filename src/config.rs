//! Configuration
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! `TSWRITE_*` environment variables (`__` separates nested keys, e.g.
//! `TSWRITE_SAMPLE__DATABASE_NAME`). Command-line flags are applied last by
//! the binary.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::model::{validate_name, RetentionProperties};
use crate::server::ServerConfig;
use crate::service::MAX_PAGE_SIZE;

pub const ENV_PREFIX: &str = "TSWRITE";

/// Full application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sample: SampleConfig,
    pub server: ServerConfig,
    pub client: ClientConfig,
}

/// Resource names and settings used by the samples
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleConfig {
    pub database_name: String,
    pub table_name: String,
    /// Memory store retention (hours)
    pub memory_retention_hours: u64,
    /// Magnetic store retention (days)
    pub magnetic_retention_days: u64,
    /// KMS key used by the database update step. The step is skipped when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kms_key_id: Option<String>,
    /// Page size of list calls
    pub page_size: usize,
    pub region: String,
    pub account_id: String,
    /// Keep the sample's tables and database after a run
    pub skip_deletion: bool,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            database_name: "devops_multi_sample_application".to_string(),
            table_name: "host_metrics_sample_application".to_string(),
            memory_retention_hours: 24,
            magnetic_retention_days: 7,
            kms_key_id: None,
            page_size: 15,
            region: "us-east-1".to_string(),
            account_id: "000000000000".to_string(),
            skip_deletion: true,
        }
    }
}

impl SampleConfig {
    pub fn retention(&self) -> RetentionProperties {
        RetentionProperties::new(self.memory_retention_hours, self.magnetic_retention_days)
    }

    pub fn validate(&self) -> Result<()> {
        validate_name("Database", &self.database_name).map_err(as_config)?;
        validate_name("Table", &self.table_name).map_err(as_config)?;
        self.retention().validate().map_err(as_config)?;
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(Error::Config(format!(
                "page_size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, self.page_size
            )));
        }
        Ok(())
    }
}

/// Settings for [`crate::service::HttpService`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Remote endpoint. The in-process emulator is used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: 20,
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn as_config(err: Error) -> Error {
    match err {
        Error::Validation(msg) => Error::Config(msg),
        other => other,
    }
}

impl AppConfig {
    /// Loads defaults, the optional file at `path`, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| Error::Config(e.to_string()))?;
        config.sample.validate()?;
        Ok(config)
    }

    /// Parses a TOML document layered over the defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: AppConfig = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| Error::Config(e.to_string()))?;
        config.sample.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}
