//! Configuration module for the Loki exporter.
//!
//! The configuration is read once from a YAML file at startup and is
//! immutable afterwards.
//!
//! ```yaml
//! loki:
//!   listenAddress: http://localhost:3100
//!   api: legacy
//!   timeout: 10s
//!   basicAuth:
//!     enabled: false
//!     username: ""
//!     password: ""
//! metrics:
//!   labels: true
//!   labelValues: true
//!   queries: true
//! queries:
//!   - name: errors
//!     query: '{job="api"} |= "error"'
//!     start: -1h
//! ```

pub mod duration;
pub mod query;

pub use duration::{parse_positive_duration, parse_signed_duration, DurationParseError, RelativeOffset};
pub use query::{Direction, QueryDefinition, QueryLimit};

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use validator::Validate;

/// Errors that can occur while loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read configuration file '{path}': {source}")]
    Io {
        /// Path of the configuration file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The configuration file is not valid YAML or has invalid values.
    #[error("Invalid configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A query definition failed validation.
    #[error("Invalid query '{name}': {source}")]
    InvalidQuery {
        /// Name of the offending query.
        name: String,
        /// Validation details.
        source: validator::ValidationErrors,
    },

    /// Basic auth is enabled without a username.
    #[error("Basic auth is enabled but no username is configured")]
    MissingUsername,

    /// The Loki request timeout is zero.
    #[error("Loki timeout must be greater than zero")]
    ZeroTimeout,
}

/// Which flavour of the Loki HTTP API to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiVersion {
    /// The legacy `/api/prom` endpoints, returning serialized label strings.
    #[default]
    Legacy,
    /// The `/loki/api/v1` endpoints, returning structured labels.
    V1,
}

/// Basic auth credentials attached to every Loki request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BasicAuthConfig {
    /// Whether credentials are sent.
    pub enabled: bool,
    /// The username.
    pub username: String,
    /// The password.
    pub password: String,
}

fn default_listen_address() -> String {
    "http://localhost:3100".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Connection settings for the Loki instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LokiConfig {
    /// Base address of Loki, e.g. `http://localhost:3100`.
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// API flavour.
    #[serde(default)]
    pub api: ApiVersion,

    /// Timeout applied to every single request.
    #[serde(
        default = "default_timeout",
        deserialize_with = "duration::deserialize_timeout"
    )]
    pub timeout: Duration,

    /// Optional basic auth credentials.
    #[serde(default)]
    pub basic_auth: BasicAuthConfig,
}

impl Default for LokiConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            api: ApiVersion::default(),
            timeout: default_timeout(),
            basic_auth: BasicAuthConfig::default(),
        }
    }
}

/// Toggles for the scrape phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MetricsConfig {
    /// Count the label names known to Loki.
    pub labels: bool,
    /// Count the values of every label. Requires `labels`.
    pub label_values: bool,
    /// Run the configured queries.
    pub queries: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            labels: true,
            label_values: true,
            queries: true,
        }
    }
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExporterConfig {
    /// Loki connection settings.
    pub loki: LokiConfig,
    /// Scrape phase toggles.
    pub metrics: MetricsConfig,
    /// Queries executed on every scrape, in order.
    pub queries: Vec<QueryDefinition>,
}

impl ExporterConfig {
    /// Loads and validates the configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read
    /// - The content is not valid YAML or contains unparsable durations
    /// - A query definition is invalid
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_yaml_str(&content)?;
        tracing::debug!(
            path = %path.display(),
            queries = config.queries.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Parses and validates the configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or the configuration fails
    /// validation.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.validate_config()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a query definition is invalid, basic auth is
    /// enabled without a username or the Loki timeout is zero.
    pub fn validate_config(&self) -> Result<(), ConfigError> {
        if self.loki.basic_auth.enabled && self.loki.basic_auth.username.is_empty() {
            return Err(ConfigError::MissingUsername);
        }
        if self.loki.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        for query in &self.queries {
            query.validate().map_err(|source| ConfigError::InvalidQuery {
                name: query.name.clone(),
                source,
            })?;
        }

        Ok(())
    }
}
