//! YAML configuration file support.
//!
//! One file configures the normalization pipeline and, for the CLI, logging.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "compile cache"
//!
//! normalize:
//!   normalize_literals: true
//!   verify_normalized: true
//!   max_query_bytes: 1048576
//!
//! logging:
//!   level: "info"
//!   json: false
//! ```
//!
//! Every section is optional; missing fields take their defaults.

use std::fs;
use std::path::Path;

use canonical::{NormalizeConfig, DEFAULT_MAX_QUERY_BYTES};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Top-level YAML configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct QueryNormConfig {
    /// Configuration format version
    pub version: String,

    /// Optional configuration name/description
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub normalize: NormalizeYamlConfig,

    #[serde(default)]
    pub logging: LoggingYamlConfig,
}

impl QueryNormConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: QueryNormConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.normalize.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Pipeline configuration described by the `normalize:` section.
    pub fn normalize_config(&self) -> NormalizeConfig {
        NormalizeConfig {
            normalize_literals: self.normalize.normalize_literals,
            verify_normalized: self.normalize.verify_normalized,
            max_query_bytes: self.normalize.max_query_bytes,
        }
    }
}

impl Default for QueryNormConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            normalize: NormalizeYamlConfig::default(),
            logging: LoggingYamlConfig::default(),
        }
    }
}

/// Normalization YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeYamlConfig {
    #[serde(default = "true_value")]
    pub normalize_literals: bool,

    #[serde(default = "true_value")]
    pub verify_normalized: bool,

    /// `null` disables the limit.
    #[serde(default = "default_max_query_bytes")]
    pub max_query_bytes: Option<usize>,
}

impl NormalizeYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.max_query_bytes == Some(0) {
            return Err(ConfigLoadError::Validation(
                "normalize.max_query_bytes must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for NormalizeYamlConfig {
    fn default() -> Self {
        Self {
            normalize_literals: true,
            verify_normalized: true,
            max_query_bytes: default_max_query_bytes(),
        }
    }
}

/// Logging YAML configuration, used by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingYamlConfig {
    /// `tracing` filter directive; `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl LoggingYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.level.trim().is_empty() {
            return Err(ConfigLoadError::Validation(
                "logging.level must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for LoggingYamlConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Helper functions for serde defaults
fn true_value() -> bool {
    true
}
fn default_max_query_bytes() -> Option<usize> {
    Some(DEFAULT_MAX_QUERY_BYTES)
}
fn default_log_level() -> String {
    "info".to_string()
}
