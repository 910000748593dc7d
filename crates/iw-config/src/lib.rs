//! IAM Warden Configuration System
//!
//! TOML-based configuration with environment variable override support.
//! Command-line flags are applied on top by the binary.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Root application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub aws: AwsConfig,
    pub logging: LoggingConfig,
    pub output: OutputConfig,
    /// File the configuration was read from, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// AWS client configuration
///
/// Unset values fall through to the standard AWS SDK provider chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    pub region: Option<String>,
    /// Named profile from the shared AWS config/credentials files
    pub profile: Option<String>,
    /// Endpoint override (e.g. LocalStack)
    pub endpoint_url: Option<String>,
    /// Total attempts per API call, including the first (SDK standard retry mode)
    pub max_attempts: u32,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: None,
            profile: None,
            endpoint_url: None,
            max_attempts: 3,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// "text" or "json"
    pub format: String,
    /// Default filter directive when RUST_LOG is unset
    pub level: String,
    /// Optional file receiving warn-and-above events
    pub warn_file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: "text".to_string(),
            level: "warn".to_string(),
            warn_file: None,
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

/// Command output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Pretty-print audit snapshots
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Check value ranges that TOML types alone cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.aws.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "aws.max_attempts must be at least 1".to_string(),
            ));
        }

        let format = self.logging.format.to_ascii_lowercase();
        if format != "text" && format != "json" {
            return Err(ConfigError::ValidationError(format!(
                "logging.format must be \"text\" or \"json\", got \"{}\"",
                self.logging.format
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.aws.max_attempts, 3);
        assert!(config.aws.region.is_none());
        assert_eq!(config.logging.format, "text");
        assert_eq!(config.logging.level, "warn");
        assert!(config.output.pretty);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
[aws]
region = "eu-west-1"

[logging]
format = "JSON"
"#,
        )
        .unwrap();

        assert_eq!(config.aws.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.aws.max_attempts, 3);
        assert!(config.logging.is_json());
        assert_eq!(config.logging.level, "warn");
        assert!(config.output.pretty);
    }

    #[test]
    fn test_validation_rejects_zero_attempts() {
        let mut config = AppConfig::default();
        config.aws.max_attempts = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validation_rejects_unknown_format() {
        let mut config = AppConfig::default();
        config.logging.format = "yaml".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("logging.format"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("iam-warden.toml");
        std::fs::write(&path, "[aws]\nprofile = \"audit\"\nmax_attempts = 5\n").unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.aws.profile.as_deref(), Some("audit"));
        assert_eq!(config.aws.max_attempts, 5);
    }

    #[test]
    fn test_from_file_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[aws\nregion = ").unwrap();

        assert!(matches!(AppConfig::from_file(&path), Err(ConfigError::ParseError(_))));
    }
}
