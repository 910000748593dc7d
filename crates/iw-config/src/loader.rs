//! Configuration loader with file and environment variable support

use crate::{AppConfig, ConfigError};
use std::env;
use std::path::PathBuf;

/// Standard config file search paths
const CONFIG_PATHS: &[&str] = &[
    "iam-warden.toml",
    "./config/iam-warden.toml",
    "/etc/iam-warden/config.toml",
];

/// Environment variable naming an explicit config file
const CONFIG_ENV: &str = "IAM_WARDEN_CONFIG";

/// Configuration loader
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a loader with a specific config file path
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load configuration from file (if found) with environment variable overrides
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut config = AppConfig::default();

        if let Some(path) = self.find_config_file()? {
            config = AppConfig::from_file(&path)?;
            config.source = Some(path);
        }

        apply_overrides(&mut config, |key| env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    /// Find the configuration file to use.
    ///
    /// An explicitly requested file that does not exist is an error; the
    /// standard search paths are optional.
    fn find_config_file(&self) -> Result<Option<PathBuf>, ConfigError> {
        if let Some(path) = &self.config_path {
            return existing(path.clone()).map(Some);
        }

        if let Ok(path) = env::var(CONFIG_ENV) {
            return existing(PathBuf::from(path)).map(Some);
        }

        Ok(CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists()))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn existing(path: PathBuf) -> Result<PathBuf, ConfigError> {
    if path.exists() {
        Ok(path)
    } else {
        Err(ConfigError::ValidationError(format!(
            "config file not found: {}",
            path.display()
        )))
    }
}

/// Apply `IAM_WARDEN_*` overrides read through `lookup`.
///
/// Unparseable numeric/boolean values are ignored and the file value kept.
pub(crate) fn apply_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    // AWS
    if let Some(val) = lookup("IAM_WARDEN_AWS_REGION") {
        config.aws.region = Some(val);
    }
    if let Some(val) = lookup("IAM_WARDEN_AWS_PROFILE") {
        config.aws.profile = Some(val);
    }
    if let Some(val) = lookup("IAM_WARDEN_AWS_ENDPOINT_URL") {
        config.aws.endpoint_url = Some(val);
    }
    if let Some(val) = lookup("IAM_WARDEN_AWS_MAX_ATTEMPTS") {
        if let Ok(attempts) = val.parse() {
            config.aws.max_attempts = attempts;
        }
    }

    // Logging
    if let Some(val) = lookup("IAM_WARDEN_LOG_FORMAT") {
        config.logging.format = val;
    }
    if let Some(val) = lookup("IAM_WARDEN_LOG_LEVEL") {
        config.logging.level = val;
    }
    if let Some(val) = lookup("IAM_WARDEN_LOG_FILE") {
        config.logging.warn_file = Some(val);
    }

    // Output
    if let Some(val) = lookup("IAM_WARDEN_OUTPUT_PRETTY") {
        if let Ok(pretty) = val.parse() {
            config.output.pretty = pretty;
        }
    }
}
