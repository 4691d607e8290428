//! Monitor configuration.
//!
//! Loaded from a TOML file (`GROWBOX_CONFIG`, or `growbox/config.toml` under
//! the platform config directory), then overridden by `GROWBOX_API_URL`.
//! Every key is optional.
//!
//! ```toml
//! [api]
//! base_url = "http://192.168.1.20:5050"
//! timeout_secs = 10
//!
//! [poll]
//! device_status_secs = 10
//! settings_secs = 30
//!
//! [alerts]
//! dedupe = true
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "GROWBOX_CONFIG";

/// Environment variable overriding `api.base_url`.
pub const API_URL_ENV: &str = "GROWBOX_API_URL";

/// Monitor configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend connection.
    pub api: ApiConfig,
    /// Poll intervals.
    pub poll: PollConfig,
    /// Operation log defaults.
    pub history: HistoryConfig,
    /// Alert feed behavior.
    pub alerts: AlertsConfig,
}

impl Config {
    /// Load from `GROWBOX_CONFIG` or the default path, then apply
    /// `GROWBOX_API_URL`. A missing file yields the defaults.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(default_config_path);
        let mut config = if path.exists() {
            Self::load(&path)?
        } else {
            Self::default()
        };
        config.apply_api_url(std::env::var(API_URL_ENV).ok());
        Ok(config)
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Replace the base URL when `url` is set and non-blank.
    pub fn apply_api_url(&mut self, url: Option<String>) {
        if let Some(url) = url.map(|u| u.trim().to_string())
            && !url.is_empty()
        {
            self.api.base_url = url;
        }
    }

    /// Validate the configuration, collecting every problem.
    ///
    /// ```
    /// use growbox_core::config::Config;
    ///
    /// Config::default().validate().unwrap();
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.api.validate());
        errors.extend(self.poll.validate());
        errors.extend(self.history.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate the default configuration.
    pub fn load_validated() -> Result<Self, ConfigError> {
        let config = Self::load_default()?;
        config.validate()?;
        Ok(config)
    }
}

/// Backend connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Origin of the dashboard API.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5050".to_string(),
            timeout_secs: 10,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let url = self.base_url.trim();
        if url.is_empty() {
            errors.push(ValidationError::new("api.base_url", "base URL cannot be empty"));
        } else {
            match url
                .strip_prefix("http://")
                .or_else(|| url.strip_prefix("https://"))
            {
                Some(rest) if !rest.is_empty() => {}
                Some(_) => errors.push(ValidationError::new(
                    "api.base_url",
                    format!("base URL '{url}' has no host"),
                )),
                None => errors.push(ValidationError::new(
                    "api.base_url",
                    format!("base URL '{url}' must start with http:// or https://"),
                )),
            }
        }
        if self.timeout_secs == 0 {
            errors.push(ValidationError::new("api.timeout_secs", "timeout cannot be 0"));
        }
        errors
    }
}

/// Poll intervals, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub device_status_secs: u64,
    pub settings_secs: u64,
    pub telemetry_secs: u64,
    pub alerts_secs: u64,
    pub history_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            device_status_secs: 10,
            settings_secs: 30,
            telemetry_secs: 10,
            alerts_secs: 10,
            history_secs: 30,
        }
    }
}

impl PollConfig {
    pub fn device_status(&self) -> Duration {
        Duration::from_secs(self.device_status_secs)
    }

    pub fn settings(&self) -> Duration {
        Duration::from_secs(self.settings_secs)
    }

    pub fn telemetry(&self) -> Duration {
        Duration::from_secs(self.telemetry_secs)
    }

    pub fn alerts(&self) -> Duration {
        Duration::from_secs(self.alerts_secs)
    }

    pub fn history(&self) -> Duration {
        Duration::from_secs(self.history_secs)
    }

    pub fn validate(&self) -> Vec<ValidationError> {
        [
            ("poll.device_status_secs", self.device_status_secs),
            ("poll.settings_secs", self.settings_secs),
            ("poll.telemetry_secs", self.telemetry_secs),
            ("poll.alerts_secs", self.alerts_secs),
            ("poll.history_secs", self.history_secs),
        ]
        .into_iter()
        .filter(|(_, secs)| *secs == 0)
        .map(|(field, _)| ValidationError::new(field, "poll interval cannot be 0"))
        .collect()
    }
}

/// Operation log defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Trailing window used when no explicit date range is set.
    pub default_days: u32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_days: crate::history::DEFAULT_DAYS,
        }
    }
}

impl HistoryConfig {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        if self.default_days == 0 {
            errors.push(ValidationError::new(
                "history.default_days",
                "default window must be at least one day",
            ));
        }
        errors
    }
}

/// Alert feed behavior.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// Skip events whose id was already surfaced.
    pub dedupe: bool,
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field path (e.g., `poll.settings_secs`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("growbox")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "http://127.0.0.1:5050");
        assert_eq!(config.api.timeout(), Duration::from_secs(10));
        assert_eq!(config.poll.device_status(), Duration::from_secs(10));
        assert_eq!(config.poll.settings(), Duration::from_secs(30));
        assert_eq!(config.history.default_days, 7);
        assert!(!config.alerts.dedupe);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_file() {
        let toml = r#"
            [api]
            base_url = "http://greenhouse.local:5050"

            [alerts]
            dedupe = true
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.api.base_url, "http://greenhouse.local:5050");
        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(config.poll, PollConfig::default());
        assert!(config.alerts.dedupe);
    }

    #[test]
    fn test_api_url_override() {
        let mut config = Config::default();
        config.apply_api_url(Some("  ".to_string()));
        assert_eq!(config.api.base_url, "http://127.0.0.1:5050");
        config.apply_api_url(Some("https://grow.example.com".to_string()));
        assert_eq!(config.api.base_url, "https://grow.example.com");
        config.apply_api_url(None);
        assert_eq!(config.api.base_url, "https://grow.example.com");
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut config = Config::default();
        config.api.base_url = "ftp://host".to_string();
        config.api.timeout_secs = 0;
        config.poll.settings_secs = 0;
        config.history.default_days = 0;

        let Err(ConfigError::Validation(errors)) = config.validate() else {
            panic!("expected validation errors");
        };
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "api.base_url",
                "api.timeout_secs",
                "poll.settings_secs",
                "history.default_days"
            ]
        );
    }

    #[test]
    fn test_url_without_host() {
        let mut config = Config::default();
        config.api.base_url = "http://".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[poll]\nhistory_secs = 60\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.poll.history(), Duration::from_secs(60));
    }

    #[test]
    fn test_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_load_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[api\nbase_url = ").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_validation_error_display() {
        let err = ConfigError::Validation(vec![ValidationError::new(
            "poll.alerts_secs",
            "poll interval cannot be 0",
        )]);
        assert!(err.to_string().contains("poll.alerts_secs: poll interval cannot be 0"));
    }
}
