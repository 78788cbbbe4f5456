use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Name of the profile every station falls back to
pub const DEFAULT_PROFILE: &str = "default";

/// Configuration problems detected at startup
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("no `default` station profile under [detector.stations]")]
    MissingDefaultProfile,

    #[error("`{0}` is missing from the default station profile")]
    MissingDefaultField(&'static str),

    #[error("invalid value for `{field}`: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub controller: ControllerConfig,
    pub detector: DetectorConfig,
    #[serde(default)]
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub url: String,
    pub password: String,

    /// Liters per flow sensor tick
    pub liters_per_tick: f64,

    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub averages_history_days: u32,
    pub averages_update_interval_hours: f64,
    pub running_station_interval_seconds: f64,

    /// Station profiles keyed by station key, plus `default`
    #[serde(default)]
    pub stations: HashMap<String, StationProfileConfig>,
}

/// Per-station overrides; any field left out comes from `default`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StationProfileConfig {
    pub num_inrush_measurements: Option<usize>,
    pub allowed_flow_rate_max: Option<f64>,
    pub allowed_flow_rate_diff_from_average: Option<f64>,
    #[serde(alias = "flow_rate_average_history_measurements")]
    pub flow_rate_average_history_meansurements: Option<usize>,

    /// Expected ticks/minute for stations with no run history
    pub average_flow_rate: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub token: String,
    pub chat_id: String,
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,

    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub output: String,
    pub file_path: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: "pretty".to_string(),
            file_path: String::new(),
        }
    }
}

fn default_request_timeout_seconds() -> u64 {
    10
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

impl Config {
    /// Load configuration from a TOML file, with `LEAK__SECTION__KEY`
    /// environment variables taking precedence
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix("LEAK")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read config {}", path.display()))?;

        let config: Config = settings
            .try_deserialize()
            .with_context(|| format!("Failed to parse config {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text without environment overrides
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variable or default path
    pub fn load() -> Result<Self> {
        let path = std::env::var("CONFIG_FILE")
            .unwrap_or_else(|_| "config/leak.toml".to_string());
        Self::from_file(path)
    }

    /// Reject configurations the detector cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.controller.liters_per_tick.is_finite() && self.controller.liters_per_tick > 0.0) {
            return Err(ConfigError::invalid("controller.liters_per_tick", "must be positive"));
        }

        positive("detector.averages_update_interval_hours", self.detector.averages_update_interval_hours)?;
        positive("detector.running_station_interval_seconds", self.detector.running_station_interval_seconds)?;

        let default = self
            .detector
            .stations
            .get(DEFAULT_PROFILE)
            .ok_or(ConfigError::MissingDefaultProfile)?;

        if default.num_inrush_measurements.is_none() {
            return Err(ConfigError::MissingDefaultField("num_inrush_measurements"));
        }
        if default.allowed_flow_rate_max.is_none() {
            return Err(ConfigError::MissingDefaultField("allowed_flow_rate_max"));
        }
        if default.allowed_flow_rate_diff_from_average.is_none() {
            return Err(ConfigError::MissingDefaultField("allowed_flow_rate_diff_from_average"));
        }
        if default.flow_rate_average_history_meansurements.is_none() {
            return Err(ConfigError::MissingDefaultField("flow_rate_average_history_meansurements"));
        }

        for (key, profile) in &self.detector.stations {
            if profile.flow_rate_average_history_meansurements == Some(0) {
                return Err(ConfigError::invalid(
                    format!("detector.stations.{}.flow_rate_average_history_meansurements", key),
                    "must be at least 1",
                ));
            }
        }

        Ok(())
    }
}

fn positive(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, "must be positive"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"
        [controller]
        url = "http://192.168.1.20"
        password = "opendoor"
        liters_per_tick = 0.25

        [detector]
        averages_history_days = 30
        averages_update_interval_hours = 12
        running_station_interval_seconds = 5

        [detector.stations.default]
        num_inrush_measurements = 6
        allowed_flow_rate_max = 6.0
        allowed_flow_rate_diff_from_average = 0.75
        flow_rate_average_history_meansurements = 10

        [detector.stations.front_lawn]
        allowed_flow_rate_max = 9.5

        [telegram]
        token = "123:abc"
        chat_id = "42"
    "#;

    #[test]
    fn test_parse_example() {
        let config = Config::from_toml_str(EXAMPLE).unwrap();

        assert_eq!(config.controller.request_timeout_seconds, 10);
        assert_eq!(config.detector.averages_history_days, 30);
        assert_eq!(config.detector.stations.len(), 2);
        assert_eq!(
            config.detector.stations["front_lawn"].allowed_flow_rate_max,
            Some(9.5)
        );

        let telegram = config.telegram.unwrap();
        assert_eq!(telegram.api_base, "https://api.telegram.org");
        assert_eq!(telegram.request_timeout_seconds, 10);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_missing_default_profile() {
        let text = EXAMPLE.replace("[detector.stations.default]", "[detector.stations.other]");
        let mut config: Config = toml::from_str(&text).unwrap();
        config.detector.stations.remove("front_lawn");

        assert_eq!(config.validate(), Err(ConfigError::MissingDefaultProfile));
    }

    #[test]
    fn test_default_profile_must_be_complete() {
        let text = EXAMPLE.replace("allowed_flow_rate_max = 6.0\n", "");
        let config: Config = toml::from_str(&text).unwrap();

        assert_eq!(
            config.validate(),
            Err(ConfigError::MissingDefaultField("allowed_flow_rate_max"))
        );
    }

    #[test]
    fn test_rejects_zero_window() {
        let text = EXAMPLE.replace(
            "[detector.stations.front_lawn]",
            "[detector.stations.front_lawn]\nflow_rate_average_history_meansurements = 0",
        );
        let config: Config = toml::from_str(&text).unwrap();

        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_rejects_non_positive_liters_per_tick() {
        let text = EXAMPLE.replace("liters_per_tick = 0.25", "liters_per_tick = 0");
        assert!(Config::from_toml_str(&text).is_err());
    }

    #[test]
    fn test_accepts_corrected_window_spelling() {
        let text = EXAMPLE.replace(
            "flow_rate_average_history_meansurements = 10",
            "flow_rate_average_history_measurements = 10",
        );
        let config = Config::from_toml_str(&text).unwrap();

        assert_eq!(
            config.detector.stations["default"].flow_rate_average_history_meansurements,
            Some(10)
        );
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("leak-config-{}.toml", std::process::id()));
        std::fs::write(&path, EXAMPLE).unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.controller.url, "http://192.168.1.20");

        std::fs::remove_file(&path).ok();
    }
}
