use crate::data::StationKey;
use crate::detection::StationConfig;
use crate::utils::config::{ConfigError, StationProfileConfig, DEFAULT_PROFILE};
use std::collections::HashMap;

/// Station profiles with per-field fallback to the default profile
#[derive(Debug, Clone)]
pub struct StationProfiles {
    default: StationConfig,
    default_average: Option<f64>,
    stations: HashMap<StationKey, StationProfileConfig>,
}

impl StationProfiles {
    /// Build from the `[detector.stations]` table
    ///
    /// Fails when the default profile is absent or incomplete, since every
    /// field must then be resolvable for every station.
    pub fn from_config(profiles: &HashMap<String, StationProfileConfig>) -> Result<Self, ConfigError> {
        let default = profiles
            .get(DEFAULT_PROFILE)
            .ok_or(ConfigError::MissingDefaultProfile)?;

        let resolved = StationConfig {
            inrush_measurement_count: default
                .num_inrush_measurements
                .ok_or(ConfigError::MissingDefaultField("num_inrush_measurements"))?,
            max_allowed_flow: default
                .allowed_flow_rate_max
                .ok_or(ConfigError::MissingDefaultField("allowed_flow_rate_max"))?,
            allowed_mean_deviation: default
                .allowed_flow_rate_diff_from_average
                .ok_or(ConfigError::MissingDefaultField("allowed_flow_rate_diff_from_average"))?,
            mean_window_size: default
                .flow_rate_average_history_meansurements
                .ok_or(ConfigError::MissingDefaultField("flow_rate_average_history_meansurements"))?,
        };

        let stations = profiles
            .iter()
            .filter(|(name, _)| name.as_str() != DEFAULT_PROFILE)
            .map(|(name, profile)| (StationKey::from_name(name), profile.clone()))
            .collect();

        Ok(Self {
            default: resolved,
            default_average: default.average_flow_rate,
            stations,
        })
    }

    /// Tunables for a station, each field falling back to the default
    pub fn resolve(&self, key: &StationKey) -> StationConfig {
        let Some(profile) = self.stations.get(key) else {
            return self.default;
        };

        StationConfig {
            inrush_measurement_count: profile
                .num_inrush_measurements
                .unwrap_or(self.default.inrush_measurement_count),
            max_allowed_flow: profile
                .allowed_flow_rate_max
                .unwrap_or(self.default.max_allowed_flow),
            allowed_mean_deviation: profile
                .allowed_flow_rate_diff_from_average
                .unwrap_or(self.default.allowed_mean_deviation),
            mean_window_size: profile
                .flow_rate_average_history_meansurements
                .unwrap_or(self.default.mean_window_size),
        }
    }

    /// Configured expected ticks/minute for stations without run history
    pub fn fallback_average(&self, key: &StationKey) -> Option<f64> {
        self.stations
            .get(key)
            .and_then(|profile| profile.average_flow_rate)
            .or(self.default_average)
    }

    pub fn default_config(&self) -> &StationConfig {
        &self.default
    }
}
