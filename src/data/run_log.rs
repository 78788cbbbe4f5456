use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Program id the controller assigns to manually started stations
pub const MANUAL_PROGRAM_ID: u32 = 99;

/// Program id the controller assigns to run-once programs
pub const RUN_ONCE_PROGRAM_ID: u32 = 254;

/// Station column of a log entry
///
/// Regular runs carry a station index. The controller also writes
/// bookkeeping entries (rain delay, rain sensor, flow totals) whose
/// station column is a short string marker instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogStation {
    Index(usize),
    RainDelay,
    Marker(String),
}

impl LogStation {
    pub fn from_marker(marker: &str) -> Self {
        match marker {
            "rd" => LogStation::RainDelay,
            other => LogStation::Marker(other.to_string()),
        }
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            LogStation::Index(index) => Some(*index),
            _ => None,
        }
    }
}

/// One historical irrigation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLogRecord {
    pub program_id: u32,
    pub station: LogStation,
    pub duration_seconds: u64,
    pub end_time: DateTime<Utc>,

    /// Average flow sensor ticks per minute over the run, absent when the
    /// controller has no flow sensor
    pub flow_ticks_per_minute: Option<f64>,
}

impl RunLogRecord {
    /// Manual and run-once programs are ad-hoc runs
    pub fn is_ad_hoc(&self) -> bool {
        self.program_id == MANUAL_PROGRAM_ID || self.program_id == RUN_ONCE_PROGRAM_ID
    }

    pub fn is_rain_delay(&self) -> bool {
        self.station == LogStation::RainDelay
    }

    /// Station index and flow value if this record may feed a baseline
    pub fn baseline_sample(&self) -> Option<(usize, f64)> {
        if self.is_ad_hoc() {
            return None;
        }

        let index = self.station.index()?;
        let flow = self.flow_ticks_per_minute.filter(|f| f.is_finite())?;

        Some((index, flow))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(program_id: u32, station: LogStation, flow: Option<f64>) -> RunLogRecord {
        RunLogRecord {
            program_id,
            station,
            duration_seconds: 600,
            end_time: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            flow_ticks_per_minute: flow,
        }
    }

    #[test]
    fn test_regular_run_is_sample() {
        let r = record(1, LogStation::Index(3), Some(12.5));
        assert_eq!(r.baseline_sample(), Some((3, 12.5)));
    }

    #[test]
    fn test_ad_hoc_runs_excluded() {
        assert!(record(MANUAL_PROGRAM_ID, LogStation::Index(0), Some(1.0)).baseline_sample().is_none());
        assert!(record(RUN_ONCE_PROGRAM_ID, LogStation::Index(0), Some(1.0)).baseline_sample().is_none());
    }

    #[test]
    fn test_markers_excluded() {
        let rain = record(0, LogStation::from_marker("rd"), Some(1.0));
        assert!(rain.is_rain_delay());
        assert!(rain.baseline_sample().is_none());

        let sensor = record(0, LogStation::from_marker("rs"), Some(1.0));
        assert_eq!(sensor.station, LogStation::Marker("rs".to_string()));
        assert!(sensor.baseline_sample().is_none());
    }

    #[test]
    fn test_missing_flow_excluded() {
        assert!(record(2, LogStation::Index(1), None).baseline_sample().is_none());
        assert!(record(2, LogStation::Index(1), Some(f64::NAN)).baseline_sample().is_none());
    }
}
