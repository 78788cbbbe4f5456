use serde::{Deserialize, Serialize};
use std::fmt;

/// Which check produced an anomaly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnomalyKind {
    MaxExceeded,
    MeanExceeded,
}

/// Anomaly raised by a flow monitor
///
/// The `Display` form is the message delivered to notifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnomalyEvent {
    /// A single post-inrush sample was above the absolute ceiling
    MaxExceeded {
        station: String,
        measurement: f64,
        limit: f64,
    },

    /// The trailing window mean was too far above the station baseline
    MeanExceeded {
        station: String,
        window: Vec<f64>,
        measured_mean: f64,
        expected_mean: f64,
        allowed_deviation: f64,
    },
}

impl AnomalyEvent {
    pub fn kind(&self) -> AnomalyKind {
        match self {
            AnomalyEvent::MaxExceeded { .. } => AnomalyKind::MaxExceeded,
            AnomalyEvent::MeanExceeded { .. } => AnomalyKind::MeanExceeded,
        }
    }

    pub fn station(&self) -> &str {
        match self {
            AnomalyEvent::MaxExceeded { station, .. } => station,
            AnomalyEvent::MeanExceeded { station, .. } => station,
        }
    }
}

impl fmt::Display for AnomalyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnomalyEvent::MaxExceeded { station, measurement, limit } => write!(
                f,
                "Measurement ({:.2}) for station {} exceeded max ({:.2})",
                measurement, station, limit
            ),
            AnomalyEvent::MeanExceeded {
                station,
                window,
                measured_mean,
                expected_mean,
                allowed_deviation,
            } => {
                let samples: Vec<String> = window.iter().map(|m| format!("{:.2}", m)).collect();
                write!(
                    f,
                    "Measured mean ({:.2}, from [{}]) for station {} too far from mean ({:.2} ±{:.2})",
                    measured_mean,
                    samples.join(", "),
                    station,
                    expected_mean,
                    allowed_deviation
                )
            }
        }
    }
}
