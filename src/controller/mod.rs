pub mod opensprinkler;

use crate::data::{RunLogRecord, Station};
use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

pub use opensprinkler::OpenSprinklerClient;

/// Failures talking to the irrigation controller
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("controller request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid controller url: {0}")]
    Url(#[from] url::ParseError),

    #[error("controller rejected request with result code {0}")]
    Api(i64),

    #[error("unexpected controller payload: {0}")]
    Payload(String),
}

/// Station and flow state read on one controller refresh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControllerSnapshot {
    /// Stations by index
    pub stations: BTreeMap<usize, Station>,

    /// Instantaneous flow rate in device units (liters/minute)
    pub flow_rate: f64,
}

impl ControllerSnapshot {
    /// The running non-master station, if any
    ///
    /// The controller runs at most one non-master station at a time.
    pub fn running_station(&self) -> Option<&Station> {
        self.stations.values().find(|station| station.is_monitorable())
    }

    pub fn station(&self, index: usize) -> Option<&Station> {
        self.stations.get(&index)
    }
}

/// Irrigation controller the detector polls
#[async_trait]
pub trait Controller: Send + Sync {
    /// Read current station and flow state
    async fn refresh(&self) -> Result<ControllerSnapshot, ControllerError>;

    /// Run logs for the last `lookback_days` days
    async fn get_logs(&self, lookback_days: u32) -> Result<Vec<RunLogRecord>, ControllerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_station_skips_master() {
        let mut snapshot = ControllerSnapshot::default();

        let mut master = Station::new(0, "Master");
        master.is_master = true;
        master.is_running = true;

        let mut lawn = Station::new(1, "Lawn");
        lawn.is_running = true;

        snapshot.stations.insert(0, master);
        snapshot.stations.insert(1, lawn);
        snapshot.stations.insert(2, Station::new(2, "Drip"));

        assert_eq!(snapshot.running_station().map(|s| s.index), Some(1));
    }

    #[test]
    fn test_nothing_running() {
        let mut snapshot = ControllerSnapshot::default();
        snapshot.stations.insert(0, Station::new(0, "Lawn"));

        assert!(snapshot.running_station().is_none());
    }
}
