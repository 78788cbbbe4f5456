use crate::data::{RunLogRecord, StationKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Historical expected flow for one station
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StationBaseline {
    pub average_ticks_per_minute: f64,
    pub sample_count: u64,
}

impl StationBaseline {
    /// Fold one more run into the cumulative mean
    pub fn update(&mut self, ticks_per_minute: f64) {
        let count = self.sample_count as f64;
        self.average_ticks_per_minute =
            (self.average_ticks_per_minute * count + ticks_per_minute) / (count + 1.0);
        self.sample_count += 1;
    }
}

/// Immutable per-station baseline snapshot
///
/// Built from scratch on every refresh and shared behind an `Arc`; a
/// refresh replaces the whole snapshot rather than mutating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baselines {
    stations: HashMap<StationKey, StationBaseline>,
    computed_at: DateTime<Utc>,
}

impl Baselines {
    pub fn empty() -> Self {
        Self {
            stations: HashMap::new(),
            computed_at: Utc::now(),
        }
    }

    pub fn get(&self, key: &StationKey) -> Option<&StationBaseline> {
        self.stations.get(key)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn computed_at(&self) -> DateTime<Utc> {
        self.computed_at
    }

    pub fn iter(&self) -> impl Iterator<Item = (&StationKey, &StationBaseline)> {
        self.stations.iter()
    }
}

impl Default for Baselines {
    fn default() -> Self {
        Self::empty()
    }
}

/// Computes per-station baselines from historical run logs
///
/// Algorithm:
/// 1. Walk records in arrival order
/// 2. Skip ad-hoc runs, rain delay and other marker entries, and runs
///    without a flow reading
/// 3. Resolve the station index to its key (unknown stations are skipped)
/// 4. Fold the run's ticks/minute into that station's cumulative mean
pub struct BaselineCalculator;

impl BaselineCalculator {
    pub fn compute<F>(records: &[RunLogRecord], resolve_key: F) -> Baselines
    where
        F: Fn(usize) -> Option<StationKey>,
    {
        let mut stations: HashMap<StationKey, StationBaseline> = HashMap::new();
        let mut skipped = 0usize;

        for record in records {
            let Some((index, ticks_per_minute)) = record.baseline_sample() else {
                skipped += 1;
                continue;
            };

            let Some(key) = resolve_key(index) else {
                debug!(station_index = index, "Skipping log record for unknown station");
                skipped += 1;
                continue;
            };

            stations.entry(key).or_default().update(ticks_per_minute);
        }

        debug!(
            records = records.len(),
            skipped,
            stations = stations.len(),
            "Computed station baselines"
        );

        Baselines {
            stations,
            computed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{LogStation, MANUAL_PROGRAM_ID};

    fn run(program_id: u32, station: LogStation, flow: f64) -> RunLogRecord {
        RunLogRecord {
            program_id,
            station,
            duration_seconds: 300,
            end_time: Utc::now(),
            flow_ticks_per_minute: Some(flow),
        }
    }

    fn resolver(index: usize) -> Option<StationKey> {
        match index {
            0 => Some(StationKey::from_name("Front Lawn")),
            1 => Some(StationKey::from_name("Drip")),
            _ => None,
        }
    }

    #[test]
    fn test_empty_history() {
        let baselines = BaselineCalculator::compute(&[], resolver);
        assert!(baselines.is_empty());
    }

    #[test]
    fn test_running_mean_per_station() {
        let records = vec![
            run(1, LogStation::Index(0), 2.0),
            run(1, LogStation::Index(1), 10.0),
            run(2, LogStation::Index(0), 4.0),
            run(1, LogStation::Index(0), 6.0),
        ];

        let baselines = BaselineCalculator::compute(&records, resolver);

        let lawn = baselines.get(&StationKey::from_name("Front Lawn")).unwrap();
        assert_eq!(lawn.sample_count, 3);
        assert!((lawn.average_ticks_per_minute - 4.0).abs() < 1e-9);

        let drip = baselines.get(&StationKey::from_name("Drip")).unwrap();
        assert_eq!(drip.sample_count, 1);
        assert!((drip.average_ticks_per_minute - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_excluded_records_do_not_count() {
        let records = vec![
            run(1, LogStation::Index(0), 2.0),
            run(MANUAL_PROGRAM_ID, LogStation::Index(0), 100.0),
            run(1, LogStation::RainDelay, 100.0),
            run(1, LogStation::Index(7), 100.0),
        ];

        let baselines = BaselineCalculator::compute(&records, resolver);

        assert_eq!(baselines.len(), 1);
        let lawn = baselines.get(&StationKey::from_name("front lawn")).unwrap();
        assert_eq!(lawn.sample_count, 1);
        assert!((lawn.average_ticks_per_minute - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_stable_over_long_history() {
        let records: Vec<RunLogRecord> = (0..10_000)
            .map(|i| run(1, LogStation::Index(0), if i % 2 == 0 { 1.5 } else { 2.5 }))
            .collect();

        let baselines = BaselineCalculator::compute(&records, resolver);
        let lawn = baselines.get(&StationKey::from_name("Front Lawn")).unwrap();

        assert_eq!(lawn.sample_count, 10_000);
        assert!((lawn.average_ticks_per_minute - 2.0).abs() < 1e-9);
    }
}
