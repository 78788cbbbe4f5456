use crate::data::Station;
use crate::detection::events::{AnomalyEvent, AnomalyKind};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// Per-station tunables for a flow monitor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StationConfig {
    /// Samples discarded at the start of every run
    pub inrush_measurement_count: usize,

    /// Absolute ceiling for a single sample (ticks/minute)
    pub max_allowed_flow: f64,

    /// Permitted excess of the trailing mean over the baseline
    pub allowed_mean_deviation: f64,

    /// Trailing samples used for the mean check
    pub mean_window_size: usize,
}

/// Where a monitor is in its run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorPhase {
    /// Discarding valve-open transients
    Inrush,
    /// Storing samples until the mean window is full
    Accumulating,
    /// Window full, both checks active
    Armed,
}

/// One-shot event latch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Open,
    Fired(AnomalyKind),
}

/// Flow monitor for one continuous run of one station
///
/// Checks per post-inrush sample:
/// 1. Absolute: sample above `max_allowed_flow`
/// 2. Mean: once the window is full, trailing mean above
///    `expected_average + |allowed_mean_deviation|`
///
/// Only the first violation of either kind is returned; the session then
/// stays quiet until it is replaced.
pub struct FlowMonitor {
    station: Station,
    config: StationConfig,

    /// Baseline the session was created with; `None` disables the mean check
    expected_average: Option<f64>,

    /// Trailing window of stored samples
    measurements: VecDeque<f64>,

    submitted: usize,
    stored: usize,
    phase: MonitorPhase,
    status: SessionStatus,
}

impl FlowMonitor {
    pub fn new(station: Station, config: StationConfig, expected_average: Option<f64>) -> Self {
        info!(
            station = %station.name,
            inrush = config.inrush_measurement_count,
            max = config.max_allowed_flow,
            allowed_deviation = config.allowed_mean_deviation,
            window = config.mean_window_size,
            expected_average = ?expected_average,
            "Created flow monitor"
        );

        let phase = if config.inrush_measurement_count > 0 {
            MonitorPhase::Inrush
        } else if config.mean_window_size > 0 {
            MonitorPhase::Accumulating
        } else {
            MonitorPhase::Armed
        };

        Self {
            station,
            config,
            expected_average,
            measurements: VecDeque::with_capacity(config.mean_window_size),
            submitted: 0,
            stored: 0,
            phase,
            status: SessionStatus::Open,
        }
    }

    /// Feed one ticks/minute sample
    ///
    /// Returns the session's anomaly the first time a check fails.
    pub fn submit(&mut self, measurement: f64) -> Option<AnomalyEvent> {
        if !measurement.is_finite() {
            warn!(station = %self.station.name, measurement, "Ignoring non-finite measurement");
            return None;
        }

        self.submitted += 1;

        // 1. Inrush flow right after the valve opens is not representative
        if self.submitted <= self.config.inrush_measurement_count {
            debug!(
                station = %self.station.name,
                measurement,
                remaining = self.config.inrush_measurement_count - self.submitted,
                "Ignoring inrush measurement"
            );
            return None;
        }

        // 2. Store
        self.measurements.push_back(measurement);
        if self.measurements.len() > self.config.mean_window_size {
            self.measurements.pop_front();
        }
        self.stored += 1;
        self.phase = if self.stored >= self.config.mean_window_size {
            MonitorPhase::Armed
        } else {
            MonitorPhase::Accumulating
        };

        debug!(
            station = %self.station.name,
            measurement,
            stored = self.stored,
            phase = ?self.phase,
            "Added measurement"
        );

        let mut raised = None;

        // 3. Absolute ceiling
        if measurement > self.config.max_allowed_flow {
            raised = self.raise(AnomalyEvent::MaxExceeded {
                station: self.station.name.clone(),
                measurement,
                limit: self.config.max_allowed_flow,
            });
        }

        // 4. Trailing mean against baseline
        if self.phase == MonitorPhase::Armed {
            if let Some(event) = self.check_mean() {
                raised = raised.or(self.raise(event));
            }
        }

        raised
    }

    fn check_mean(&self) -> Option<AnomalyEvent> {
        let expected = self.expected_average?;
        if self.measurements.is_empty() {
            return None;
        }

        let measured_mean = self.measurements.iter().mean();
        let diff = measured_mean - expected;

        debug!(
            station = %self.station.name,
            measured_mean,
            diff,
            allowed = self.config.allowed_mean_deviation,
            "Calculated mean"
        );

        if diff > self.config.allowed_mean_deviation.abs() {
            return Some(AnomalyEvent::MeanExceeded {
                station: self.station.name.clone(),
                window: self.measurements.iter().copied().collect(),
                measured_mean,
                expected_mean: expected,
                allowed_deviation: self.config.allowed_mean_deviation,
            });
        }

        None
    }

    /// Close the latch and hand out the event, once per session
    fn raise(&mut self, event: AnomalyEvent) -> Option<AnomalyEvent> {
        match self.status {
            SessionStatus::Fired(first) => {
                debug!(
                    station = %self.station.name,
                    first = ?first,
                    suppressed = ?event.kind(),
                    "Suppressing anomaly, session already fired"
                );
                None
            }
            SessionStatus::Open => {
                self.status = SessionStatus::Fired(event.kind());
                warn!(station = %self.station.name, "{}", event);
                Some(event)
            }
        }
    }

    pub fn station(&self) -> &Station {
        &self.station
    }

    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    pub fn expected_average(&self) -> Option<f64> {
        self.expected_average
    }

    pub fn phase(&self) -> MonitorPhase {
        self.phase
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Samples submitted so far, inrush included
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// Post-inrush samples stored so far
    pub fn stored(&self) -> usize {
        self.stored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_config() -> StationConfig {
        StationConfig {
            inrush_measurement_count: 6,
            max_allowed_flow: 6.0,
            allowed_mean_deviation: 0.75,
            mean_window_size: 10,
        }
    }

    fn monitor() -> FlowMonitor {
        FlowMonitor::new(Station::new(0, "test"), reference_config(), Some(1.8))
    }

    fn feed(monitor: &mut FlowMonitor, samples: &[f64]) -> Vec<AnomalyEvent> {
        samples.iter().filter_map(|&m| monitor.submit(m)).collect()
    }

    fn series(parts: &[(f64, usize)]) -> Vec<f64> {
        parts
            .iter()
            .flat_map(|&(value, count)| std::iter::repeat(value).take(count))
            .collect()
    }

    #[test]
    fn test_inrush_ignored() {
        let mut m = monitor();
        let events = feed(&mut m, &series(&[(8.0, 5), (2.0, 10)]));
        assert!(events.is_empty());
    }

    #[test]
    fn test_sustained_inrush_raises_max() {
        let mut m = monitor();
        let events = feed(&mut m, &series(&[(8.0, 10), (2.0, 10)]));

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), AnomalyKind::MaxExceeded);
        assert_eq!(m.status(), SessionStatus::Fired(AnomalyKind::MaxExceeded));
    }

    #[test]
    fn test_mean_exceeded() {
        let mut m = monitor();
        let events = feed(&mut m, &series(&[(8.0, 3), (3.0, 40)]));

        assert_eq!(events.len(), 1);
        match &events[0] {
            AnomalyEvent::MeanExceeded { window, measured_mean, expected_mean, .. } => {
                assert_eq!(window.len(), 10);
                assert!((measured_mean - 3.0).abs() < 1e-9);
                assert!((expected_mean - 1.8).abs() < 1e-9);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_short_burst_no_alert() {
        let mut m = monitor();
        let events = feed(&mut m, &series(&[(8.0, 3), (2.0, 10), (4.0, 2), (2.0, 10)]));
        assert!(events.is_empty());
        assert_eq!(m.status(), SessionStatus::Open);
    }

    #[test]
    fn test_fewer_than_inrush_never_stores() {
        let mut m = monitor();
        let events = feed(&mut m, &[100.0; 5]);

        assert!(events.is_empty());
        assert_eq!(m.stored(), 0);
        assert_eq!(m.phase(), MonitorPhase::Inrush);
    }

    #[test]
    fn test_phase_transitions() {
        let mut m = monitor();
        feed(&mut m, &[2.0; 6]);
        assert_eq!(m.phase(), MonitorPhase::Inrush);
        assert_eq!(m.stored(), 0);

        m.submit(2.0);
        assert_eq!(m.phase(), MonitorPhase::Accumulating);

        feed(&mut m, &[2.0; 9]);
        assert_eq!(m.phase(), MonitorPhase::Armed);
        assert_eq!(m.stored(), 10);

        feed(&mut m, &[2.0; 20]);
        assert_eq!(m.phase(), MonitorPhase::Armed);
    }

    #[test]
    fn test_max_latched_across_window() {
        // Every armed sample re-checks the ceiling but only one event surfaces
        let mut m = monitor();
        let events = feed(&mut m, &series(&[(8.0, 6), (8.0, 10)]));

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), AnomalyKind::MaxExceeded);
    }

    #[test]
    fn test_mean_latched_even_if_worse_later() {
        let mut m = monitor();
        let events = feed(&mut m, &series(&[(2.0, 6), (3.0, 10), (5.5, 30)]));

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), AnomalyKind::MeanExceeded);
        assert_eq!(m.status(), SessionStatus::Fired(AnomalyKind::MeanExceeded));
    }

    #[test]
    fn test_below_baseline_is_not_anomaly() {
        let mut m = monitor();
        let events = feed(&mut m, &series(&[(2.0, 6), (0.1, 30)]));
        assert!(events.is_empty());
    }

    #[test]
    fn test_negative_deviation_uses_magnitude() {
        let mut config = reference_config();
        config.allowed_mean_deviation = -0.75;
        let mut m = FlowMonitor::new(Station::new(0, "test"), config, Some(1.8));

        let events = feed(&mut m, &series(&[(2.0, 6), (2.4, 10)]));
        assert!(events.is_empty());
    }

    #[test]
    fn test_without_baseline_only_max_checked() {
        let mut m = FlowMonitor::new(Station::new(0, "new"), reference_config(), None);

        let events = feed(&mut m, &series(&[(2.0, 6), (5.0, 20)]));
        assert!(events.is_empty());

        let events = feed(&mut m, &[7.0]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind(), AnomalyKind::MaxExceeded);
    }

    #[test]
    fn test_non_finite_samples_ignored() {
        let mut m = monitor();
        assert!(m.submit(f64::NAN).is_none());
        assert!(m.submit(f64::INFINITY).is_none());
        assert_eq!(m.submitted(), 0);
    }
}
