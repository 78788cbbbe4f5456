use crate::data::Station;
use crate::detection::{AnomalyEvent, FlowMonitor, MonitorPhase, StationConfig};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Result of pushing a recorded run through a flow monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayOutcome {
    pub event: Option<AnomalyEvent>,

    /// Index into the input of the sample that raised `event`
    pub trigger_index: Option<usize>,

    pub submitted: usize,
    pub stored: usize,
    pub final_phase: MonitorPhase,
}

/// Run `samples` (ticks/minute) through a fresh monitor
pub fn replay(
    station_name: &str,
    config: StationConfig,
    expected_average: Option<f64>,
    samples: &[f64],
) -> ReplayOutcome {
    let mut monitor = FlowMonitor::new(Station::new(0, station_name), config, expected_average);
    let mut event = None;
    let mut trigger_index = None;

    for (i, &sample) in samples.iter().enumerate() {
        if let Some(raised) = monitor.submit(sample) {
            event = Some(raised);
            trigger_index = Some(i);
        }
    }

    ReplayOutcome {
        event,
        trigger_index,
        submitted: monitor.submitted(),
        stored: monitor.stored(),
        final_phase: monitor.phase(),
    }
}

/// Shape of a generated station run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticRun {
    /// Total samples
    pub length: usize,

    /// Leading samples at `inrush_level`
    pub inrush_samples: usize,
    pub inrush_level: f64,

    pub steady_level: f64,

    /// Uniform noise amplitude around the steady level
    pub noise: f64,

    /// Added to the steady level from sample `leak_after` on
    pub leak_offset: f64,
    pub leak_after: usize,
}

impl Default for SyntheticRun {
    fn default() -> Self {
        Self {
            length: 120,
            inrush_samples: 4,
            inrush_level: 8.0,
            steady_level: 1.8,
            noise: 0.2,
            leak_offset: 0.0,
            leak_after: 60,
        }
    }
}

impl SyntheticRun {
    pub fn generate<R: Rng>(&self, rng: &mut R) -> Vec<f64> {
        (0..self.length)
            .map(|i| {
                if i < self.inrush_samples {
                    return self.inrush_level;
                }

                let mut level = self.steady_level;
                if i >= self.leak_after {
                    level += self.leak_offset;
                }
                if self.noise > 0.0 {
                    level += rng.gen_range(-self.noise..=self.noise);
                }
                level.max(0.0)
            })
            .collect()
    }
}
