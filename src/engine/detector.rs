use crate::controller::{Controller, ControllerError};
use crate::data::{Station, StationKey};
use crate::detection::{AnomalyEvent, BaselineCalculator, Baselines, FlowMonitor};
use crate::engine::profiles::StationProfiles;
use crate::notify::Notifier;
use crate::utils::config::{Config, ConfigError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error(transparent)]
    Controller(#[from] ControllerError),

    #[error("baseline refresh task stopped: {0}")]
    RefreshTask(String),
}

/// Detection loop timing, unit conversion and station profiles
#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub averages_history_days: u32,
    pub averages_update_interval: Duration,
    pub running_station_interval: Duration,
    pub liters_per_tick: f64,
    pub profiles: StationProfiles,
}

impl DetectorSettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;

        let detector = &config.detector;
        Ok(Self {
            averages_history_days: detector.averages_history_days,
            averages_update_interval: duration(
                "detector.averages_update_interval_hours",
                detector.averages_update_interval_hours * 3600.0,
            )?,
            running_station_interval: duration(
                "detector.running_station_interval_seconds",
                detector.running_station_interval_seconds,
            )?,
            liters_per_tick: config.controller.liters_per_tick,
            profiles: StationProfiles::from_config(&detector.stations)?,
        })
    }
}

fn duration(field: &str, secs: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs).map_err(|e| ConfigError::invalid(field, e.to_string()))
}

/// Leak detection loop for one controller
///
/// Flow:
/// 1. Compute baselines once before monitoring starts
/// 2. Background task recomputes them every `averages_update_interval`
///    and swaps the snapshot in
/// 3. Every `running_station_interval`: refresh the controller, bind a
///    flow monitor to the running station, feed it the current flow
/// 4. Anomalies go to the notifier on their own tasks
pub struct Detector<C: ?Sized, N: ?Sized> {
    controller: Arc<C>,
    notifier: Arc<N>,
    settings: Arc<DetectorSettings>,
    baselines: Arc<watch::Sender<Arc<Baselines>>>,
    session: Option<FlowMonitor>,
    notifications: JoinSet<()>,
}

impl<C, N> Detector<C, N>
where
    C: Controller + ?Sized + 'static,
    N: Notifier + ?Sized + 'static,
{
    pub fn new(controller: Arc<C>, notifier: Arc<N>, settings: DetectorSettings) -> Self {
        let (baselines, _) = watch::channel(Arc::new(Baselines::empty()));

        Self {
            controller,
            notifier,
            settings: Arc::new(settings),
            baselines: Arc::new(baselines),
            session: None,
            notifications: JoinSet::new(),
        }
    }

    /// Run until the controller fails or the future is dropped
    ///
    /// Dropping the future aborts the refresh task and any notifications
    /// still in flight.
    pub async fn run(mut self) -> Result<(), DetectorError> {
        info!("Starting leak detection");

        // Baselines must exist before the first running station is seen
        self.update_baselines().await?;

        let mut background = JoinSet::new();
        background.spawn(refresh_periodically(
            Arc::clone(&self.controller),
            Arc::clone(&self.settings),
            Arc::clone(&self.baselines),
        ));

        tokio::select! {
            result = self.poll_loop() => result,
            Some(joined) = background.join_next() => match joined {
                Ok(result) => result,
                Err(e) => Err(DetectorError::RefreshTask(e.to_string())),
            },
        }
    }

    /// Recompute baselines from the controller's run history and publish them
    pub async fn update_baselines(&self) -> Result<Arc<Baselines>, DetectorError> {
        update_baselines(self.controller.as_ref(), &self.settings, &self.baselines).await
    }

    async fn poll_loop(&mut self) -> Result<(), DetectorError> {
        loop {
            self.poll_once().await?;
            tokio::time::sleep(self.settings.running_station_interval).await;
        }
    }

    /// One polling tick
    ///
    /// When no station is running the current session is kept but not fed.
    pub async fn poll_once(&mut self) -> Result<(), DetectorError> {
        let snapshot = self.controller.refresh().await?;
        self.reap_notifications();

        let Some(station) = snapshot.running_station() else {
            debug!("No station running");
            return Ok(());
        };

        let ticks_per_minute = snapshot.flow_rate / self.settings.liters_per_tick;

        let session = match self.session.take() {
            Some(current) if current.station().index == station.index => self.session.insert(current),
            previous => {
                if let Some(previous) = previous {
                    info!(
                        station = %previous.station().name,
                        stored = previous.stored(),
                        status = ?previous.status(),
                        "Ending flow monitor session"
                    );
                }
                let monitor = self.new_session(station);
                self.session.insert(monitor)
            }
        };

        if let Some(event) = session.submit(ticks_per_minute) {
            self.dispatch(event);
        }

        Ok(())
    }

    fn new_session(&self, station: &Station) -> FlowMonitor {
        let key = station.key();
        let config = self.settings.profiles.resolve(&key);
        let expected = self.expected_average(&key);

        if expected.is_none() {
            warn!(
                station = %station.name,
                "No flow history or configured average, mean check disabled"
            );
        }

        FlowMonitor::new(station.clone(), config, expected)
    }

    /// History first, then the configured fallback
    fn expected_average(&self, key: &StationKey) -> Option<f64> {
        let baselines = self.baselines.borrow().clone();

        baselines
            .get(key)
            .map(|baseline| baseline.average_ticks_per_minute)
            .or_else(|| self.settings.profiles.fallback_average(key))
    }

    fn dispatch(&mut self, event: AnomalyEvent) {
        let notifier = Arc::clone(&self.notifier);

        self.notifications.spawn(async move {
            if let Err(e) = notifier.notify(&event).await {
                error!(station = event.station(), "Failed to send anomaly notification: {}", e);
            }
        });
    }

    fn reap_notifications(&mut self) {
        while let Some(joined) = self.notifications.try_join_next() {
            if let Err(e) = joined {
                error!("Notification task failed: {}", e);
            }
        }
    }

    /// Wait for every notification dispatched so far
    pub async fn flush_notifications(&mut self) {
        while let Some(joined) = self.notifications.join_next().await {
            if let Err(e) = joined {
                error!("Notification task failed: {}", e);
            }
        }
    }

    /// Current flow monitor session, if a station has been seen running
    pub fn session(&self) -> Option<&FlowMonitor> {
        self.session.as_ref()
    }

    /// Latest published baseline snapshot
    pub fn baselines(&self) -> Arc<Baselines> {
        self.baselines.borrow().clone()
    }

    /// Receiver that observes every baseline swap
    pub fn subscribe_baselines(&self) -> watch::Receiver<Arc<Baselines>> {
        self.baselines.subscribe()
    }

    pub fn settings(&self) -> &DetectorSettings {
        &self.settings
    }
}

async fn update_baselines<C: Controller + ?Sized>(
    controller: &C,
    settings: &DetectorSettings,
    baselines: &watch::Sender<Arc<Baselines>>,
) -> Result<Arc<Baselines>, DetectorError> {
    // Station names come from the live state, logs only carry indices
    let snapshot = controller.refresh().await?;
    let logs = controller.get_logs(settings.averages_history_days).await?;

    let computed = Arc::new(BaselineCalculator::compute(&logs, |index| {
        snapshot.station(index).map(Station::key)
    }));

    for (key, baseline) in computed.iter() {
        debug!(
            station = %key,
            average = baseline.average_ticks_per_minute,
            runs = baseline.sample_count,
            "Station baseline"
        );
    }
    info!(
        stations = computed.len(),
        records = logs.len(),
        history_days = settings.averages_history_days,
        "Updated station baselines"
    );

    baselines.send_replace(Arc::clone(&computed));
    Ok(computed)
}

async fn refresh_periodically<C: Controller + ?Sized>(
    controller: Arc<C>,
    settings: Arc<DetectorSettings>,
    baselines: Arc<watch::Sender<Arc<Baselines>>>,
) -> Result<(), DetectorError> {
    loop {
        tokio::time::sleep(settings.averages_update_interval).await;
        update_baselines(controller.as_ref(), &settings, &baselines).await?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
        [controller]
        url = "http://localhost"
        password = "opendoor"
        liters_per_tick = 0.5

        [detector]
        averages_history_days = 14
        averages_update_interval_hours = 6
        running_station_interval_seconds = 2.5

        [detector.stations.default]
        num_inrush_measurements = 6
        allowed_flow_rate_max = 6.0
        allowed_flow_rate_diff_from_average = 0.75
        flow_rate_average_history_meansurements = 10
    "#;

    #[test]
    fn test_settings_from_config() {
        let config = Config::from_toml_str(CONFIG).unwrap();
        let settings = DetectorSettings::from_config(&config).unwrap();

        assert_eq!(settings.averages_history_days, 14);
        assert_eq!(settings.averages_update_interval, Duration::from_secs(6 * 3600));
        assert_eq!(settings.running_station_interval, Duration::from_millis(2500));
        assert_eq!(settings.profiles.default_config().mean_window_size, 10);
    }
}
