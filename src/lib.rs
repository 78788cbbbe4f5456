pub mod data;
pub mod controller;
pub mod detection;
pub mod engine;
pub mod notify;
pub mod utils;

// Re-export commonly used types
pub use data::{LogStation, RunLogRecord, Station, StationKey};
pub use controller::{Controller, ControllerError, ControllerSnapshot, OpenSprinklerClient};
pub use detection::{
    AnomalyEvent, AnomalyKind, BaselineCalculator, Baselines, FlowMonitor,
    MonitorPhase, SessionStatus, StationBaseline, StationConfig,
};
pub use engine::{Detector, DetectorError, DetectorSettings, StationProfiles};
pub use notify::{LogNotifier, Notifier, NotifyError, TelegramNotifier};
pub use utils::{Config, ConfigError};
