pub mod baseline;
pub mod monitor;
pub mod events;

pub use baseline::{BaselineCalculator, Baselines, StationBaseline};
pub use monitor::{FlowMonitor, MonitorPhase, SessionStatus, StationConfig};
pub use events::{AnomalyEvent, AnomalyKind};
