pub mod station;
pub mod run_log;

pub use station::{Station, StationKey};
pub use run_log::{LogStation, RunLogRecord, MANUAL_PROGRAM_ID, RUN_ONCE_PROGRAM_ID};
