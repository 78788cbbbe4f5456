pub mod detector;
pub mod profiles;
pub mod replay;

pub use detector::{Detector, DetectorError, DetectorSettings};
pub use profiles::StationProfiles;
pub use replay::{replay, ReplayOutcome, SyntheticRun};
