use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized station identifier used to look up profiles and baselines
///
/// Derived from the display name: lower-cased, spaces replaced with `_`.
/// Two stations whose names normalize the same way share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StationKey(String);

impl StationKey {
    pub fn from_name(name: &str) -> Self {
        Self(name.to_lowercase().replace(' ', "_"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StationKey {
    fn from(value: &str) -> Self {
        Self::from_name(value)
    }
}

/// A single valve as reported by the controller on the last refresh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub index: usize,
    pub name: String,
    pub is_running: bool,
    pub is_master: bool,
}

impl Station {
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            is_running: false,
            is_master: false,
        }
    }

    pub fn key(&self) -> StationKey {
        StationKey::from_name(&self.name)
    }

    /// Running and not a master valve
    pub fn is_monitorable(&self) -> bool {
        self.is_running && !self.is_master
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_normalization() {
        assert_eq!(StationKey::from_name("Front Lawn").as_str(), "front_lawn");
        assert_eq!(StationKey::from_name("Drip  Beds").as_str(), "drip__beds");
        assert_eq!(StationKey::from_name("garage").as_str(), "garage");
    }

    #[test]
    fn test_colliding_names_share_key() {
        let a = Station::new(0, "Back Yard");
        let b = Station::new(4, "back yard");
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_master_is_not_monitorable() {
        let mut station = Station::new(0, "Master");
        station.is_running = true;
        station.is_master = true;
        assert!(!station.is_monitorable());

        station.is_master = false;
        assert!(station.is_monitorable());
    }
}
