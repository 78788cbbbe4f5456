use crate::controller::{ControllerError, ControllerSnapshot};
use crate::data::{LogStation, RunLogRecord, Station};
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `/ja` response: everything the controller knows, in one call
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JsonAll {
    pub settings: Settings,
    pub options: Options,
    pub status: Status,
    pub stations: StationNames,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    /// Flow sensor pulses counted in the current realtime window
    #[serde(default)]
    pub flcrt: u64,

    /// Length of the realtime flow window in seconds
    #[serde(default)]
    pub flwrt: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Options {
    /// 1-based index of the first master station, 0 if none
    #[serde(default)]
    pub mas: usize,

    /// 1-based index of the second master station, 0 if none
    #[serde(default)]
    pub mas2: usize,

    /// Flow pulse rate, low byte (hundredths of a liter per pulse)
    #[serde(default)]
    pub fpr0: u32,

    /// Flow pulse rate, high byte
    #[serde(default)]
    pub fpr1: u32,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Status {
    /// Per-station on/off bits
    pub sn: Vec<u8>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StationNames {
    pub snames: Vec<String>,
}

impl JsonAll {
    /// Liters per flow sensor pulse as configured on the device
    pub fn pulse_rate(&self) -> f64 {
        ((self.options.fpr1 << 8) + self.options.fpr0) as f64 / 100.0
    }

    /// Realtime flow in liters/minute
    pub fn flow_rate(&self) -> f64 {
        if self.settings.flwrt == 0 {
            return 0.0;
        }

        let minutes = self.settings.flwrt as f64 / 60.0;
        self.settings.flcrt as f64 * self.pulse_rate() / minutes
    }

    fn is_master(&self, index: usize) -> bool {
        let one_based = index + 1;
        one_based == self.options.mas || one_based == self.options.mas2
    }

    pub fn into_snapshot(self) -> ControllerSnapshot {
        let flow_rate = self.flow_rate();

        let stations = self
            .stations
            .snames
            .iter()
            .enumerate()
            .map(|(index, name)| {
                let station = Station {
                    index,
                    name: name.clone(),
                    is_running: self.status.sn.get(index).copied().unwrap_or(0) != 0,
                    is_master: self.is_master(index),
                };
                (index, station)
            })
            .collect();

        ControllerSnapshot { stations, flow_rate }
    }
}

/// Parse one `/jl` entry: `[pid, sid, dur, end]` or `[pid, sid, dur, end, flow]`
///
/// `sid` is a station index for regular runs and a string marker (`"rd"`,
/// `"rs"`, `"fl"`, ...) for bookkeeping entries.
pub fn parse_log_entry(entry: &[Value]) -> Result<RunLogRecord, ControllerError> {
    if entry.len() < 4 {
        return Err(ControllerError::Payload(format!(
            "log entry has {} fields, expected at least 4",
            entry.len()
        )));
    }

    let program_id = entry[0]
        .as_u64()
        .ok_or_else(|| ControllerError::Payload(format!("bad program id {}", entry[0])))?;

    let station = match &entry[1] {
        Value::Number(n) => n
            .as_u64()
            .map(|index| LogStation::Index(index as usize))
            .ok_or_else(|| ControllerError::Payload(format!("bad station id {}", n)))?,
        Value::String(marker) => LogStation::from_marker(marker),
        other => return Err(ControllerError::Payload(format!("bad station id {}", other))),
    };

    let duration_seconds = entry[2]
        .as_u64()
        .ok_or_else(|| ControllerError::Payload(format!("bad duration {}", entry[2])))?;

    let end_time = entry[3]
        .as_i64()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or_else(|| ControllerError::Payload(format!("bad end time {}", entry[3])))?;

    let flow_ticks_per_minute = entry.get(4).and_then(Value::as_f64);

    Ok(RunLogRecord {
        program_id: program_id as u32,
        station,
        duration_seconds,
        end_time,
        flow_ticks_per_minute,
    })
}
