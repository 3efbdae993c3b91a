// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared greenhouse record.
//!
//! One flat mutable record holds the latest sensor readings and the last
//! commanded actuator states. It lives for the lifetime of the process.

use crate::topics::{Actuator, Sensor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Binary actuator status, carried on the wire as `"0"` or `"1"`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SwitchStatus {
    #[default]
    Off,
    On,
}

/// Rejected status string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Status must be \"0\" or \"1\"")]
pub struct InvalidStatus;

impl SwitchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SwitchStatus::Off => "0",
            SwitchStatus::On => "1",
        }
    }

    /// `ON` / `OFF`, as used in log lines and response messages
    pub fn word(self) -> &'static str {
        match self {
            SwitchStatus::Off => "OFF",
            SwitchStatus::On => "ON",
        }
    }
}

impl FromStr for SwitchStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "0" => Ok(SwitchStatus::Off),
            "1" => Ok(SwitchStatus::On),
            _ => Err(InvalidStatus),
        }
    }
}

impl fmt::Display for SwitchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SwitchStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SwitchStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Latest known greenhouse state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GreenhouseState {
    pub temperature: Option<f64>,
    pub air_humidity: Option<f64>,
    pub soil_humidity: Option<f64>,
    pub pump_status: SwitchStatus,
    pub valve_status: SwitchStatus,
    pub relay1_status: SwitchStatus,
    pub relay2_status: SwitchStatus,
    pub last_update: Option<DateTime<Utc>>,
}

/// A raw broker message as it was applied to the record
#[derive(Debug, Clone, PartialEq)]
pub struct SensorUpdate {
    pub topic: String,
    /// Payload exactly as received
    pub value: String,
    pub timestamp: DateTime<Utc>,
}

/// Document written to the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub temperature: f64,
    pub air_humidity: f64,
    pub soil_humidity: f64,
    pub pump_status: SwitchStatus,
    pub valve_status: SwitchStatus,
    pub relay1_status: SwitchStatus,
    pub relay2_status: SwitchStatus,
    pub timestamp: DateTime<Utc>,
}

/// Parse a sensor payload.
///
/// Reads the longest decimal prefix after leading whitespace, so `"25.3C"`
/// gives 25.3. A payload with no numeric prefix gives NaN, which still counts
/// as a report: it serializes as `null` and is stored as 0.
pub fn parse_reading(payload: &str) -> f64 {
    let s = payload.trim_start();
    let end = numeric_prefix_len(s);
    if end == 0 {
        return f64::NAN;
    }
    s[..end].parse().unwrap_or(f64::NAN)
}

/// Length of the leading `[+-](Infinity | digits[.digits][e[+-]digits])`
fn numeric_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }
    if s[i..].starts_with("Infinity") {
        return i + "Infinity".len();
    }

    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut digits = i - int_start;

    if i < bytes.len() && bytes[i] == b'.' {
        let frac_start = i + 1;
        let mut j = frac_start;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if digits > 0 || j > frac_start {
            digits += j - frac_start;
            i = j;
        }
    }
    if digits == 0 {
        return 0;
    }

    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        let mut j = i + 1;
        if matches!(bytes.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    i
}

impl GreenhouseState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a broker message.
    ///
    /// Known sensor topics overwrite their field; every message, known or not,
    /// refreshes `last_update`.
    pub fn apply_reading(&mut self, topic: &str, payload: &str, now: DateTime<Utc>) -> SensorUpdate {
        if let Some(sensor) = Sensor::from_topic(topic) {
            *self.sensor_mut(sensor) = Some(parse_reading(payload));
        }
        self.last_update = Some(now);

        SensorUpdate {
            topic: topic.to_string(),
            value: payload.to_string(),
            timestamp: now,
        }
    }

    pub fn sensor(&self, sensor: Sensor) -> Option<f64> {
        match sensor {
            Sensor::Temperature => self.temperature,
            Sensor::AirHumidity => self.air_humidity,
            Sensor::SoilHumidity => self.soil_humidity,
        }
    }

    fn sensor_mut(&mut self, sensor: Sensor) -> &mut Option<f64> {
        match sensor {
            Sensor::Temperature => &mut self.temperature,
            Sensor::AirHumidity => &mut self.air_humidity,
            Sensor::SoilHumidity => &mut self.soil_humidity,
        }
    }

    pub fn set_switch(&mut self, actuator: Actuator, status: SwitchStatus) {
        let slot = match actuator {
            Actuator::Pump => &mut self.pump_status,
            Actuator::Valve => &mut self.valve_status,
            Actuator::Relay1 => &mut self.relay1_status,
            Actuator::Relay2 => &mut self.relay2_status,
        };
        *slot = status;
    }

    /// True once at least one sensor has reported, even an unparsable value
    pub fn has_readings(&self) -> bool {
        Sensor::ALL.iter().any(|s| self.sensor(*s).is_some())
    }

    /// Build the persisted document; missing and NaN readings are stored as 0
    pub fn snapshot(&self, timestamp: DateTime<Utc>) -> Snapshot {
        let stored = |v: Option<f64>| v.filter(|v| !v.is_nan()).unwrap_or(0.0);
        Snapshot {
            temperature: stored(self.temperature),
            air_humidity: stored(self.air_humidity),
            soil_humidity: stored(self.soil_humidity),
            pump_status: self.pump_status,
            valve_status: self.valve_status,
            relay1_status: self.relay1_status,
            relay2_status: self.relay2_status,
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_serializes_with_nulls() {
        let json = serde_json::to_value(GreenhouseState::new()).unwrap();
        assert!(json["temperature"].is_null());
        assert!(json["lastUpdate"].is_null());
        assert_eq!(json["pumpStatus"], "0");
        assert_eq!(json["relay2Status"], "0");
    }

    #[test]
    fn apply_known_topic() {
        let mut state = GreenhouseState::new();
        let now = Utc::now();
        let update = state.apply_reading("esp32/air/temperature", "23.5", now);

        assert_eq!(state.temperature, Some(23.5));
        assert_eq!(state.last_update, Some(now));
        assert_eq!(update.value, "23.5");
        assert!(state.has_readings());
    }

    #[test]
    fn apply_unknown_topic_only_touches_timestamp() {
        let mut state = GreenhouseState::new();
        let now = Utc::now();
        let update = state.apply_reading("esp32/other", "7", now);

        assert!(!state.has_readings());
        assert_eq!(state.last_update, Some(now));
        assert_eq!(update.topic, "esp32/other");
    }

    #[test]
    fn payload_numeric_prefix_is_kept() {
        assert_eq!(parse_reading("25.3C"), 25.3);
        assert_eq!(parse_reading(" 12e1x"), 120.0);
        assert_eq!(parse_reading(" 12.25\n"), 12.25);
        assert_eq!(parse_reading("-.5%"), -0.5);
        assert_eq!(parse_reading("7."), 7.0);
        assert_eq!(parse_reading("3e"), 3.0);
        assert_eq!(parse_reading("Infinity"), f64::INFINITY);
        assert!(parse_reading("n/a").is_nan());
        assert!(parse_reading(".").is_nan());
        assert!(parse_reading("inf").is_nan());
        assert!(parse_reading("").is_nan());
    }

    #[test]
    fn garbage_payload_still_counts_as_report() {
        let mut state = GreenhouseState::new();
        state.apply_reading("esp32/soil/percent", "n/a", Utc::now());

        assert!(state.has_readings());
        let json = serde_json::to_value(&state).unwrap();
        assert!(json["soilHumidity"].is_null());
        assert_eq!(state.snapshot(Utc::now()).soil_humidity, 0.0);
    }

    #[test]
    fn payload_with_unit_suffix_updates_reading() {
        let mut state = GreenhouseState::new();
        state.apply_reading("esp32/air/temperature", "25.3C", Utc::now());
        assert_eq!(state.temperature, Some(25.3));
    }

    #[test]
    fn switch_status_parsing() {
        assert_eq!("1".parse::<SwitchStatus>(), Ok(SwitchStatus::On));
        assert_eq!("0".parse::<SwitchStatus>(), Ok(SwitchStatus::Off));
        assert!("on".parse::<SwitchStatus>().is_err());
        assert!("".parse::<SwitchStatus>().is_err());
        assert_eq!(
            InvalidStatus.to_string(),
            "Status must be \"0\" or \"1\""
        );
    }

    #[test]
    fn snapshot_zeroes_missing_readings() {
        let mut state = GreenhouseState::new();
        state.air_humidity = Some(61.0);
        state.set_switch(Actuator::Valve, SwitchStatus::On);

        let ts = Utc::now();
        let snap = state.snapshot(ts);
        assert_eq!(snap.temperature, 0.0);
        assert_eq!(snap.air_humidity, 61.0);
        assert_eq!(snap.valve_status, SwitchStatus::On);
        assert_eq!(snap.pump_status, SwitchStatus::Off);
        assert_eq!(snap.timestamp, ts);
    }
}
