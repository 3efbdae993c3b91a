// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed MQTT topic table for the greenhouse controller.
//!
//! Sensor topics are subscribed; control topics are only published to.

use std::fmt;
use std::str::FromStr;

/// Sensor readings published by the field controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sensor {
    Temperature,
    AirHumidity,
    SoilHumidity,
}

impl Sensor {
    /// All sensors, in subscription order
    pub const ALL: [Sensor; 3] = [Sensor::Temperature, Sensor::AirHumidity, Sensor::SoilHumidity];

    /// MQTT topic carrying this reading
    pub fn topic(self) -> &'static str {
        match self {
            Sensor::Temperature => "esp32/air/temperature",
            Sensor::AirHumidity => "esp32/air/humidity",
            Sensor::SoilHumidity => "esp32/soil/percent",
        }
    }

    /// Resolve an incoming topic to a sensor
    pub fn from_topic(topic: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.topic() == topic)
    }
}

/// Remotely switched actuators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Actuator {
    Pump,
    Valve,
    Relay1,
    Relay2,
}

impl Actuator {
    pub const ALL: [Actuator; 4] = [
        Actuator::Pump,
        Actuator::Valve,
        Actuator::Relay1,
        Actuator::Relay2,
    ];

    /// MQTT topic the command is published on
    pub fn topic(self) -> &'static str {
        match self {
            Actuator::Pump => "esp32/control/pump",
            Actuator::Valve => "esp32/control/solenoid",
            Actuator::Relay1 => "esp32/control/custom1",
            Actuator::Relay2 => "esp32/control/custom2",
        }
    }

    /// Device name used in URLs and broadcast events
    pub fn name(self) -> &'static str {
        match self {
            Actuator::Pump => "pump",
            Actuator::Valve => "valve",
            Actuator::Relay1 => "relay1",
            Actuator::Relay2 => "relay2",
        }
    }

    /// Human-readable label for response messages
    pub fn label(self) -> &'static str {
        match self {
            Actuator::Pump => "Pump",
            Actuator::Valve => "Valve",
            Actuator::Relay1 => "Relay 1",
            Actuator::Relay2 => "Relay 2",
        }
    }
}

impl fmt::Display for Actuator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unknown device name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown device '{0}'")]
pub struct UnknownDevice(pub String);

impl FromStr for Actuator {
    type Err = UnknownDevice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.name() == s)
            .ok_or_else(|| UnknownDevice(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_topic_lookup() {
        assert_eq!(
            Sensor::from_topic("esp32/soil/percent"),
            Some(Sensor::SoilHumidity)
        );
        assert_eq!(Sensor::from_topic("esp32/control/pump"), None);
    }

    #[test]
    fn actuator_names() {
        assert_eq!("relay2".parse::<Actuator>().unwrap(), Actuator::Relay2);
        assert_eq!(Actuator::Valve.topic(), "esp32/control/solenoid");
        assert!("heater".parse::<Actuator>().is_err());
    }
}
