// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! WebSocket protocol messages for the dashboard.
//!
//! JSON-based protocol, tagged by `type`.

use crate::state::{GreenhouseState, SensorUpdate, SwitchStatus};
use crate::topics::Actuator;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Client → Server messages
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Ping (keepalive)
    Ping {
        #[serde(default)]
        id: Option<u64>,
    },

    /// Ask for the current record again
    GetState,
}

/// Server → Client messages
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full record, sent once on connection
    InitialData { data: GreenhouseState },

    /// Raw broker message, value forwarded verbatim
    SensorUpdate {
        topic: String,
        value: String,
        timestamp: DateTime<Utc>,
    },

    /// An actuator command was published
    ControlUpdate {
        device: String,
        status: SwitchStatus,
    },

    /// A snapshot was written to the store
    DataSaved {
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Pong response
    Pong {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<u64>,
    },

    /// Error occurred
    Error { code: ErrorCode, message: String },
}

/// Error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Invalid message format
    InvalidMessage,
    /// Binary frames are not part of the protocol
    Unsupported,
}

impl ServerMessage {
    pub fn initial_data(state: GreenhouseState) -> Self {
        Self::InitialData { data: state }
    }

    pub fn control_update(actuator: Actuator, status: SwitchStatus) -> Self {
        Self::ControlUpdate {
            device: actuator.name().to_string(),
            status,
        }
    }

    pub fn data_saved(reason: &str, timestamp: DateTime<Utc>) -> Self {
        Self::DataSaved {
            message: format!("Data saved ({})", reason),
            timestamp,
        }
    }

    /// Create an error message
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }
}

impl From<SensorUpdate> for ServerMessage {
    fn from(update: SensorUpdate) -> Self {
        Self::SensorUpdate {
            topic: update.topic,
            value: update.value,
            timestamp: update.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ping() {
        let json = r#"{"type": "ping", "id": 7}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::Ping { id } => assert_eq!(id, Some(7)),
            _ => panic!("Expected Ping"),
        }
    }

    #[test]
    fn parse_get_state() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type": "get_state"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::GetState));
    }

    #[test]
    fn serialize_control_update() {
        let msg = ServerMessage::control_update(Actuator::Relay1, SwitchStatus::On);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "control_update");
        assert_eq!(json["device"], "relay1");
        assert_eq!(json["status"], "1");
    }

    #[test]
    fn serialize_sensor_update_keeps_raw_value() {
        let msg: ServerMessage = SensorUpdate {
            topic: "esp32/air/humidity".into(),
            value: "55.20".into(),
            timestamp: Utc::now(),
        }
        .into();
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "sensor_update");
        assert_eq!(json["value"], "55.20");
    }

    #[test]
    fn serialize_error() {
        let msg = ServerMessage::error(ErrorCode::InvalidMessage, "bad");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("INVALID_MESSAGE"));
    }
}
