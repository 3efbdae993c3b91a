// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Greenhouse Bridge
//!
//! Connects a greenhouse controller speaking MQTT to browser dashboards and a
//! snapshot database.
//!
//! # Architecture
//!
//! ```text
//! MQTT broker
//!   |  esp32/air/temperature, esp32/air/humidity, esp32/soil/percent
//!   v
//! GreenhouseBridge --+-- GreenhouseState (one shared record)
//!   ^                +-- broadcast --> ClientSession (WebSocket, per browser)
//!   |                +-- Recorder  --> SnapshotStore (SQLite)
//!   |
//! REST: POST /api/control/{pump,valve,relay1,relay2}
//!   -> Broker::publish(esp32/control/...)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use greenhouse_bridge::{GreenhouseBridge, MockBroker, SqliteStore};
//! use std::sync::Arc;
//!
//! let bridge = GreenhouseBridge::new(
//!     Arc::new(MockBroker::new()),
//!     Arc::new(SqliteStore::new_in_memory()?),
//! );
//! bridge.control(Actuator::Pump, SwitchStatus::On).await?;
//! ```

pub mod bridge;
pub mod broker;
pub mod config;
pub mod handlers;
pub mod protocol;
pub mod recorder;
pub mod routes;
pub mod server;
pub mod session;
pub mod sqlite;
pub mod state;
pub mod store;
pub mod topics;

pub use bridge::GreenhouseBridge;
pub use broker::{Broker, BrokerError, BrokerMessage, MockBroker, MqttBroker, MqttEventLoop};
pub use config::{BridgeConfig, ConfigError, MqttConfig, ServerConfig, StorageConfig};
pub use protocol::{ClientMessage, ServerMessage};
pub use recorder::Recorder;
pub use server::{build_router, AppState};
pub use sqlite::SqliteStore;
pub use state::{GreenhouseState, Snapshot, SwitchStatus};
pub use store::{SnapshotStore, StoreError, StoredSnapshot};
pub use topics::{Actuator, Sensor};
