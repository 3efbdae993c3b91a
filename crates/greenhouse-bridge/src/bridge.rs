// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Greenhouse bridge - connects the broker, the shared record, the store and
//! the WebSocket sessions.
//!
//! Every operation is one hop: broker message -> record -> broadcast, or
//! control request -> publish -> record -> broadcast -> save.

use crate::broker::{Broker, BrokerError, BrokerMessage};
use crate::protocol::ServerMessage;
use crate::recorder::Recorder;
use crate::state::{GreenhouseState, SwitchStatus};
use crate::store::{SnapshotStore, StoreError, StoredSnapshot};
use crate::topics::Actuator;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, info};

/// Capacity of the session fan-out channel
const EVENT_CAPACITY: usize = 256;

/// Shared bridge state
pub struct GreenhouseBridge {
    state: RwLock<GreenhouseState>,
    broker: Arc<dyn Broker>,
    recorder: Recorder,
    events: broadcast::Sender<ServerMessage>,
}

impl GreenhouseBridge {
    pub fn new(broker: Arc<dyn Broker>, store: Arc<dyn SnapshotStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: RwLock::new(GreenhouseState::new()),
            broker,
            recorder: Recorder::new(store, events.clone()),
            events,
        }
    }

    /// Receive every event broadcast from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.events.subscribe()
    }

    /// Copy of the current record
    pub async fn current_state(&self) -> GreenhouseState {
        self.state.read().await.clone()
    }

    pub fn broker_connected(&self) -> bool {
        self.broker.is_connected()
    }

    /// Apply one broker message and broadcast it verbatim
    pub async fn ingest(&self, message: BrokerMessage) {
        info!("Received: {} = {}", message.topic, message.payload);

        let update = {
            let mut state = self.state.write().await;
            state.apply_reading(&message.topic, &message.payload, Utc::now())
        };

        // No sessions connected is not an error
        let _ = self.events.send(update.into());
    }

    /// Consume broker messages until the channel closes
    pub async fn run_ingest(self: Arc<Self>, mut rx: mpsc::Receiver<BrokerMessage>) {
        while let Some(message) = rx.recv().await {
            self.ingest(message).await;
        }
        debug!("Broker message channel closed");
    }

    /// Publish a command, record it, broadcast it and persist.
    ///
    /// The record is only touched once the publish was accepted.
    pub async fn control(&self, actuator: Actuator, status: SwitchStatus) -> Result<(), BrokerError> {
        self.broker.publish(actuator.topic(), status.as_str())?;

        self.state.write().await.set_switch(actuator, status);
        info!("{} {}", actuator.label(), status.word());

        let _ = self
            .events
            .send(ServerMessage::control_update(actuator, status));

        self.save(&format!("{}_control", actuator.name())).await;
        Ok(())
    }

    /// Persist the current record if any sensor has reported
    pub async fn save(&self, reason: &str) -> Option<StoredSnapshot> {
        let state = self.current_state().await;
        self.recorder.save(&state, reason)
    }

    /// Most recent snapshots first
    pub fn history(&self, limit: usize) -> Result<Vec<StoredSnapshot>, StoreError> {
        self.recorder.store().history(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MockBroker;
    use crate::sqlite::SqliteStore;

    fn bridge() -> (Arc<GreenhouseBridge>, Arc<MockBroker>) {
        let broker = Arc::new(MockBroker::new());
        let store = Arc::new(SqliteStore::new_in_memory().unwrap());
        (Arc::new(GreenhouseBridge::new(broker.clone(), store)), broker)
    }

    fn message(topic: &str, payload: &str) -> BrokerMessage {
        BrokerMessage {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    #[tokio::test]
    async fn test_ingest_updates_state_and_broadcasts() {
        let (bridge, _) = bridge();
        let mut rx = bridge.subscribe();

        bridge.ingest(message("esp32/air/humidity", "64.1")).await;

        let state = bridge.current_state().await;
        assert_eq!(state.air_humidity, Some(64.1));
        assert!(state.last_update.is_some());

        match rx.recv().await.unwrap() {
            ServerMessage::SensorUpdate { topic, value, .. } => {
                assert_eq!(topic, "esp32/air/humidity");
                assert_eq!(value, "64.1");
            }
            other => panic!("Expected SensorUpdate, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_control_publishes_and_saves() {
        let (bridge, broker) = bridge();
        bridge.ingest(message("esp32/air/temperature", "22")).await;
        let mut rx = bridge.subscribe();

        bridge.control(Actuator::Valve, SwitchStatus::On).await.unwrap();

        let published = broker.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic, "esp32/control/solenoid");
        assert_eq!(published[0].payload, "1");

        assert_eq!(bridge.current_state().await.valve_status, SwitchStatus::On);

        assert!(matches!(
            rx.recv().await.unwrap(),
            ServerMessage::ControlUpdate { .. }
        ));
        match rx.recv().await.unwrap() {
            ServerMessage::DataSaved { message, .. } => {
                assert_eq!(message, "Data saved (valve_control)")
            }
            other => panic!("Expected DataSaved, got {:?}", other),
        }

        let history = bridge.history(50).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].snapshot.valve_status, SwitchStatus::On);
    }

    #[tokio::test]
    async fn test_control_without_readings_skips_save() {
        let (bridge, _) = bridge();
        bridge.control(Actuator::Pump, SwitchStatus::On).await.unwrap();

        assert_eq!(bridge.current_state().await.pump_status, SwitchStatus::On);
        assert!(bridge.history(50).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_publish_leaves_state_untouched() {
        let (bridge, broker) = bridge();
        broker.set_fail_publish(true);

        let result = bridge.control(Actuator::Relay2, SwitchStatus::On).await;
        assert!(result.is_err());
        assert_eq!(bridge.current_state().await.relay2_status, SwitchStatus::Off);
    }

    #[tokio::test]
    async fn test_run_ingest_drains_channel() {
        let (bridge, _) = bridge();
        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(bridge.clone().run_ingest(rx));

        tx.send(message("esp32/soil/percent", "38")).await.unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(bridge.current_state().await.soil_humidity, Some(38.0));
    }
}
