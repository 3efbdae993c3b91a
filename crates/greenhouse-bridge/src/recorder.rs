// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Snapshot recorder.
//!
//! Writes the shared record to the store, either on the fixed schedule or
//! right after a control action. Failures are logged and otherwise ignored.

use crate::bridge::GreenhouseBridge;
use crate::protocol::ServerMessage;
use crate::state::GreenhouseState;
use crate::store::{SnapshotStore, StoredSnapshot};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

/// Reason tag for the periodic save
pub const SCHEDULED: &str = "scheduled";

/// Save policy over a [`SnapshotStore`]
pub struct Recorder {
    store: Arc<dyn SnapshotStore>,
    events: broadcast::Sender<ServerMessage>,
}

impl Recorder {
    pub fn new(store: Arc<dyn SnapshotStore>, events: broadcast::Sender<ServerMessage>) -> Self {
        Self { store, events }
    }

    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    /// Persist `state` if any sensor has reported.
    ///
    /// On success every session is told via `data_saved`. Returns the written
    /// row, or `None` when nothing was written.
    pub fn save(&self, state: &GreenhouseState, reason: &str) -> Option<StoredSnapshot> {
        if !state.has_readings() {
            debug!("Skipping save ({}): no sensor readings yet", reason);
            return None;
        }

        let snapshot = state.snapshot(Utc::now());
        match self.store.save(&snapshot) {
            Ok(stored) => {
                info!(
                    "Data saved ({}): id={} temperature={} airHumidity={} soilHumidity={} \
                     pump={} valve={} relay1={} relay2={}",
                    reason,
                    stored.id,
                    snapshot.temperature,
                    snapshot.air_humidity,
                    snapshot.soil_humidity,
                    snapshot.pump_status,
                    snapshot.valve_status,
                    snapshot.relay1_status,
                    snapshot.relay2_status,
                );
                let _ = self
                    .events
                    .send(ServerMessage::data_saved(reason, Utc::now()));
                Some(stored)
            }
            Err(e) => {
                error!("Error saving snapshot ({}): {}", reason, e);
                None
            }
        }
    }
}

/// Save on a fixed cadence until the task is aborted.
///
/// The first save happens one full `period` after start.
pub async fn run_schedule(bridge: Arc<GreenhouseBridge>, period: Duration) {
    info!("Scheduled save every {}s", period.as_secs());

    let mut ticker = tokio::time::interval(period);
    // interval() fires immediately on the first tick
    ticker.tick().await;

    loop {
        ticker.tick().await;
        bridge.save(SCHEDULED).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{BrokerMessage, MockBroker};
    use crate::sqlite::SqliteStore;
    use crate::state::SwitchStatus;
    use crate::topics::Actuator;

    fn recorder() -> (Recorder, broadcast::Receiver<ServerMessage>) {
        let store: Arc<dyn SnapshotStore> = Arc::new(SqliteStore::new_in_memory().unwrap());
        let (tx, rx) = broadcast::channel(16);
        (Recorder::new(store, tx), rx)
    }

    #[test]
    fn test_empty_state_is_not_saved() {
        let (recorder, mut rx) = recorder();
        assert!(recorder.save(&GreenhouseState::new(), SCHEDULED).is_none());
        assert_eq!(recorder.store().count().unwrap(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_save_writes_and_notifies() {
        let (recorder, mut rx) = recorder();
        let mut state = GreenhouseState::new();
        state.temperature = Some(26.0);
        state.set_switch(Actuator::Pump, SwitchStatus::On);

        let stored = recorder.save(&state, "pump_control").unwrap();
        assert_eq!(stored.snapshot.temperature, 26.0);
        assert_eq!(stored.snapshot.soil_humidity, 0.0);
        assert_eq!(stored.snapshot.pump_status, SwitchStatus::On);
        assert_eq!(recorder.store().count().unwrap(), 1);

        match rx.try_recv().unwrap() {
            ServerMessage::DataSaved { message, .. } => {
                assert_eq!(message, "Data saved (pump_control)")
            }
            other => panic!("Expected DataSaved, got {:?}", other),
        }
    }

    fn scheduled_bridge() -> (Arc<GreenhouseBridge>, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::new_in_memory().unwrap());
        let bridge = Arc::new(GreenhouseBridge::new(
            Arc::new(MockBroker::new()),
            store.clone(),
        ));
        (bridge, store)
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_skips_first_tick_then_saves() {
        let (bridge, store) = scheduled_bridge();
        bridge
            .ingest(BrokerMessage {
                topic: "esp32/air/humidity".into(),
                payload: "58".into(),
            })
            .await;

        let task = tokio::spawn(run_schedule(bridge.clone(), Duration::from_secs(30)));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(store.count().unwrap(), 0);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.count().unwrap(), 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(store.count().unwrap(), 2);

        let latest = &store.history(1).unwrap()[0];
        assert_eq!(latest.snapshot.air_humidity, 58.0);
        task.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_without_readings_writes_nothing() {
        let (bridge, store) = scheduled_bridge();
        let mut events = bridge.subscribe();

        let task = tokio::spawn(run_schedule(bridge.clone(), Duration::from_secs(30)));
        tokio::time::sleep(Duration::from_secs(95)).await;

        assert_eq!(store.count().unwrap(), 0);
        assert!(events.try_recv().is_err());
        task.abort();
    }
}
