// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MQTT broker link.
//!
//! The [`Broker`] trait abstracts command publishing so the bridge can run
//! against a real broker ([`MqttBroker`]) or an in-process fake
//! ([`MockBroker`]).
//!
//! ```text
//! MqttEventLoop --(BrokerMessage)--> mpsc --> Bridge::ingest
//! Bridge::control --> Broker::publish --> AsyncClient
//! ```

use crate::config::MqttConfig;
use crate::topics::Sensor;
use rumqttc::{AsyncClient, ClientError, Event, EventLoop, MqttOptions, Packet, QoS, Transport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Pause before polling again after a connection error
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Capacity of the client request queue
const REQUEST_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("MQTT client error: {0}")]
    Client(#[from] ClientError),

    #[error("Publish rejected: {0}")]
    Rejected(String),
}

/// A message received on a subscribed topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub topic: String,
    pub payload: String,
}

/// Command side of the broker link
pub trait Broker: Send + Sync {
    /// Queue `payload` for publication on `topic`
    fn publish(&self, topic: &str, payload: &str) -> Result<(), BrokerError>;

    /// Whether the last connection attempt succeeded
    fn is_connected(&self) -> bool;
}

/// rumqttc-backed broker
pub struct MqttBroker {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
}

/// Event loop half of [`MqttBroker`]; must be driven by [`MqttEventLoop::run`]
pub struct MqttEventLoop {
    eventloop: EventLoop,
    client: AsyncClient,
    connected: Arc<AtomicBool>,
}

impl MqttBroker {
    /// Build the client. No network I/O happens until the event loop runs.
    pub fn new(config: &MqttConfig) -> (Self, MqttEventLoop) {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            options.set_credentials(user, pass);
        }

        if config.tls {
            options.set_transport(Transport::tls_with_default_config());
        }

        info!(
            "MQTT broker {}://{}:{} (client id '{}')",
            if config.tls { "mqtts" } else { "mqtt" },
            config.host,
            config.port,
            config.client_id
        );

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));

        (
            Self {
                client: client.clone(),
                connected: connected.clone(),
            },
            MqttEventLoop {
                eventloop,
                client,
                connected,
            },
        )
    }
}

impl Broker for MqttBroker {
    fn publish(&self, topic: &str, payload: &str) -> Result<(), BrokerError> {
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())?;
        debug!("Queued publish to '{}': {}", topic, payload);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

impl MqttEventLoop {
    /// Drive the connection, forwarding sensor messages to `sink`.
    ///
    /// Returns when `sink` is closed.
    pub async fn run(mut self, sink: mpsc::Sender<BrokerMessage>) {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    self.connected.store(true, Ordering::Relaxed);
                    info!("Connected to MQTT broker");
                    self.subscribe_sensors();
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let message = BrokerMessage {
                        topic: publish.topic,
                        payload: String::from_utf8_lossy(&publish.payload).into_owned(),
                    };
                    if sink.send(message).await.is_err() {
                        debug!("Broker message sink closed, stopping event loop");
                        break;
                    }
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    self.connected.store(false, Ordering::Relaxed);
                    warn!("Broker sent disconnect");
                }
                Ok(_) => {}
                Err(e) => {
                    self.connected.store(false, Ordering::Relaxed);
                    error!("MQTT error: {}", e);
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }

    // Subscriptions do not survive a clean-session reconnect, so this runs on every ConnAck.
    fn subscribe_sensors(&self) {
        for sensor in Sensor::ALL {
            match self.client.try_subscribe(sensor.topic(), QoS::AtMostOnce) {
                Ok(()) => info!("Subscribed to: {}", sensor.topic()),
                Err(e) => error!("Subscribe to '{}' failed: {}", sensor.topic(), e),
            }
        }
    }
}

/// In-process broker for tests and `--mock` runs
#[derive(Default)]
pub struct MockBroker {
    published: Mutex<Vec<BrokerMessage>>,
    fail_publish: AtomicBool,
    connected: AtomicBool,
}

impl MockBroker {
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            ..Default::default()
        }
    }

    /// Make every subsequent publish fail
    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::Relaxed);
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    /// Messages published so far
    pub fn published(&self) -> Vec<BrokerMessage> {
        self.published
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

impl Broker for MockBroker {
    fn publish(&self, topic: &str, payload: &str) -> Result<(), BrokerError> {
        if self.fail_publish.load(Ordering::Relaxed) {
            return Err(BrokerError::Rejected("mock broker refused publish".into()));
        }
        let mut published = self
            .published
            .lock()
            .map_err(|_| BrokerError::Rejected("lock poisoned".into()))?;
        published.push(BrokerMessage {
            topic: topic.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}
