// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! WebSocket client session management.
//!
//! Each connected dashboard gets a session that:
//! - sends the full record on connect
//! - forwards every broadcast event
//! - answers ping / get_state requests

use crate::bridge::GreenhouseBridge;
use crate::protocol::{ClientMessage, ErrorCode, ServerMessage};
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// A WebSocket client session
pub struct ClientSession {
    bridge: Arc<GreenhouseBridge>,
    /// Session ID for logging
    session_id: String,
}

impl ClientSession {
    pub fn new(bridge: Arc<GreenhouseBridge>) -> Self {
        let session_id = Uuid::new_v4().to_string()[..8].to_string();
        info!("[{}] Client connected", session_id);

        Self { bridge, session_id }
    }

    pub fn id(&self) -> &str {
        &self.session_id
    }

    /// Run the session, handling messages until disconnect
    pub async fn run(self, socket: WebSocket) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let (mut ws_tx, mut ws_rx) = socket.split();

        // Subscribe before reading the record so no update falls in between
        let events = self.bridge.subscribe();

        let initial = ServerMessage::initial_data(self.bridge.current_state().await);
        ws_tx
            .send(Message::Text(serde_json::to_string(&initial)?))
            .await?;

        // Channel for sending messages to WebSocket
        let (tx, mut rx) = mpsc::channel::<ServerMessage>(256);

        let session_id = self.session_id.clone();
        let ws_forward = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                match serde_json::to_string(&msg) {
                    Ok(json) => {
                        if ws_tx.send(Message::Text(json)).await.is_err() {
                            debug!("[{}] WebSocket send failed, closing", session_id);
                            break;
                        }
                    }
                    Err(e) => {
                        error!("[{}] Failed to serialize message: {}", session_id, e);
                    }
                }
            }
        });

        let event_forward = tokio::spawn(forward_events(
            self.session_id.clone(),
            events,
            tx.clone(),
        ));

        while let Some(msg) = ws_rx.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    if let Err(e) = self.handle_message(&text, &tx).await {
                        warn!("[{}] Error handling message: {}", self.session_id, e);
                        break;
                    }
                }
                Ok(Message::Close(_)) => {
                    info!("[{}] Client closed connection", self.session_id);
                    break;
                }
                Ok(Message::Ping(_)) => {
                    // Axum handles pong automatically
                }
                Ok(Message::Pong(_)) => {
                    debug!("[{}] Pong received", self.session_id);
                }
                Ok(Message::Binary(_)) => {
                    warn!("[{}] Binary messages not supported", self.session_id);
                    let _ = tx
                        .send(ServerMessage::error(
                            ErrorCode::Unsupported,
                            "Binary messages not supported",
                        ))
                        .await;
                }
                Err(e) => {
                    error!("[{}] WebSocket error: {}", self.session_id, e);
                    break;
                }
            }
        }

        event_forward.abort();
        ws_forward.abort();
        info!("[{}] Client disconnected", self.session_id);

        Ok(())
    }

    /// Handle a single client message
    async fn handle_message(
        &self,
        text: &str,
        tx: &mpsc::Sender<ServerMessage>,
    ) -> Result<(), mpsc::error::SendError<ServerMessage>> {
        let msg: ClientMessage = match serde_json::from_str(text) {
            Ok(m) => m,
            Err(e) => {
                let error =
                    ServerMessage::error(ErrorCode::InvalidMessage, format!("Invalid JSON: {}", e));
                return tx.send(error).await;
            }
        };

        debug!("[{}] Received: {:?}", self.session_id, msg);

        match msg {
            ClientMessage::Ping { id } => tx.send(ServerMessage::Pong { id }).await,
            ClientMessage::GetState => {
                let state = self.bridge.current_state().await;
                tx.send(ServerMessage::initial_data(state)).await
            }
        }
    }
}

/// Copy broadcast events into the session's outbound queue
async fn forward_events(
    session_id: String,
    mut events: broadcast::Receiver<ServerMessage>,
    tx: mpsc::Sender<ServerMessage>,
) {
    loop {
        match events.recv().await {
            Ok(msg) => {
                if tx.send(msg).await.is_err() {
                    debug!("[{}] Client gone, stopping event forwarding", session_id);
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("[{}] Lagged {} events", session_id, n);
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("[{}] Event channel closed", session_id);
                break;
            }
        }
    }
}
