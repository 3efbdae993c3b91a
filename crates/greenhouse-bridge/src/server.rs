// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HTTP / WebSocket server assembly.

use crate::bridge::GreenhouseBridge;
use crate::config::ServerConfig;
use crate::routes;
use axum::Router;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application state
pub struct AppState {
    pub bridge: Arc<GreenhouseBridge>,
    pub config: ServerConfig,
    client_slots: Arc<Semaphore>,
    capacity: usize,
}

/// A reserved WebSocket slot, released on drop
pub struct ClientSlot {
    _permit: OwnedSemaphorePermit,
}

impl AppState {
    pub fn new(bridge: Arc<GreenhouseBridge>, config: ServerConfig) -> Self {
        let capacity = config.max_clients.min(Semaphore::MAX_PERMITS);
        Self {
            bridge,
            config,
            client_slots: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Reserve a client slot, or `None` when `max_clients` are connected
    pub fn try_reserve_client(&self) -> Option<ClientSlot> {
        let permit = self.client_slots.clone().try_acquire_owned().ok()?;
        info!("Client connected. Total: {}", self.client_count());
        Some(ClientSlot { _permit: permit })
    }

    pub fn client_count(&self) -> usize {
        self.capacity - self.client_slots.available_permits()
    }
}

/// Build the full router: REST API, WebSocket endpoint and (optionally) the dashboard
pub fn build_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new().merge(routes::api_routes());

    if !state.config.api_only {
        router = router.merge(routes::ui_routes());
    }

    router
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
