// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HTTP request handlers for the REST API and WebSocket upgrade.

use crate::server::{AppState, ClientSlot};
use crate::session::ClientSession;
use crate::state::{InvalidStatus, SwitchStatus};
use crate::topics::Actuator;
use axum::{
    body::Bytes,
    extract::{ws::WebSocket, Path, Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

/// History page size when `limit` is missing or unusable
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub success: bool,
    pub error: String,
    #[serde(skip)]
    pub status: StatusCode,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            status,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// GET /api/sensors/current
pub async fn current(State(state): State<Arc<AppState>>) -> Response {
    let data = state.bridge.current_state().await;
    Json(serde_json::json!({ "success": true, "data": data })).into_response()
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    limit: Option<String>,
}

/// Parse `?limit=`; missing, non-numeric and zero all mean the default
pub fn history_limit(raw: Option<&str>) -> usize {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
}

/// GET /api/sensors/history
pub async fn history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> Result<Response, ApiError> {
    let limit = history_limit(params.limit.as_deref());

    let rows = state.bridge.history(limit).map_err(|e| {
        error!("Error fetching history: {}", e);
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    Ok(Json(serde_json::json!({ "success": true, "data": rows })).into_response())
}

/// Extract and validate `{"status": "0" | "1"}`
fn parse_status(body: &[u8]) -> Result<SwitchStatus, InvalidStatus> {
    let value: serde_json::Value = serde_json::from_slice(body).map_err(|_| InvalidStatus)?;
    value
        .get("status")
        .and_then(|s| s.as_str())
        .ok_or(InvalidStatus)?
        .parse()
}

/// POST /api/control/:device
pub async fn control(
    State(state): State<Arc<AppState>>,
    Path(device): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let actuator = device
        .parse::<Actuator>()
        .map_err(|e| ApiError::new(StatusCode::NOT_FOUND, e.to_string()))?;

    let status = parse_status(&body)
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.to_string()))?;

    state.bridge.control(actuator, status).await.map_err(|e| {
        warn!("Publish to '{}' failed: {}", actuator.topic(), e);
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": format!("{} turned {}", actuator.label(), status.word()),
    }))
    .into_response())
}

/// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> Response {
    Json(serde_json::json!({
        "success": true,
        "message": "Server is running",
        "mqttConnected": state.bridge.broker_connected(),
        "clients": state.client_count(),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now(),
    }))
    .into_response()
}

/// GET /ws - WebSocket upgrade
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let Some(slot) = state.try_reserve_client() else {
        warn!("Connection rejected: max clients reached");
        return (StatusCode::SERVICE_UNAVAILABLE, "Too many connections").into_response();
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, slot))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, slot: ClientSlot) {
    let session = ClientSession::new(state.bridge.clone());
    let session_id = session.id().to_string();

    if let Err(e) = session.run(socket).await {
        error!("[{}] Session error: {}", session_id, e);
    }

    drop(slot);
    info!("Client disconnected. Total: {}", state.client_count());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_limit() {
        assert_eq!(history_limit(None), 50);
        assert_eq!(history_limit(Some("10")), 10);
        assert_eq!(history_limit(Some("0")), 50);
        assert_eq!(history_limit(Some("ten")), 50);
        assert_eq!(history_limit(Some("-3")), 50);
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status(br#"{"status":"1"}"#), Ok(SwitchStatus::On));
        assert_eq!(parse_status(br#"{"status":"0"}"#), Ok(SwitchStatus::Off));
        assert_eq!(parse_status(br#"{"status":1}"#), Err(InvalidStatus));
        assert_eq!(parse_status(br#"{"status":"2"}"#), Err(InvalidStatus));
        assert_eq!(parse_status(b"{}"), Err(InvalidStatus));
        assert_eq!(parse_status(b""), Err(InvalidStatus));
    }

    #[test]
    fn test_api_error_body() {
        let err = ApiError::new(StatusCode::BAD_REQUEST, "nope");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json, serde_json::json!({"success": false, "error": "nope"}));
    }
}
