//! HTTP surface of the listening port.
//!
//! The signaling socket and the health check share one port:
//!
//!   GET /         → WebSocket upgrade (403 if the Origin is not allowed)
//!   GET /health   → 200 {"status":"healthy","timestamp":"...","uptime":12.3}
//!   anything else → 404
//!
//! CORS headers and preflight answers come from the `cors.allow_origins` list.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

use super::connection_table::ConnectionTable;
use super::websocket;
use crate::config::{CorsConfig, SocketConfig};
use crate::hub::Hub;

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<Hub>,
    pub connections: Arc<ConnectionTable>,
    pub cors: Arc<CorsConfig>,
    pub socket: SocketConfig,
    pub started_at: Instant,
    pub shutdown: CancellationToken,
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.cors);
    Router::new()
        .route("/", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(cors)
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let allow_origin = if config.allows_any_origin() {
        AllowOrigin::any()
    } else {
        let config = config.clone();
        AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            config.is_origin_allowed(Some(origin.to_str().unwrap_or_default()))
        })
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::OPTIONS])
}

#[derive(Serialize, Debug)]
pub struct HealthStatus {
    pub status: &'static str,
    pub timestamp: String,
    /// Seconds since the process started serving.
    pub uptime: f64,
}

pub fn health_status(started_at: Instant) -> HealthStatus {
    HealthStatus {
        status: "healthy",
        timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        uptime: started_at.elapsed().as_secs_f64(),
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(health_status(state.started_at))
}

/// GET / with `Upgrade: websocket`
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Response {
    // an Origin that is not valid UTF-8 only passes a wildcard list
    let origin = headers
        .get(header::ORIGIN)
        .map(|v| v.to_str().unwrap_or_default());
    if !state.cors.is_origin_allowed(origin) {
        warn!("Rejected WebSocket: origin {:?} not allowed", origin);
        return (
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({"error": "Origin not allowed"})),
        )
            .into_response();
    }

    let limit = state.socket.max_message_bytes;
    ws.max_message_size(limit)
        .max_frame_size(limit)
        .on_upgrade(move |socket| websocket::handle_socket(socket, state))
}
