//! WebSocket sessions for the signaling protocol.
//!
//! One task per connection. Each task owns its socket, is registered in the
//! `ConnectionTable` under a fresh `ConnectionId`, forwards inbound frames to
//! the `Hub`, and writes whatever the hub queued for it. When the task ends,
//! for any reason, the connection is unregistered and the hub runs disconnect
//! cleanup.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::connection_table::{ConnectionTable, EventReceiver};
use super::http::{build_router, AppState};
use crate::config::{CorsConfig, SocketConfig};
use crate::error::AppError;
use crate::hub::Hub;
use crate::protocol::{parse_client_frame, ConnectionId};

pub struct SignalingServer {
    listener: TcpListener,
    hub: Arc<Hub>,
    connections: Arc<ConnectionTable>,
    cors: CorsConfig,
    socket: SocketConfig,
}

impl SignalingServer {
    /// Bind the listening socket. Failing here is the one fatal startup error.
    pub async fn bind(
        addr: &str,
        hub: Arc<Hub>,
        connections: Arc<ConnectionTable>,
        cors: CorsConfig,
        socket: SocketConfig,
    ) -> Result<Self, AppError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| AppError::Bind {
                addr: addr.to_string(),
                source,
            })?;

        Ok(Self {
            listener,
            hub,
            connections,
            cors,
            socket,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, AppError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve HTTP and WebSocket traffic until `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), AppError> {
        let state = AppState {
            hub: self.hub,
            connections: self.connections,
            cors: Arc::new(self.cors),
            socket: self.socket,
            started_at: Instant::now(),
            shutdown: shutdown.clone(),
        };

        axum::serve(self.listener, build_router(state))
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("🛑 Signaling server shutting down");
        Ok(())
    }
}

/// Drive one upgraded socket from registration to cleanup.
pub async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = ConnectionId::generate();
    let outbound = state.connections.register(connection_id.clone());
    info!("🔗 User connected: {}", connection_id);

    if let Err(e) = run_session(socket, &connection_id, outbound, &state).await {
        debug!(connection = %connection_id, "Session ended with error: {}", e);
    }

    state.connections.unregister(&connection_id);
    state.hub.disconnect(&connection_id);
    info!("🔌 User disconnected: {}", connection_id);
}

async fn run_session(
    socket: WebSocket,
    connection_id: &ConnectionId,
    mut outbound: EventReceiver,
    state: &AppState,
) -> Result<(), AppError> {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let ping_interval = state.socket.ping_interval();
    let ping_timeout = state.socket.ping_timeout();
    let mut heartbeat =
        tokio::time::interval_at(tokio::time::Instant::now() + ping_interval, ping_interval);
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            // Incoming frame from client
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        last_seen = Instant::now();
                        match parse_client_frame(text.as_str()) {
                            Ok(event) => state.hub.dispatch(connection_id, event),
                            Err(e) => {
                                debug!(connection = %connection_id, "Undecodable frame: {}", e);
                            }
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        last_seen = Instant::now();
                        debug!(connection = %connection_id, "Ignoring {} byte binary frame", data.len());
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {
                        // pings are answered by the protocol layer
                        last_seen = Instant::now();
                    }
                    Some(Err(e)) => {
                        // includes frames over socket.max_message_bytes
                        warn!(connection = %connection_id, "WebSocket receive error: {}", e);
                        break;
                    }
                }
            }

            // Outgoing event queued by the hub
            Some(event) = outbound.recv() => {
                debug!(connection = %connection_id, "→ {}", event.name());
                let json = serde_json::to_string(&event)?;
                ws_sender.send(Message::Text(json.into())).await?;
            }

            // Heartbeat ping + idle check
            _ = heartbeat.tick() => {
                if last_seen.elapsed() > ping_timeout {
                    info!(connection = %connection_id, "⏱️  No traffic for {:?}, closing", ping_timeout);
                    break;
                }
                if ws_sender.send(Message::Ping(Default::default())).await.is_err() {
                    break;
                }
            }

            _ = state.shutdown.cancelled() => {
                let _ = ws_sender.send(Message::Close(None)).await;
                break;
            }
        }
    }

    Ok(())
}
