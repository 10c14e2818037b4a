pub mod connection_table;
pub mod http;
pub mod websocket;

use crate::protocol::{ConnectionId, ServerEvent};

/// Best-effort delivery of server events to a single connection.
///
/// `emit` never blocks and never waits for acknowledgment. It returns `false`
/// when no live connection has that id; callers treat that as a benign race,
/// not an error.
pub trait Transport: Send + Sync {
    fn emit(&self, to: &ConnectionId, event: ServerEvent) -> bool;
}
