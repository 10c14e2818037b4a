use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

use super::Transport;
use crate::protocol::{ConnectionId, ServerEvent};

pub type EventReceiver = mpsc::UnboundedReceiver<ServerEvent>;

/// Live connections and the outbound queue of each.
///
/// The socket task owning a connection drains its receiver and writes frames
/// in order, so events queued for one connection arrive in queue order.
pub struct ConnectionTable {
    connections: DashMap<ConnectionId, mpsc::UnboundedSender<ServerEvent>>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Register a connection and hand back the receiving end of its queue.
    pub fn register(&self, connection_id: ConnectionId) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        debug!("✅ Registered connection {}", connection_id);
        self.connections.insert(connection_id, tx);
        rx
    }

    pub fn unregister(&self, connection_id: &ConnectionId) {
        if self.connections.remove(connection_id).is_some() {
            debug!("🔌 Unregistered connection {}", connection_id);
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl Default for ConnectionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for ConnectionTable {
    fn emit(&self, to: &ConnectionId, event: ServerEvent) -> bool {
        match self.connections.get(to) {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }
}
