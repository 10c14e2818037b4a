//! Forwarding of negotiation payloads between the two sides of a pairing.

use serde_json::Value;
use tracing::debug;

use crate::protocol::{ConnectionId, ServerEvent};
use crate::registry::SessionRegistry;
use crate::transport::Transport;
use crate::validation::{is_valid_connection_id, is_valid_signal_payload, sanitize_signal_payload};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalOutcome {
    /// Sender has no pairing (never matched, or the peer already left).
    NotPaired,
    InvalidPayload,
    Forwarded { to: ConnectionId },
    /// Pairing still recorded but the peer's socket is gone.
    PeerGone { to: ConnectionId },
}

pub fn on_signal(
    registry: &SessionRegistry,
    transport: &dyn Transport,
    connection_id: &ConnectionId,
    payload: &Value,
) -> SignalOutcome {
    let Some(pairing) = registry.pairing(connection_id) else {
        debug!(connection = %connection_id, "Dropping signal from unpaired connection");
        return SignalOutcome::NotPaired;
    };

    if !is_valid_signal_payload(payload) {
        debug!(connection = %connection_id, "Dropping malformed signal payload");
        return SignalOutcome::InvalidPayload;
    }

    let sanitized = sanitize_signal_payload(payload);
    let to = pairing.peer_connection_id.clone();

    // The client-supplied peer hint is informational; routing always follows the pairing.
    if let Some(hint) = sanitized.peer.as_deref() {
        if is_valid_connection_id(hint) && hint != to.as_str() {
            debug!(
                connection = %connection_id,
                "Signal addressed to {} but paired with {}",
                hint,
                to
            );
        }
    }

    if transport.emit(
        &to,
        ServerEvent::Signal {
            signal: sanitized.signal,
        },
    ) {
        debug!("Forwarding signal from {} to {}", connection_id, to);
        SignalOutcome::Forwarded { to }
    } else {
        debug!("Peer {} no longer connected, signal dropped", to);
        SignalOutcome::PeerGone { to }
    }
}
