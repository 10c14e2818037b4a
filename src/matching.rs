//! Pairing of `ready` clients.
//!
//! Protocol roles: the client whose `ready` completes a match is the
//! initiator (sends the offer); the client that was already waiting answers.

use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::protocol::{ConnectionId, ServerEvent, INVALID_WALLET_ADDRESS};
use crate::registry::SessionRegistry;
use crate::transport::Transport;
use crate::validation::is_valid_wallet_address;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadyOutcome {
    InvalidAddress,
    /// Wallet (or this connection) already has a waiting entry.
    AlreadyWaiting,
    /// Connection is in a live pairing; a new match would break symmetry.
    AlreadyPaired,
    Queued,
    Matched { peer: ConnectionId },
}

pub fn on_ready(
    registry: &mut SessionRegistry,
    transport: &dyn Transport,
    connection_id: &ConnectionId,
    wallet_address: &str,
    now: Instant,
) -> ReadyOutcome {
    if !is_valid_wallet_address(wallet_address) {
        warn!(
            connection = %connection_id,
            "Rejected ready: invalid wallet address {:?}",
            wallet_address
        );
        transport.emit(connection_id, ServerEvent::error(INVALID_WALLET_ADDRESS));
        return ReadyOutcome::InvalidAddress;
    }

    if registry.is_wallet_waiting(wallet_address)
        || registry.waiting_entry_for(connection_id).is_some()
    {
        debug!("User {} already waiting", wallet_address);
        return ReadyOutcome::AlreadyWaiting;
    }

    if registry.is_paired(connection_id) {
        debug!(
            connection = %connection_id,
            "Ignoring ready from connection that is already paired"
        );
        return ReadyOutcome::AlreadyPaired;
    }

    // The requester holds no waiting entry here, so a match can never be itself.
    if let Some(waiting) = registry.first_match(wallet_address).cloned() {
        if !registry.pair(
            connection_id,
            wallet_address,
            &waiting.connection_id,
            &waiting.wallet_address,
        ) {
            // waiting and paired are exclusive, so this means the table is inconsistent
            error!(
                "Refused to pair {} with {}: one side is already paired",
                connection_id, waiting.connection_id
            );
            return ReadyOutcome::AlreadyPaired;
        }
        registry.remove_waiting_connection(&waiting.connection_id);

        info!(
            "🤝 Matched users: {} <-> {}",
            wallet_address, waiting.wallet_address
        );

        transport.emit(
            connection_id,
            ServerEvent::Matched {
                peer: waiting.connection_id.clone(),
                initiator: true,
            },
        );
        transport.emit(
            &waiting.connection_id,
            ServerEvent::Matched {
                peer: connection_id.clone(),
                initiator: false,
            },
        );
        return ReadyOutcome::Matched {
            peer: waiting.connection_id,
        };
    }

    registry.enqueue(wallet_address, connection_id, now);
    info!("⏳ Added to waiting list: {}", wallet_address);
    ReadyOutcome::Queued
}
