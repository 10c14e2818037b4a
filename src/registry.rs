//! Waiting queue and pairing table.
//!
//! `SessionRegistry` is plain data with no locking of its own. The `Hub`
//! wraps it in a single mutex, so each read-decide-mutate sequence below runs
//! as one step relative to every other event and to the sweeper.
//!
//! Every mutation either completes or leaves the registry untouched.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use crate::protocol::ConnectionId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitingEntry {
    pub wallet_address: String,
    pub connection_id: ConnectionId,
    pub enqueued_at: Instant,
}

/// One direction of a pairing. `wallet_address` is the owning side's own address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairedConnection {
    pub peer_connection_id: ConnectionId,
    pub wallet_address: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub waiting: usize,
    pub pairs: usize,
}

#[derive(Debug, Default)]
pub struct SessionRegistry {
    /// Oldest first. At most one entry per wallet address and per connection.
    waiting: VecDeque<WaitingEntry>,
    /// Symmetric: A -> B implies B -> A.
    paired: HashMap<ConnectionId, PairedConnection>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_wallet_waiting(&self, wallet_address: &str) -> bool {
        self.waiting
            .iter()
            .any(|e| e.wallet_address == wallet_address)
    }

    pub fn waiting_entry_for(&self, connection_id: &ConnectionId) -> Option<&WaitingEntry> {
        self.waiting
            .iter()
            .find(|e| &e.connection_id == connection_id)
    }

    pub fn is_paired(&self, connection_id: &ConnectionId) -> bool {
        self.paired.contains_key(connection_id)
    }

    pub fn pairing(&self, connection_id: &ConnectionId) -> Option<&PairedConnection> {
        self.paired.get(connection_id)
    }

    /// Append to the back of the queue. Refused (returns false) if the wallet
    /// or the connection already has an entry.
    pub fn enqueue(
        &mut self,
        wallet_address: &str,
        connection_id: &ConnectionId,
        now: Instant,
    ) -> bool {
        if self.is_wallet_waiting(wallet_address) || self.waiting_entry_for(connection_id).is_some()
        {
            return false;
        }
        self.waiting.push_back(WaitingEntry {
            wallet_address: wallet_address.to_string(),
            connection_id: connection_id.clone(),
            enqueued_at: now,
        });
        true
    }

    /// Oldest entry whose wallet differs from `wallet_address`.
    pub fn first_match(&self, wallet_address: &str) -> Option<&WaitingEntry> {
        self.waiting
            .iter()
            .find(|e| e.wallet_address != wallet_address)
    }

    /// Record both directions of a pairing. Refused if either side is already paired
    /// or if both ids are the same connection.
    pub fn pair(
        &mut self,
        a: &ConnectionId,
        a_wallet: &str,
        b: &ConnectionId,
        b_wallet: &str,
    ) -> bool {
        if a == b || self.is_paired(a) || self.is_paired(b) {
            return false;
        }
        self.paired.insert(
            a.clone(),
            PairedConnection {
                peer_connection_id: b.clone(),
                wallet_address: a_wallet.to_string(),
            },
        );
        self.paired.insert(
            b.clone(),
            PairedConnection {
                peer_connection_id: a.clone(),
                wallet_address: b_wallet.to_string(),
            },
        );
        true
    }

    /// Remove both directions of the pairing `connection_id` belongs to.
    /// Returns that side's entry (whose `peer_connection_id` is the other side).
    pub fn unpair(&mut self, connection_id: &ConnectionId) -> Option<PairedConnection> {
        let entry = self.paired.remove(connection_id)?;
        // only drop the reverse entry if it still points back at us
        if self
            .paired
            .get(&entry.peer_connection_id)
            .is_some_and(|rev| &rev.peer_connection_id == connection_id)
        {
            self.paired.remove(&entry.peer_connection_id);
        }
        Some(entry)
    }

    pub fn remove_waiting_connection(
        &mut self,
        connection_id: &ConnectionId,
    ) -> Option<WaitingEntry> {
        let index = self
            .waiting
            .iter()
            .position(|e| &e.connection_id == connection_id)?;
        self.waiting.remove(index)
    }

    /// Drop waiting entries enqueued more than `max_inactive` before `now`.
    /// Pairings are never touched.
    pub fn expire_waiting(&mut self, max_inactive: Duration, now: Instant) -> Vec<WaitingEntry> {
        let Some(cutoff) = now.checked_sub(max_inactive) else {
            return Vec::new();
        };
        let mut expired = Vec::new();
        self.waiting.retain(|e| {
            if e.enqueued_at < cutoff {
                expired.push(e.clone());
                false
            } else {
                true
            }
        });
        expired
    }

    /// Wallet addresses in queue order.
    pub fn waiting_wallets(&self) -> Vec<&str> {
        self.waiting
            .iter()
            .map(|e| e.wallet_address.as_str())
            .collect()
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            waiting: self.waiting.len(),
            pairs: self.paired.len() / 2,
        }
    }
}
