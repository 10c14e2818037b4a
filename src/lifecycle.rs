//! Disconnect cleanup and inactivity expiry of the waiting queue.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::hub::Hub;
use crate::protocol::{ConnectionId, ServerEvent};
use crate::registry::SessionRegistry;
use crate::transport::Transport;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisconnectOutcome {
    /// Peer of a pairing that was torn down, if any.
    pub former_peer: Option<ConnectionId>,
    pub left_waiting_queue: bool,
}

/// Tear down whatever state `connection_id` held. Both the pairing table and
/// the waiting queue are checked regardless of which one the connection was in.
pub fn on_disconnect(
    registry: &mut SessionRegistry,
    transport: &dyn Transport,
    connection_id: &ConnectionId,
) -> DisconnectOutcome {
    let mut outcome = DisconnectOutcome::default();

    if let Some(pairing) = registry.unpair(connection_id) {
        let peer = pairing.peer_connection_id;
        if !transport.emit(&peer, ServerEvent::PeerDisconnected) {
            debug!("Peer {} already gone, skipping peerDisconnected", peer);
        }
        info!(
            "👋 Pairing dissolved: {} ({}) left, notified {}",
            connection_id, pairing.wallet_address, peer
        );
        outcome.former_peer = Some(peer);
    }

    if let Some(entry) = registry.remove_waiting_connection(connection_id) {
        debug!("Removed {} from waiting list", entry.wallet_address);
        outcome.left_waiting_queue = true;
    }

    outcome
}

/// Remove waiting entries older than `max_inactive`. Returns how many were removed.
pub fn sweep_inactive(
    registry: &mut SessionRegistry,
    max_inactive: Duration,
    now: Instant,
) -> usize {
    let expired = registry.expire_waiting(max_inactive, now);
    for entry in &expired {
        debug!(
            connection = %entry.connection_id,
            "⌛ Expired waiting entry for {}",
            entry.wallet_address
        );
    }
    expired.len()
}

/// Run [`Hub::sweep_inactive`] every `cleanup_interval` until `shutdown` fires.
pub fn spawn_sweeper(
    hub: Arc<Hub>,
    cleanup_interval: Duration,
    max_inactive: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cleanup_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = hub.sweep_inactive(max_inactive);
                    let stats = hub.stats();
                    if removed > 0 {
                        info!(
                            removed,
                            waiting = stats.waiting,
                            pairs = stats.pairs,
                            "🧹 Swept inactive waiting entries"
                        );
                    } else {
                        debug!(waiting = stats.waiting, pairs = stats.pairs, "Sweep found nothing to expire");
                    }
                }
                _ = shutdown.cancelled() => {
                    debug!("🛑 Session sweeper shutting down");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::connection_table::ConnectionTable;

    #[test]
    fn test_disconnect_of_paired_side_notifies_peer_once() {
        let mut reg = SessionRegistry::new();
        let table = ConnectionTable::new();
        let a = ConnectionId::from("a");
        let b = ConnectionId::from("b");
        let mut b_rx = table.register(b.clone());
        reg.pair(&a, "walletA", &b, "walletB");

        let outcome = on_disconnect(&mut reg, &table, &a);

        assert_eq!(outcome.former_peer, Some(b.clone()));
        assert!(!outcome.left_waiting_queue);
        assert_eq!(b_rx.try_recv().unwrap(), ServerEvent::PeerDisconnected);
        assert!(b_rx.try_recv().is_err());
        assert!(!reg.is_paired(&a));
        assert!(!reg.is_paired(&b));

        // the surviving side disconnecting later has nothing to clean up
        assert_eq!(on_disconnect(&mut reg, &table, &b), DisconnectOutcome::default());
    }

    #[test]
    fn test_disconnect_of_waiting_connection() {
        let mut reg = SessionRegistry::new();
        let table = ConnectionTable::new();
        let a = ConnectionId::from("a");
        reg.enqueue("walletA", &a, Instant::now());

        let outcome = on_disconnect(&mut reg, &table, &a);

        assert_eq!(outcome.former_peer, None);
        assert!(outcome.left_waiting_queue);
        assert_eq!(reg.stats().waiting, 0);
    }

    #[test]
    fn test_disconnect_of_unknown_connection_is_harmless() {
        let mut reg = SessionRegistry::new();
        let table = ConnectionTable::new();
        reg.enqueue("walletA", &ConnectionId::from("a"), Instant::now());

        let outcome = on_disconnect(&mut reg, &table, &ConnectionId::from("z"));

        assert_eq!(outcome, DisconnectOutcome::default());
        assert_eq!(reg.stats().waiting, 1);
    }

    #[test]
    fn test_sweep_respects_threshold_and_spares_pairs() {
        let mut reg = SessionRegistry::new();
        let start = Instant::now();
        reg.enqueue("stale", &ConnectionId::from("s"), start);
        reg.enqueue("fresh", &ConnectionId::from("f"), start + Duration::from_millis(900));
        reg.pair(
            &ConnectionId::from("p1"),
            "walletP1",
            &ConnectionId::from("p2"),
            "walletP2",
        );

        let now = start + Duration::from_millis(1500);
        assert_eq!(sweep_inactive(&mut reg, Duration::from_millis(1000), now), 1);
        assert_eq!(reg.waiting_wallets(), vec!["fresh"]);
        assert_eq!(reg.stats().pairs, 1);

        // nothing else is old enough yet
        assert_eq!(sweep_inactive(&mut reg, Duration::from_millis(1000), now), 0);
    }

    #[tokio::test]
    async fn test_sweeper_task_stops_on_shutdown() {
        let hub = Arc::new(Hub::new(Arc::new(ConnectionTable::new())));
        let shutdown = CancellationToken::new();
        let handle = spawn_sweeper(
            hub,
            Duration::from_millis(10),
            Duration::from_secs(60),
            shutdown.clone(),
        );

        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper did not stop")
            .unwrap();
    }
}
