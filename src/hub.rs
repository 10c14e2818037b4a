//! Serialization point between connection tasks and the session registry.
//!
//! Every event handler and the sweeper go through the one mutex here, so the
//! check-then-act sequences in matching, relay and lifecycle never interleave.
//! Emits happen while the lock is held; they only push onto unbounded queues,
//! which keeps per-connection event order identical to state-transition order.

use parking_lot::Mutex;
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error};

use crate::lifecycle::{self, DisconnectOutcome};
use crate::matching::{self, ReadyOutcome};
use crate::protocol::{ClientEvent, ConnectionId, ServerEvent, READY_FAILED};
use crate::registry::{RegistryStats, SessionRegistry};
use crate::relay::{self, SignalOutcome};
use crate::transport::Transport;

pub struct Hub {
    registry: Mutex<SessionRegistry>,
    transport: Arc<dyn Transport>,
}

impl Hub {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            registry: Mutex::new(SessionRegistry::new()),
            transport,
        }
    }

    pub fn on_ready(&self, connection_id: &ConnectionId, wallet_address: &str) -> ReadyOutcome {
        self.on_ready_at(connection_id, wallet_address, Instant::now())
    }

    pub fn on_ready_at(
        &self,
        connection_id: &ConnectionId,
        wallet_address: &str,
        now: Instant,
    ) -> ReadyOutcome {
        let mut registry = self.registry.lock();
        matching::on_ready(
            &mut registry,
            self.transport.as_ref(),
            connection_id,
            wallet_address,
            now,
        )
    }

    pub fn on_signal(&self, connection_id: &ConnectionId, payload: &Value) -> SignalOutcome {
        let registry = self.registry.lock();
        relay::on_signal(&registry, self.transport.as_ref(), connection_id, payload)
    }

    pub fn on_disconnect(&self, connection_id: &ConnectionId) -> DisconnectOutcome {
        let mut registry = self.registry.lock();
        lifecycle::on_disconnect(&mut registry, self.transport.as_ref(), connection_id)
    }

    pub fn sweep_inactive(&self, max_inactive: Duration) -> usize {
        self.sweep_inactive_at(max_inactive, Instant::now())
    }

    pub fn sweep_inactive_at(&self, max_inactive: Duration, now: Instant) -> usize {
        let mut registry = self.registry.lock();
        lifecycle::sweep_inactive(&mut registry, max_inactive, now)
    }

    pub fn stats(&self) -> RegistryStats {
        self.registry.lock().stats()
    }

    /// Read-only view of the registry under the lock.
    pub fn inspect<R>(&self, f: impl FnOnce(&SessionRegistry) -> R) -> R {
        f(&self.registry.lock())
    }

    /// Handler boundary for one inbound event. A panic inside a handler is
    /// logged and, for `ready`, reported to the sender as a generic error; it
    /// never takes down the connection task or leaves the lock held.
    pub fn dispatch(&self, connection_id: &ConnectionId, event: ClientEvent) {
        match event {
            ClientEvent::Ready { wallet_address } => {
                let handled = guarded("ready", connection_id, || {
                    self.on_ready(connection_id, &wallet_address)
                });
                if handled.is_none() {
                    guarded("ready error report", connection_id, || {
                        self.transport
                            .emit(connection_id, ServerEvent::error(READY_FAILED))
                    });
                }
            }
            ClientEvent::Signal(payload) => {
                guarded("signal", connection_id, || {
                    self.on_signal(connection_id, &payload)
                });
            }
            ClientEvent::Unknown(name) => {
                debug!(connection = %connection_id, "Unknown event: {}", name);
            }
        }
    }

    /// Disconnect cleanup behind the same boundary as [`Hub::dispatch`].
    pub fn disconnect(&self, connection_id: &ConnectionId) -> Option<DisconnectOutcome> {
        guarded("disconnect", connection_id, || self.on_disconnect(connection_id))
    }
}

fn guarded<T>(handler: &str, connection_id: &ConnectionId, f: impl FnOnce() -> T) -> Option<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!(
                connection = %connection_id,
                handler,
                "❌ Error in {} handler: {}",
                handler,
                reason
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::connection_table::ConnectionTable;
    use serde_json::json;

    const ALICE: &str = "7EcDhSYGxXyscszYEp35KHN8vvw3svAuLKTzXwCFLtV";
    const BOB: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";

    /// Delivers like a `ConnectionTable` but panics on `matched` events.
    struct FaultyTransport {
        inner: ConnectionTable,
    }

    impl Transport for FaultyTransport {
        fn emit(&self, to: &ConnectionId, event: ServerEvent) -> bool {
            if matches!(event, ServerEvent::Matched { .. }) {
                panic!("emit failed for {}", to);
            }
            self.inner.emit(to, event)
        }
    }

    #[test]
    fn test_dispatch_routes_events() {
        let table = Arc::new(ConnectionTable::new());
        let hub = Hub::new(table.clone());
        let a = ConnectionId::from("a");
        let b = ConnectionId::from("b");
        let mut a_rx = table.register(a.clone());
        let mut b_rx = table.register(b.clone());

        hub.dispatch(
            &a,
            ClientEvent::Ready {
                wallet_address: ALICE.to_string(),
            },
        );
        hub.dispatch(
            &b,
            ClientEvent::Ready {
                wallet_address: BOB.to_string(),
            },
        );
        hub.dispatch(&a, ClientEvent::Signal(json!({"signal": {"type": "answer"}})));
        hub.dispatch(&a, ClientEvent::Unknown("noise".to_string()));

        assert!(matches!(
            a_rx.try_recv().unwrap(),
            ServerEvent::Matched {
                initiator: false,
                ..
            }
        ));
        assert!(matches!(
            b_rx.try_recv().unwrap(),
            ServerEvent::Matched {
                initiator: true,
                ..
            }
        ));
        assert!(matches!(b_rx.try_recv().unwrap(), ServerEvent::Signal { .. }));
        assert!(a_rx.try_recv().is_err());
        assert_eq!(hub.stats(), RegistryStats { waiting: 0, pairs: 1 });
    }

    #[test]
    fn test_handler_panic_reports_generic_error_and_keeps_hub_usable() {
        let transport = Arc::new(FaultyTransport {
            inner: ConnectionTable::new(),
        });
        let hub = Hub::new(transport.clone());
        let a = ConnectionId::from("a");
        let b = ConnectionId::from("b");
        let _a_rx = transport.inner.register(a.clone());
        let mut b_rx = transport.inner.register(b.clone());

        hub.dispatch(
            &a,
            ClientEvent::Ready {
                wallet_address: ALICE.to_string(),
            },
        );
        hub.dispatch(
            &b,
            ClientEvent::Ready {
                wallet_address: BOB.to_string(),
            },
        );

        assert_eq!(
            b_rx.try_recv().unwrap(),
            ServerEvent::error("Failed to process ready signal")
        );

        // lock released and the table still symmetric
        hub.inspect(|reg| {
            let a_side = reg.pairing(&a).unwrap();
            let b_side = reg.pairing(&b).unwrap();
            assert_eq!(a_side.peer_connection_id, b);
            assert_eq!(b_side.peer_connection_id, a);
        });
        assert_eq!(hub.disconnect(&a).unwrap().former_peer, Some(b.clone()));
        assert_eq!(b_rx.try_recv().unwrap(), ServerEvent::PeerDisconnected);
    }

    #[test]
    fn test_sweep_through_hub() {
        let hub = Hub::new(Arc::new(ConnectionTable::new()));
        let start = Instant::now();
        hub.on_ready_at(&ConnectionId::from("a"), ALICE, start);

        assert_eq!(
            hub.sweep_inactive_at(Duration::from_secs(10), start + Duration::from_secs(5)),
            0
        );
        assert_eq!(
            hub.sweep_inactive_at(Duration::from_secs(10), start + Duration::from_secs(11)),
            1
        );
        assert_eq!(hub.stats().waiting, 0);
    }
}
