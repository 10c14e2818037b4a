//! Wallet-address rendezvous and WebRTC signaling relay.
//!
//! Clients announce a wallet address with `ready`; the first waiting client
//! under a different wallet is paired with them, after which `signal`
//! payloads are sanitized and forwarded between the two until one side
//! disconnects.

pub mod config;
pub mod error;
pub mod hub;
pub mod lifecycle;
pub mod matching;
pub mod protocol;
pub mod registry;
pub mod relay;
pub mod shutdown;
pub mod transport;
pub mod validation;
