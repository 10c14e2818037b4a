//! Wire format of the signaling socket.
//!
//! Every WebSocket text frame is a JSON object `{"event": <name>, "data": <payload>}`.
//!
//!   Client → Server: {"event":"ready","data":{"walletAddress":"..."}}
//!   Client → Server: {"event":"signal","data":{"signal":{...},"peer":"..."}}
//!   Server → Client: {"event":"matched","data":{"peer":"...","initiator":true}}
//!   Server → Client: {"event":"signal","data":{"signal":{...}}}
//!   Server → Client: {"event":"peerDisconnected"}
//!   Server → Client: {"event":"error","data":{"message":"..."}}

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::validation::SanitizedSignal;

pub const INVALID_WALLET_ADDRESS: &str = "Invalid wallet address";
pub const READY_FAILED: &str = "Failed to process ready signal";

/// Transport-assigned identity of one live connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// 128 random bits, hex encoded.
    pub fn generate() -> Self {
        let bytes: [u8; 16] = rand::thread_rng().gen();
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ConnectionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Deserialize, Debug)]
struct RawFrame {
    event: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A missing or non-string address arrives as an empty string and fails validation.
    Ready { wallet_address: String },
    /// Raw payload; shape is checked by the relay.
    Signal(Value),
    Unknown(String),
}

pub fn parse_client_frame(text: &str) -> Result<ClientEvent, serde_json::Error> {
    let frame: RawFrame = serde_json::from_str(text)?;
    Ok(match frame.event.as_str() {
        "ready" => ClientEvent::Ready {
            wallet_address: frame
                .data
                .get("walletAddress")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        },
        "signal" => ClientEvent::Signal(frame.data),
        _ => ClientEvent::Unknown(frame.event),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    Matched { peer: ConnectionId, initiator: bool },
    Signal { signal: SanitizedSignal },
    PeerDisconnected,
    Error { message: String },
}

impl ServerEvent {
    pub fn error(message: &str) -> Self {
        ServerEvent::Error {
            message: message.to_string(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Matched { .. } => "matched",
            ServerEvent::Signal { .. } => "signal",
            ServerEvent::PeerDisconnected => "peerDisconnected",
            ServerEvent::Error { .. } => "error",
        }
    }
}
