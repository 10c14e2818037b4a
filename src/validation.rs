//! Input predicates for the signaling protocol.
//!
//! Everything here is pure: no registry access, no I/O.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const WALLET_ADDRESS_MIN_LEN: usize = 32;
pub const WALLET_ADDRESS_MAX_LEN: usize = 44;

/// Base58 alphabet membership: ASCII alphanumerics minus `0`, `I`, `O`, `l`.
fn is_base58_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() && !matches!(c, b'0' | b'I' | b'O' | b'l')
}

/// A wallet address is 32-44 base58 characters. Ownership is never checked.
pub fn is_valid_wallet_address(address: &str) -> bool {
    let bytes = address.as_bytes();
    (WALLET_ADDRESS_MIN_LEN..=WALLET_ADDRESS_MAX_LEN).contains(&bytes.len())
        && bytes.iter().copied().all(is_base58_char)
}

pub fn is_valid_connection_id(id: &str) -> bool {
    !id.is_empty()
}

/// `{signal: {..}, peer?: string}`. `signal` may be any object or array.
/// A falsy `peer` (`null`, `false`, `0`, `""`) counts as absent.
pub fn is_valid_signal_payload(data: &Value) -> bool {
    let Some(obj) = data.as_object() else {
        return false;
    };
    if !obj
        .get("signal")
        .is_some_and(|s| s.is_object() || s.is_array())
    {
        return false;
    }
    match obj.get("peer") {
        None | Some(Value::String(_)) => true,
        Some(peer) => is_falsy(peer),
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

/// The subset of a negotiation message that is forwarded to the peer.
///
/// Absent fields stay absent on the wire; an explicit `null` is kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SanitizedSignal {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<Value>,
    #[serde(
        rename = "usernameFragment",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub username_fragment: Option<Value>,
    #[serde(
        rename = "sdpMLineIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_m_line_index: Option<Value>,
    #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalPayload {
    pub signal: SanitizedSignal,
    pub peer: Option<String>,
}

/// Project a payload that passed [`is_valid_signal_payload`] onto the allow-list.
/// Fields outside the allow-list are dropped.
pub fn sanitize_signal_payload(data: &Value) -> SignalPayload {
    let field = |name: &str| data.get("signal").and_then(|s| s.get(name)).cloned();

    SignalPayload {
        signal: SanitizedSignal {
            kind: field("type"),
            sdp: field("sdp"),
            candidate: field("candidate"),
            username_fragment: field("usernameFragment"),
            sdp_m_line_index: field("sdpMLineIndex"),
            sdp_mid: field("sdpMid"),
        },
        peer: data
            .get("peer")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}
