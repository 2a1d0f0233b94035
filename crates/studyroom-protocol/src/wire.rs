//! Wire formats.
//!
//! Replication messages are UTF-8 JSON text records, one object per message,
//! handed to the room transport as opaque bytes.
//!
//! Relay frames on a QUIC stream are:
//!   [4 bytes big-endian length][JSON payload]

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use studyroom_types::{Domain, Message};
use tracing::{debug, warn};

use crate::error::ProtocolError;

/// Largest replication record accepted from a peer.
pub const MAX_RECORD_SIZE: usize = 64 * 1024;

/// Maximum relay frame size (1 MiB). Prevents allocation bombs.
pub const MAX_FRAME_SIZE: u32 = 1024 * 1024;

/// The tag fields every record must carry, read before the full decode so an
/// unknown verb can be told apart from a broken record.
#[derive(Deserialize)]
struct Envelope {
    domain: String,
    action: String,
}

/// Encode a replication message as a UTF-8 JSON record.
pub fn encode_message(msg: &Message) -> Result<Vec<u8>, ProtocolError> {
    serde_json::to_vec(msg).map_err(|e| ProtocolError::Serialization(e.to_string()))
}

/// Decode and validate a replication record.
///
/// Fails with [`ProtocolError::UnknownAction`] for a well-formed record whose
/// domain or action this build does not know, and with
/// [`ProtocolError::Malformed`] for everything else that cannot be trusted.
pub fn decode_message(payload: &[u8]) -> Result<Message, ProtocolError> {
    if payload.len() > MAX_RECORD_SIZE {
        return Err(ProtocolError::Malformed(format!(
            "record size {} exceeds maximum {MAX_RECORD_SIZE}",
            payload.len()
        )));
    }

    let text = std::str::from_utf8(payload)
        .map_err(|e| ProtocolError::Malformed(format!("record is not UTF-8: {e}")))?;

    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

    let known = Domain::from_tag(&envelope.domain)
        .is_some_and(|domain| domain.verbs().contains(&envelope.action.as_str()));
    if !known {
        return Err(ProtocolError::UnknownAction {
            domain: envelope.domain,
            action: envelope.action,
        });
    }

    let msg: Message =
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    msg.validate()
        .map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    Ok(msg)
}

/// Decode an inbound record, dropping anything that fails.
///
/// This is the codec boundary: nothing malformed gets past it, and nothing
/// that fails here is surfaced beyond the log.
pub fn decode_inbound(payload: &[u8]) -> Option<Message> {
    match decode_message(payload) {
        Ok(msg) => Some(msg),
        Err(ProtocolError::UnknownAction { domain, action }) => {
            debug!(%domain, %action, "ignoring unknown action");
            None
        }
        Err(e) => {
            warn!(error = %e, len = payload.len(), "dropping malformed record");
            None
        }
    }
}

/// Encode a relay frame to a length-prefixed byte vector.
pub fn encode_frame<T: Serialize>(frame: &T) -> Result<Vec<u8>, ProtocolError> {
    let payload =
        serde_json::to_vec(frame).map_err(|e| ProtocolError::Serialization(e.to_string()))?;

    let len = u32::try_from(payload.len())
        .map_err(|_| ProtocolError::Serialization("frame too large".to_string()))?;
    if len > MAX_FRAME_SIZE {
        return Err(ProtocolError::Serialization(format!(
            "frame size {len} exceeds maximum {MAX_FRAME_SIZE}"
        )));
    }

    let mut buf = Vec::with_capacity(4 + payload.len());
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

/// Decode a relay frame from its JSON payload (without the length prefix).
pub fn decode_frame<T: DeserializeOwned>(payload: &[u8]) -> Result<T, ProtocolError> {
    serde_json::from_slice(payload).map_err(|e| ProtocolError::Deserialization(e.to_string()))
}
