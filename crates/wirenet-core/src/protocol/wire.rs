//! Flood header for wire pipes
//!
//! Every message carried by a wire pipe holds a header element describing the
//! pipe, a message id unique per flood, the remaining hop budget and the
//! peers traversed so far. The first path entry is the originating peer.
//! The header is stored as a JSON document under the `wirenet` namespace,
//! element `WireHeader`.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::errors::PipeError;
use crate::ids::{PeerId, PipeId};
use crate::message::Message;

// ----------------------------------------------------------------------------
// Constants
// ----------------------------------------------------------------------------

/// Message element namespace holding the flood header
pub const WIRE_HEADER_NAMESPACE: &str = "wirenet";

/// Message element name holding the flood header
pub const WIRE_HEADER_NAME: &str = "WireHeader";

/// Hop budget for floods to the whole group
pub const DEFAULT_TTL: u32 = 200;

/// Hop budget for sends to an explicit peer set
pub const DIRECT_TTL: u32 = 1;

/// Mint a fresh flood message id
pub fn new_message_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ----------------------------------------------------------------------------
// Wire Header
// ----------------------------------------------------------------------------

/// Per-message flood envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireHeader {
    pub pipe_id: PipeId,
    pub msg_id: String,
    pub ttl: u32,
    pub path: SmallVec<[PeerId; 4]>,
}

impl WireHeader {
    /// Header for a message originating at `src_peer`
    pub fn new(pipe_id: PipeId, msg_id: String, ttl: u32, src_peer: PeerId) -> Self {
        let mut path = SmallVec::new();
        path.push(src_peer);
        Self {
            pipe_id,
            msg_id,
            ttl,
            path,
        }
    }

    /// The originating peer, if the path is not empty
    pub fn src_peer(&self) -> Option<&PeerId> {
        self.path.first()
    }

    /// Header for the next hop: TTL decremented and `relay` appended to the path
    pub fn next_hop(&self, relay: PeerId) -> Self {
        let mut next = self.clone();
        next.ttl = self.ttl.saturating_sub(1);
        next.path.push(relay);
        next
    }

    pub fn to_json(&self) -> Result<Vec<u8>, PipeError> {
        serde_json::to_vec(self).map_err(|e| PipeError::InvalidHeader {
            reason: e.to_string(),
        })
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, PipeError> {
        serde_json::from_slice(bytes).map_err(|e| PipeError::InvalidHeader {
            reason: e.to_string(),
        })
    }

    /// Attach this header to `msg`, replacing any earlier header
    pub fn attach(&self, msg: &mut Message) -> Result<(), PipeError> {
        let doc = self.to_json()?;
        msg.replace_element(WIRE_HEADER_NAMESPACE, WIRE_HEADER_NAME, doc);
        Ok(())
    }

    /// Read the header carried by `msg`
    pub fn from_message(msg: &Message) -> Result<Self, PipeError> {
        let doc = msg
            .element(WIRE_HEADER_NAMESPACE, WIRE_HEADER_NAME)
            .ok_or(PipeError::MissingHeader)?;
        let header = Self::from_json(doc)?;
        if header.path.is_empty() {
            return Err(PipeError::InvalidHeader {
                reason: "empty path".to_string(),
            });
        }
        Ok(header)
    }
}
