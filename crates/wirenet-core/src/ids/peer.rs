use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

use super::{decode_pair, encode_pair, random_uuid, strip_format, ID_FORMAT, TAG_PEER, TAG_PIPE, UUID_SIZE};
use crate::errors::WirenetError;
use crate::ids::PeerGroupId;

// ----------------------------------------------------------------------------
// Peer Identifier
// ----------------------------------------------------------------------------

/// Identifier of a peer, minted within a group.
///
/// Ordered by group then peer value; peer views rely on this total order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PeerId {
    group: [u8; UUID_SIZE],
    value: [u8; UUID_SIZE],
}

impl PeerId {
    /// Create a random peer identifier within `group`
    pub fn new_random(group: &PeerGroupId) -> Self {
        Self {
            group: group.uuid_bytes(),
            value: random_uuid(),
        }
    }

    /// Create a peer identifier from raw parts
    pub fn from_parts(group: [u8; UUID_SIZE], value: [u8; UUID_SIZE]) -> Self {
        Self { group, value }
    }

    /// The group this peer identifier was minted in
    pub fn group_id(&self) -> PeerGroupId {
        PeerGroupId::from_uuid(self.group)
    }

    /// The 128-bit peer value
    pub fn value(&self) -> &[u8; UUID_SIZE] {
        &self.value
    }

    /// Unique value string
    pub fn unique_value(&self) -> String {
        encode_pair(&self.group, &self.value, TAG_PEER)
    }

    /// Short hex form for log lines
    pub fn short(&self) -> String {
        hex::encode(&self.value[..4])
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "urn:{}:{}", ID_FORMAT, self.unique_value())
    }
}

impl FromStr for PeerId {
    type Err = WirenetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (group, value) = decode_pair(strip_format(s)?, TAG_PEER)?;
        Ok(Self { group, value })
    }
}

impl From<PeerId> for String {
    fn from(id: PeerId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for PeerId {
    type Error = WirenetError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// ----------------------------------------------------------------------------
// Pipe Identifier
// ----------------------------------------------------------------------------

/// Identifier of a logical pipe, owned by a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PipeId {
    group: [u8; UUID_SIZE],
    value: [u8; UUID_SIZE],
}

impl PipeId {
    /// Create a random pipe identifier within `group`
    pub fn new_random(group: &PeerGroupId) -> Self {
        Self {
            group: group.uuid_bytes(),
            value: random_uuid(),
        }
    }

    /// Create a pipe identifier from raw parts
    pub fn from_parts(group: [u8; UUID_SIZE], value: [u8; UUID_SIZE]) -> Self {
        Self { group, value }
    }

    /// The group owning this pipe
    pub fn group_id(&self) -> PeerGroupId {
        PeerGroupId::from_uuid(self.group)
    }

    /// Unique value string
    pub fn unique_value(&self) -> String {
        encode_pair(&self.group, &self.value, TAG_PIPE)
    }
}

impl fmt::Display for PipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "urn:{}:{}", ID_FORMAT, self.unique_value())
    }
}

impl FromStr for PipeId {
    type Err = WirenetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (group, value) = decode_pair(strip_format(s)?, TAG_PIPE)?;
        Ok(Self { group, value })
    }
}

impl From<PipeId> for String {
    fn from(id: PipeId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for PipeId {
    type Error = WirenetError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
