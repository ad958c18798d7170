//! Peer group identifiers
//!
//! Groups are hierarchical: an ordinary group identifier embeds the UUID of
//! the group it was created in. Two reserved groups exist, the world group
//! (root of every hierarchy) and the default net group (child of the world
//! group). They are distinct variants and compare equal only to themselves,
//! never to an ordinary identifier that happens to carry the same bytes.

use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{decode_pair, encode_pair, random_uuid, strip_format, ID_FORMAT, TAG_GROUP, UUID_SIZE};
use crate::errors::WirenetError;

/// UUID embedded as the parent field of groups created in the world group.
///
/// Reserved values are not version 4 UUIDs, so neither random nor
/// seed-derived identifiers can collide with them.
pub const WORLD_GROUP_UUID: [u8; UUID_SIZE] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x01];

/// UUID embedded as the parent field of groups created in the net group
pub const NET_GROUP_UUID: [u8; UUID_SIZE] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x02];

const WORLD_UNIQUE: &str = "WorldGroup";
const NET_UNIQUE: &str = "NetGroup";

// ----------------------------------------------------------------------------
// Peer Group Identifier
// ----------------------------------------------------------------------------

/// Identifier of a peer group
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum PeerGroupId {
    /// The root group every peer belongs to
    World,
    /// The default network group
    DefaultNet,
    /// Any other group, compared structurally
    Group {
        group: [u8; UUID_SIZE],
        parent: [u8; UUID_SIZE],
    },
}

impl PeerGroupId {
    /// Create a random group identifier without parent linkage
    pub fn new_random() -> Self {
        PeerGroupId::Group {
            group: random_uuid(),
            parent: [0u8; UUID_SIZE],
        }
    }

    /// Create a random group identifier created within `parent`
    pub fn new_random_with_parent(parent: &PeerGroupId) -> Self {
        PeerGroupId::Group {
            group: random_uuid(),
            parent: parent.uuid_bytes(),
        }
    }

    /// Create a content-derived group identifier.
    ///
    /// The same seed always yields the same identifier. The SHA-256 digest of
    /// the seed is truncated to a UUID and stamped as version 4, IETF variant,
    /// with the multicast bit set.
    pub fn from_seed(seed: &[u8]) -> Self {
        let digest = Sha256::digest(seed);
        let mut group = [0u8; UUID_SIZE];
        group.copy_from_slice(&digest[..UUID_SIZE]);

        group[6] = (group[6] & 0x0f) | 0x40; // version 4
        group[8] = (group[8] & 0x3f) | 0x80; // IETF variant
        group[10] = (group[10] & 0x3f) | 0x80; // multicast bit

        PeerGroupId::Group {
            group,
            parent: [0u8; UUID_SIZE],
        }
    }

    /// Create a content-derived group identifier created within `parent`
    pub fn from_seed_with_parent(parent: &PeerGroupId, seed: &[u8]) -> Self {
        match Self::from_seed(seed) {
            PeerGroupId::Group { group, .. } => PeerGroupId::Group {
                group,
                parent: parent.uuid_bytes(),
            },
            reserved => reserved,
        }
    }

    /// Map a group UUID back to an identifier, recognizing reserved values.
    ///
    /// The result carries no parent linkage.
    pub fn from_uuid(uuid: [u8; UUID_SIZE]) -> Self {
        match uuid {
            WORLD_GROUP_UUID => PeerGroupId::World,
            NET_GROUP_UUID => PeerGroupId::DefaultNet,
            group => PeerGroupId::Group {
                group,
                parent: [0u8; UUID_SIZE],
            },
        }
    }

    /// The UUID identifying this group
    pub fn uuid_bytes(&self) -> [u8; UUID_SIZE] {
        match self {
            PeerGroupId::World => WORLD_GROUP_UUID,
            PeerGroupId::DefaultNet => NET_GROUP_UUID,
            PeerGroupId::Group { group, .. } => *group,
        }
    }

    /// Identifier of the group this group was created in.
    ///
    /// `None` iff the embedded parent field is all zero. The net group's
    /// parent is the world group; the world group has none.
    pub fn parent(&self) -> Option<PeerGroupId> {
        match self {
            PeerGroupId::World => None,
            PeerGroupId::DefaultNet => Some(PeerGroupId::World),
            PeerGroupId::Group { parent, .. } => {
                if parent.iter().all(|b| *b == 0) {
                    None
                } else {
                    Some(Self::from_uuid(*parent))
                }
            }
        }
    }

    /// Whether this is one of the reserved singleton groups
    pub fn is_reserved(&self) -> bool {
        matches!(self, PeerGroupId::World | PeerGroupId::DefaultNet)
    }

    /// Unique value string, e.g. `wirenet-NetGroup`
    pub fn unique_value(&self) -> String {
        match self {
            PeerGroupId::World => format!("{}-{}", ID_FORMAT, WORLD_UNIQUE),
            PeerGroupId::DefaultNet => format!("{}-{}", ID_FORMAT, NET_UNIQUE),
            PeerGroupId::Group { group, parent } => encode_pair(group, parent, TAG_GROUP),
        }
    }

    /// URN form, e.g. `urn:wirenet:wirenet-NetGroup`
    pub fn to_urn(&self) -> String {
        format!("urn:{}:{}", ID_FORMAT, self.unique_value())
    }
}

impl fmt::Display for PeerGroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_urn())
    }
}

impl FromStr for PeerGroupId {
    type Err = WirenetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let payload = strip_format(s)?;
        match payload {
            WORLD_UNIQUE => Ok(PeerGroupId::World),
            NET_UNIQUE => Ok(PeerGroupId::DefaultNet),
            hex_payload => {
                let (group, parent) = decode_pair(hex_payload, TAG_GROUP)?;
                Ok(PeerGroupId::Group { group, parent })
            }
        }
    }
}

impl From<PeerGroupId> for String {
    fn from(id: PeerGroupId) -> Self {
        id.to_urn()
    }
}

impl TryFrom<String> for PeerGroupId {
    type Error = WirenetError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
