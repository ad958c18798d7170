//! Identifiers for groups, peers and pipes
//!
//! Every identifier embeds 128-bit UUID values. Their textual "unique value"
//! form is `wirenet-<hex>` where the hex payload ends with a one-byte type
//! tag, and the URN form is `urn:wirenet:<unique value>`. Parsing accepts both
//! forms.

mod group;
mod peer;

pub use group::{PeerGroupId, NET_GROUP_UUID, WORLD_GROUP_UUID};
pub use peer::{PeerId, PipeId};

use crate::errors::{Result, WirenetError};

/// ID format name embedded in every identifier string
pub const ID_FORMAT: &str = "wirenet";

/// Size of every embedded UUID value
pub const UUID_SIZE: usize = 16;

/// Type tags terminating the hex payload of an identifier
pub(crate) const TAG_GROUP: u8 = 0x02;
pub(crate) const TAG_PEER: u8 = 0x03;
pub(crate) const TAG_PIPE: u8 = 0x04;

/// Fresh random (v4) UUID bytes
pub(crate) fn random_uuid() -> [u8; UUID_SIZE] {
    uuid::Uuid::new_v4().into_bytes()
}

/// Strip the optional `urn:wirenet:` prefix and the mandatory `wirenet-`
/// format prefix, returning the payload.
pub(crate) fn strip_format(s: &str) -> Result<&str> {
    let unique = s
        .strip_prefix("urn:")
        .and_then(|rest| rest.strip_prefix(ID_FORMAT))
        .and_then(|rest| rest.strip_prefix(':'))
        .unwrap_or(s);

    unique
        .strip_prefix(ID_FORMAT)
        .and_then(|rest| rest.strip_prefix('-'))
        .ok_or_else(|| WirenetError::invalid_id(format!("unsupported ID format: {}", s)))
}

/// Render a two-UUID payload with its type tag
pub(crate) fn encode_pair(first: &[u8; UUID_SIZE], second: &[u8; UUID_SIZE], tag: u8) -> String {
    format!(
        "{}-{}{}{}",
        ID_FORMAT,
        hex::encode(first),
        hex::encode(second),
        hex::encode([tag])
    )
}

/// Decode a two-UUID payload, checking its type tag
pub(crate) fn decode_pair(payload: &str, tag: u8) -> Result<([u8; UUID_SIZE], [u8; UUID_SIZE])> {
    let bytes =
        hex::decode(payload).map_err(|_| WirenetError::invalid_id("invalid hex in identifier"))?;

    if bytes.len() != UUID_SIZE * 2 + 1 {
        return Err(WirenetError::invalid_id(format!(
            "identifier payload must be {} bytes, got {}",
            UUID_SIZE * 2 + 1,
            bytes.len()
        )));
    }
    if bytes[UUID_SIZE * 2] != tag {
        return Err(WirenetError::invalid_id(format!(
            "identifier type tag {:#04x} does not match expected {:#04x}",
            bytes[UUID_SIZE * 2],
            tag
        )));
    }

    let mut first = [0u8; UUID_SIZE];
    let mut second = [0u8; UUID_SIZE];
    first.copy_from_slice(&bytes[..UUID_SIZE]);
    second.copy_from_slice(&bytes[UUID_SIZE..UUID_SIZE * 2]);
    Ok((first, second))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_format_accepts_urn_and_unique_value() {
        assert_eq!(strip_format("urn:wirenet:wirenet-abcd").unwrap(), "abcd");
        assert_eq!(strip_format("wirenet-abcd").unwrap(), "abcd");
        assert!(strip_format("urn:other:uuid-abcd").is_err());
    }

    #[test]
    fn test_pair_encoding_checks_tag() {
        let a = [1u8; UUID_SIZE];
        let b = [2u8; UUID_SIZE];
        let text = encode_pair(&a, &b, TAG_PEER);
        let payload = strip_format(&text).unwrap();

        assert_eq!(decode_pair(payload, TAG_PEER).unwrap(), (a, b));
        assert!(decode_pair(payload, TAG_PIPE).is_err());
    }
}
