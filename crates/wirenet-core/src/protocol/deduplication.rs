//! Recently-seen message id cache
//!
//! Flood loop suppression compares message ids against a bounded list of ids
//! already processed. Insertion order is arrival order and the oldest id is
//! evicted once the cache is full; a hit does not refresh an id's position.

use std::collections::VecDeque;

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

// ----------------------------------------------------------------------------
// Constants
// ----------------------------------------------------------------------------

/// Reference capacity of the seen message cache
pub const MAX_RECORDED_MSGIDS: usize = 250;

// ----------------------------------------------------------------------------
// Message Id Normalization
// ----------------------------------------------------------------------------

/// Normalize a message id for recording.
///
/// Ids that parse as UUIDs are used as is. Legacy ids of any other shape are
/// mapped to the UUID formed by the first 16 bytes of their SHA-256 digest.
pub fn normalize_message_id(msg_id: &str) -> Uuid {
    if let Ok(uuid) = Uuid::parse_str(msg_id) {
        return uuid;
    }

    let digest = Sha256::digest(msg_id.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes)
}

// ----------------------------------------------------------------------------
// Seen Message Cache
// ----------------------------------------------------------------------------

/// Statistics for a seen message cache
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeduplicationStats {
    /// Ids recorded as new
    pub recorded: u64,
    /// Ids rejected as duplicates
    pub duplicates: u64,
    /// Ids evicted to make room
    pub evicted: u64,
    /// Ids currently held
    pub current_size: usize,
}

/// Bounded FIFO set of message ids
#[derive(Debug, Clone)]
pub struct SeenMessageCache {
    capacity: usize,
    order: VecDeque<Uuid>,
    members: HashSet<Uuid>,
    stats: DeduplicationStats,
}

impl SeenMessageCache {
    /// Create a cache holding at most `capacity` ids (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            members: HashSet::with_capacity(capacity),
            stats: DeduplicationStats::default(),
        }
    }

    /// Record `msg_id`, returning `true` if it was not seen before.
    pub fn record(&mut self, msg_id: &str) -> bool {
        let id = normalize_message_id(msg_id);

        if self.members.contains(&id) {
            self.stats.duplicates += 1;
            return false;
        }

        if self.order.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
                self.stats.evicted += 1;
            }
        }

        self.order.push_back(id);
        self.members.insert(id);
        self.stats.recorded += 1;
        true
    }

    /// Whether `msg_id` is currently considered seen
    pub fn contains(&self, msg_id: &str) -> bool {
        self.members.contains(&normalize_message_id(msg_id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    pub fn stats(&self) -> DeduplicationStats {
        DeduplicationStats {
            current_size: self.order.len(),
            ..self.stats.clone()
        }
    }
}

impl Default for SeenMessageCache {
    fn default() -> Self {
        Self::new(MAX_RECORDED_MSGIDS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_ids_are_used_directly() {
        let id = Uuid::new_v4();
        assert_eq!(normalize_message_id(&id.to_string()), id);
    }

    #[test]
    fn test_legacy_ids_are_hashed_deterministically() {
        let a = normalize_message_id("legacy-42");
        let b = normalize_message_id("legacy-42");
        let c = normalize_message_id("legacy-43");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_duplicate_detection() {
        let mut cache = SeenMessageCache::new(4);
        assert!(cache.record("m1"));
        assert!(!cache.record("m1"));
        assert!(cache.contains("m1"));
        assert!(!cache.contains("m2"));

        let stats = cache.stats();
        assert_eq!(stats.recorded, 1);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.current_size, 1);
    }

    #[test]
    fn test_hit_does_not_refresh_position() {
        let mut cache = SeenMessageCache::new(2);
        assert!(cache.record("a"));
        assert!(cache.record("b"));
        assert!(!cache.record("a")); // hit, "a" stays oldest
        assert!(cache.record("c")); // evicts "a"

        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));
        assert!(cache.contains("c"));
        assert_eq!(cache.stats().evicted, 1);
    }

    #[test]
    fn test_default_capacity() {
        let cache = SeenMessageCache::default();
        assert_eq!(cache.capacity(), MAX_RECORDED_MSGIDS);
        assert!(cache.is_empty());
    }
}
