//! Protocol building blocks
//!
//! Flood header codec, duplicate suppression, route descriptors and peer view
//! iteration. Nothing here owns a thread.

pub mod deduplication;
pub mod peer_view;
pub mod route;
pub mod wire;

pub use deduplication::{normalize_message_id, DeduplicationStats, SeenMessageCache, MAX_RECORDED_MSGIDS};
pub use peer_view::{PeerViewStrategy, SequentialStrategy, SharedPeerView};
pub use route::{pending_route, AccessPoint, RouteAdvertisement, RouteStatus, UNKNOWN_ROUTE};
pub use wire::{
    new_message_id, WireHeader, DEFAULT_TTL, DIRECT_TTL, WIRE_HEADER_NAME, WIRE_HEADER_NAMESPACE,
};
