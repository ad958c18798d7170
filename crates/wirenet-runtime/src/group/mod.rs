//! Peer groups
//!
//! [`GroupRegistry`] is the process-scoped table of running groups;
//! [`PeerGroup`] carries the master reference count and the service table.

pub mod peer_group;
pub mod registry;

pub use peer_group::{GroupInterface, PeerGroup, Service};
pub use registry::GroupRegistry;
