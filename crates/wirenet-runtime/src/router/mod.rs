//! Endpoint routing
//!
//! [`EndpointRouter`] keeps the direct, long and pending route tables;
//! [`RouteControl`] is the administrative interface over them.

pub mod control;
pub mod table;

pub use control::RouteControl;
pub use table::{
    addr_to_pid, pid_to_addr, EndpointRouter, MessengerFactory, PendingQuery, RouteAdvertiser,
    ROUTER_PROTOCOL_NAME,
};
