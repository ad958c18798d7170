//! Route descriptors
//!
//! A route names a destination peer and the ordered hops leading to it. An
//! empty hop list is a direct route. Endpoint addresses are kept as strings
//! because route descriptors also carry informational placeholders such as
//! `"unknown"` or `"pending (new)"`.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::address::EndpointAddress;
use crate::ids::PeerId;

/// Placeholder address for routes nothing is known about
pub const UNKNOWN_ROUTE: &str = "unknown";

/// Placeholder address for a route query in flight
pub fn pending_route(failed: bool) -> String {
    format!("pending {}", if failed { "(failed)" } else { "(new)" })
}

// ----------------------------------------------------------------------------
// Route Status Codes
// ----------------------------------------------------------------------------

/// Result code of a route control operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteStatus {
    /// The operation succeeded
    Ok,
    /// The route is already known
    AlreadyExist,
    /// The route could not be established
    Failed,
    /// Direct routes cannot be removed
    DirectRoute,
    /// The route is not acceptable (e.g. targets the local peer)
    InvalidRoute,
}

impl RouteStatus {
    /// Numeric code compatible with legacy route control callers
    pub fn code(&self) -> i32 {
        match self {
            RouteStatus::Ok => 0,
            RouteStatus::AlreadyExist => 1,
            RouteStatus::Failed => -1,
            RouteStatus::DirectRoute => 2,
            RouteStatus::InvalidRoute => 3,
        }
    }
}

impl fmt::Display for RouteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RouteStatus::Ok => "OK",
            RouteStatus::AlreadyExist => "ALREADY_EXIST",
            RouteStatus::Failed => "FAILED",
            RouteStatus::DirectRoute => "DIRECT_ROUTE",
            RouteStatus::InvalidRoute => "INVALID_ROUTE",
        };
        f.write_str(name)
    }
}

// ----------------------------------------------------------------------------
// Access Points and Routes
// ----------------------------------------------------------------------------

/// A peer together with the endpoint addresses it can be reached at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPoint {
    pub peer_id: PeerId,
    pub endpoint_addresses: Vec<String>,
}

impl AccessPoint {
    pub fn new(peer_id: PeerId) -> Self {
        Self {
            peer_id,
            endpoint_addresses: Vec::new(),
        }
    }

    /// Access point with a single textual address
    pub fn with_address<S: Into<String>>(peer_id: PeerId, address: S) -> Self {
        Self {
            peer_id,
            endpoint_addresses: vec![address.into()],
        }
    }

    /// Access point reachable at `addr` (service and param stripped)
    pub fn from_endpoint(peer_id: PeerId, addr: &EndpointAddress) -> Self {
        Self::with_address(peer_id, addr.base().to_string())
    }
}

/// A route to a destination peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteAdvertisement {
    pub dest: AccessPoint,
    pub hops: Vec<AccessPoint>,
}

impl RouteAdvertisement {
    /// A route with no hops
    pub fn direct(dest: AccessPoint) -> Self {
        Self {
            dest,
            hops: Vec::new(),
        }
    }

    /// A route reaching `dest` through `hops`, first hop first
    pub fn with_hops(dest: AccessPoint, hops: Vec<AccessPoint>) -> Self {
        Self { dest, hops }
    }

    pub fn dest_peer(&self) -> PeerId {
        self.dest.peer_id
    }

    pub fn first_hop(&self) -> Option<&AccessPoint> {
        self.hops.first()
    }

    pub fn is_direct(&self) -> bool {
        self.hops.is_empty()
    }

    /// Remove every hop naming `peer`
    pub fn remove_hop(&mut self, peer: &PeerId) {
        self.hops.retain(|hop| &hop.peer_id != peer);
    }

    /// Textual addresses of the destination access point
    pub fn dest_addresses(&self) -> &[String] {
        &self.dest.endpoint_addresses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::PeerGroupId;

    fn create_test_peer_id() -> PeerId {
        PeerId::new_random(&PeerGroupId::DefaultNet)
    }

    #[test]
    fn test_route_shape() {
        let dest = create_test_peer_id();
        let hop = create_test_peer_id();

        let direct = RouteAdvertisement::direct(AccessPoint::new(dest));
        assert!(direct.is_direct());
        assert!(direct.first_hop().is_none());

        let mut long = RouteAdvertisement::with_hops(
            AccessPoint::new(dest),
            vec![AccessPoint::new(hop)],
        );
        assert_eq!(long.first_hop().map(|h| h.peer_id), Some(hop));
        long.remove_hop(&hop);
        assert!(long.is_direct());
        assert_eq!(long.dest_peer(), dest);
    }

    #[test]
    fn test_access_point_strips_service() {
        let addr = EndpointAddress::new("tcp", "host:1").with_service(Some("svc"), Some("p"));
        let ap = AccessPoint::from_endpoint(create_test_peer_id(), &addr);
        assert_eq!(ap.endpoint_addresses, vec!["tcp://host:1".to_string()]);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(RouteStatus::Ok.code(), 0);
        assert_eq!(RouteStatus::Failed.code(), -1);
        assert_eq!(RouteStatus::InvalidRoute.to_string(), "INVALID_ROUTE");
        assert_eq!(pending_route(true), "pending (failed)");
        assert_eq!(pending_route(false), "pending (new)");
    }
}
