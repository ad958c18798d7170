//! Route control
//!
//! Administrative view over the router tables: add and delete routes, and
//! describe what the router knows about a peer.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, warn};
use wirenet_core::protocol::{pending_route, UNKNOWN_ROUTE};
use wirenet_core::{AccessPoint, EndpointAddress, PeerId, RouteAdvertisement, RouteStatus};

use super::table::{addr_to_pid, pid_to_addr, EndpointRouter};
use crate::messenger::Messenger;

/// Route administration for one router
#[derive(Clone)]
pub struct RouteControl {
    router: Arc<EndpointRouter>,
    local_peer: PeerId,
}

/// Single-address route describing `peer`
fn described(peer: PeerId, address: String) -> RouteAdvertisement {
    RouteAdvertisement::direct(AccessPoint::with_address(peer, address))
}

fn physical(addr: &EndpointAddress) -> String {
    format!("{}://{}", addr.protocol(), addr.protocol_address())
}

impl RouteControl {
    pub fn new(router: Arc<EndpointRouter>) -> Self {
        let local_peer = *router.local_peer();
        Self { router, local_peer }
    }

    /// This peer's own route
    pub fn local_route(&self) -> RouteAdvertisement {
        self.router.my_local_route()
    }

    /// Add a route.
    ///
    /// A route with no hops (after dropping this peer as first hop) is opened
    /// as a direct connection; a longer route is recorded once its first hop
    /// is reachable.
    pub fn add_route(&self, route: RouteAdvertisement) -> RouteStatus {
        let mut route = route;
        let dest = route.dest_peer();
        if dest == self.local_peer {
            return RouteStatus::AlreadyExist;
        }

        if route.first_hop().map(|hop| hop.peer_id) == Some(self.local_peer) {
            route.remove_hop(&self.local_peer);
        }

        let Some(first_hop) = route.first_hop().cloned() else {
            if self.router.is_local_route(&dest) || self.router.is_routed_route(&dest) {
                return RouteStatus::AlreadyExist;
            }
            let addr = pid_to_addr(&dest);
            return match self.router.ensure_local_route(&addr, Some(&route)) {
                Some(_) => RouteStatus::Ok,
                None => RouteStatus::Failed,
            };
        };

        let hop_peer = first_hop.peer_id;
        let hop_route = if self.router.is_local_route(&hop_peer) || self.router.is_routed_route(&hop_peer)
        {
            None
        } else {
            let synthesized = RouteAdvertisement::direct(first_hop);
            self.router.advertiser().publish(&synthesized);
            Some(synthesized)
        };

        if self
            .router
            .ensure_local_route(&pid_to_addr(&hop_peer), hop_route.as_ref())
            .is_none()
        {
            debug!(peer = %dest.short(), hop = %hop_peer.short(), "First hop unreachable, discarding route");
            return RouteStatus::Failed;
        }

        self.router.set_route(route);
        RouteStatus::Ok
    }

    /// Delete a long route; direct routes stay up
    pub fn delete_route(&self, peer: &PeerId) -> RouteStatus {
        if *peer == self.local_peer {
            return RouteStatus::InvalidRoute;
        }
        if self.router.is_local_route(peer) {
            return RouteStatus::DirectRoute;
        }
        self.router.remove_route(peer);
        RouteStatus::Ok
    }

    /// What the router knows about `peer`: direct, long, pending or unknown
    pub fn get_route_info(&self, peer: &PeerId) -> RouteAdvertisement {
        let addr = pid_to_addr(peer);
        if let Some(messenger) = self.router.get_cached_messenger(&addr) {
            return described(*peer, physical(&messenger.destination_address()));
        }

        if let Some(route) = self.router.get_route(peer) {
            return route;
        }

        match self.router.get_pending(peer) {
            Some(query) => described(*peer, pending_route(query.failed)),
            None => described(*peer, UNKNOWN_ROUTE.to_string()),
        }
    }

    /// Snapshot of every direct, long and pending route.
    ///
    /// Best effort: a failure partway through returns what was gathered.
    pub fn get_all_routes_info(&self) -> Vec<RouteAdvertisement> {
        let mut routes = Vec::new();

        let scan = catch_unwind(AssertUnwindSafe(|| {
            for addr in self.router.cached_destinations() {
                let Some(peer) = addr_to_pid(&addr) else {
                    continue;
                };
                let address = match self.router.get_cached_messenger(&addr) {
                    Some(messenger) => physical(&messenger.destination_address()),
                    None => UNKNOWN_ROUTE.to_string(),
                };
                routes.push(described(peer, address));
            }

            routes.extend(self.router.long_routes());

            for (peer, query) in self.router.pending_queries() {
                routes.push(described(peer, pending_route(query.failed)));
            }
        }));

        if scan.is_err() {
            warn!(collected = routes.len(), "Route scan failed, returning partial result");
        }
        routes
    }

    pub fn use_route_resolver(&self) -> bool {
        self.router.use_route_resolver()
    }

    pub fn enable_route_resolver(&self) {
        self.router.set_route_resolver(true);
    }

    pub fn disable_route_resolver(&self) {
        self.router.set_route_resolver(false);
    }
}
