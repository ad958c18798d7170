//! Endpoint router bookkeeping
//!
//! The router knows three classes of destination: direct routes (an open
//! messenger in the canonical cache), long routes (a recorded route whose
//! first hop is direct) and pending route queries. Peer ids map to router
//! addresses of the form `wirenet://<peer unique value>`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::Mutex;
use tracing::{debug, info, trace};
use wirenet_core::{
    AccessPoint, EndpointAddress, MessengerCacheConfig, PeerId, RouteAdvertisement,
    TransportError,
};

use crate::messenger::{BlockingMessenger, Messenger, MessengerCache};
use crate::rendezvous::MessengerProvider;

/// Protocol name of router addresses
pub const ROUTER_PROTOCOL_NAME: &str = "wirenet";

// ----------------------------------------------------------------------------
// Collaborators
// ----------------------------------------------------------------------------

/// Establishes direct connections
pub trait MessengerFactory: Send + Sync {
    /// Open a messenger to `addr`, optionally guided by a known route
    fn connect(
        &self,
        addr: &EndpointAddress,
        hint: Option<&RouteAdvertisement>,
    ) -> Result<Arc<BlockingMessenger>, TransportError>;
}

/// Publishes route advertisements to the group
pub trait RouteAdvertiser: Send + Sync {
    fn publish(&self, route: &RouteAdvertisement);
}

/// An outstanding route query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingQuery {
    pub failed: bool,
    pub attempts: u32,
}

// ----------------------------------------------------------------------------
// Address Mapping
// ----------------------------------------------------------------------------

/// Router address of `peer`
pub fn pid_to_addr(peer: &PeerId) -> EndpointAddress {
    EndpointAddress::new(ROUTER_PROTOCOL_NAME, peer.unique_value())
}

/// Peer named by a router address
pub fn addr_to_pid(addr: &EndpointAddress) -> Option<PeerId> {
    if addr.protocol() != ROUTER_PROTOCOL_NAME {
        return None;
    }
    addr.protocol_address().parse().ok()
}

// ----------------------------------------------------------------------------
// Endpoint Router
// ----------------------------------------------------------------------------

pub struct EndpointRouter {
    local_peer: PeerId,
    local_addresses: Vec<EndpointAddress>,
    messengers: MessengerCache,
    routes: Mutex<HashMap<PeerId, RouteAdvertisement>>,
    pending: Mutex<HashMap<PeerId, PendingQuery>>,
    factory: Arc<dyn MessengerFactory>,
    advertiser: Arc<dyn RouteAdvertiser>,
    resolver_enabled: AtomicBool,
}

impl EndpointRouter {
    pub fn new(
        local_peer: PeerId,
        local_addresses: Vec<EndpointAddress>,
        factory: Arc<dyn MessengerFactory>,
        advertiser: Arc<dyn RouteAdvertiser>,
        cache_config: &MessengerCacheConfig,
    ) -> Self {
        info!(peer = %local_peer.short(), addresses = local_addresses.len(), "Starting endpoint router");
        Self {
            local_peer,
            local_addresses,
            messengers: MessengerCache::new(cache_config),
            routes: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            factory,
            advertiser,
            resolver_enabled: AtomicBool::new(true),
        }
    }

    pub fn local_peer(&self) -> &PeerId {
        &self.local_peer
    }

    pub fn messengers(&self) -> &MessengerCache {
        &self.messengers
    }

    pub(crate) fn advertiser(&self) -> &Arc<dyn RouteAdvertiser> {
        &self.advertiser
    }

    /// This peer's own route: its id and physical addresses
    pub fn my_local_route(&self) -> RouteAdvertisement {
        let mut dest = AccessPoint::new(self.local_peer);
        dest.endpoint_addresses = self
            .local_addresses
            .iter()
            .map(|addr| addr.base().to_string())
            .collect();
        RouteAdvertisement::direct(dest)
    }

    // ------------------------------------------------------------------------
    // Direct Routes
    // ------------------------------------------------------------------------

    pub fn is_local_route(&self, peer: &PeerId) -> bool {
        self.messengers.contains(&pid_to_addr(peer))
    }

    pub fn get_cached_messenger(&self, addr: &EndpointAddress) -> Option<Arc<BlockingMessenger>> {
        self.messengers.get(addr)
    }

    /// Destinations with a cached messenger
    pub fn cached_destinations(&self) -> Vec<EndpointAddress> {
        self.messengers.destinations()
    }

    /// Cached messenger to `addr`, connecting if there is none.
    ///
    /// A successful connection clears any pending query for the peer.
    pub fn ensure_local_route(
        &self,
        addr: &EndpointAddress,
        hint: Option<&RouteAdvertisement>,
    ) -> Option<Arc<BlockingMessenger>> {
        if let Some(messenger) = self.messengers.get(addr) {
            return Some(messenger);
        }

        match self.factory.connect(addr, hint) {
            Ok(messenger) => {
                debug!(destination = %addr, "Opened direct route");
                let canonical = self.messengers.insert(addr.clone(), messenger);
                if let Some(peer) = addr_to_pid(addr) {
                    self.clear_pending(&peer);
                }
                Some(canonical)
            }
            Err(err) => {
                debug!(destination = %addr, %err, "Could not open direct route");
                None
            }
        }
    }

    // ------------------------------------------------------------------------
    // Long Routes
    // ------------------------------------------------------------------------

    pub fn is_routed_route(&self, peer: &PeerId) -> bool {
        self.routes.lock().contains_key(peer)
    }

    /// Record a long route; routes to the local peer are refused
    pub fn set_route(&self, route: RouteAdvertisement) -> bool {
        let dest = route.dest_peer();
        if dest == self.local_peer {
            return false;
        }
        trace!(peer = %dest.short(), hops = route.hops.len(), "Recording route");
        self.routes.lock().insert(dest, route);
        true
    }

    pub fn remove_route(&self, peer: &PeerId) -> Option<RouteAdvertisement> {
        let removed = self.routes.lock().remove(peer);
        if removed.is_some() {
            trace!(peer = %peer.short(), "Removed route");
        }
        removed
    }

    pub fn get_route(&self, peer: &PeerId) -> Option<RouteAdvertisement> {
        self.routes.lock().get(peer).cloned()
    }

    pub fn long_routes(&self) -> Vec<RouteAdvertisement> {
        self.routes.lock().values().cloned().collect()
    }

    // ------------------------------------------------------------------------
    // Pending Queries
    // ------------------------------------------------------------------------

    /// Note an outstanding query for `peer`
    pub fn register_pending(&self, peer: PeerId) {
        let mut pending = self.pending.lock();
        let query = pending.entry(peer).or_default();
        query.attempts += 1;
    }

    /// Mark the query for `peer` as failed; no-op if none is pending
    pub fn fail_pending(&self, peer: &PeerId) {
        if let Some(query) = self.pending.lock().get_mut(peer) {
            query.failed = true;
        }
    }

    pub fn clear_pending(&self, peer: &PeerId) -> Option<PendingQuery> {
        self.pending.lock().remove(peer)
    }

    pub fn get_pending(&self, peer: &PeerId) -> Option<PendingQuery> {
        self.pending.lock().get(peer).copied()
    }

    pub fn pending_queries(&self) -> Vec<(PeerId, PendingQuery)> {
        self.pending
            .lock()
            .iter()
            .map(|(peer, query)| (*peer, *query))
            .collect()
    }

    // ------------------------------------------------------------------------
    // Route Resolver
    // ------------------------------------------------------------------------

    pub fn use_route_resolver(&self) -> bool {
        self.resolver_enabled.load(Ordering::SeqCst)
    }

    pub fn set_route_resolver(&self, enabled: bool) {
        self.resolver_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Close every cached messenger and forget all routes
    pub fn shutdown(&self) {
        info!(peer = %self.local_peer.short(), "Stopping endpoint router");
        self.messengers.shutdown();
        self.routes.lock().clear();
        self.pending.lock().clear();
    }
}

impl MessengerProvider for EndpointRouter {
    /// Direct messenger to `peer`, or to the first hop of its long route
    fn messenger_for(&self, peer: &PeerId) -> Option<Arc<dyn Messenger>> {
        if *peer == self.local_peer {
            return None;
        }

        let route = self.get_route(peer);
        let target = match route.as_ref().and_then(|r| r.first_hop()) {
            Some(hop) if !self.is_local_route(peer) => hop.peer_id,
            _ => *peer,
        };

        let messenger = self.ensure_local_route(&pid_to_addr(&target), route.as_ref())?;
        Some(messenger as Arc<dyn Messenger>)
    }
}
