//! Route control integration tests
//!
//! Result codes of route addition and deletion, route description
//! precedence, route snapshots and flooding over router messengers.


use std::sync::Arc;

use test_utils::{payload, random_peer, text_message, MockFactory, RecordingAdvertiser};
use wirenet_core::protocol::UNKNOWN_ROUTE;
use wirenet_core::{
    AccessPoint, EndpointAddress, Message, MessengerCacheConfig, PeerId, RouteAdvertisement,
    RouteStatus, WIRE_SERVICE_NAME,
};
use wirenet_runtime::router::pid_to_addr;
use wirenet_runtime::{
    EndpointRouter, Messenger, MessengerPropagator, RendezvousService, RouteControl,
};

struct Fixture {
    local: PeerId,
    router: Arc<EndpointRouter>,
    control: RouteControl,
    factory: Arc<MockFactory>,
    advertiser: Arc<RecordingAdvertiser>,
}

fn create_fixture() -> Fixture {
    let local = random_peer();
    let factory = MockFactory::new();
    let advertiser = RecordingAdvertiser::new();
    let router = Arc::new(EndpointRouter::new(
        local,
        vec![EndpointAddress::new("tcp", "10.0.0.1:9701")],
        factory.clone(),
        advertiser.clone(),
        &MessengerCacheConfig::default(),
    ));

    Fixture {
        local,
        control: RouteControl::new(router.clone()),
        router,
        factory,
        advertiser,
    }
}

fn direct_route(peer: PeerId) -> RouteAdvertisement {
    RouteAdvertisement::direct(AccessPoint::new(peer))
}

fn long_route(dest: PeerId, hops: &[PeerId]) -> RouteAdvertisement {
    RouteAdvertisement::with_hops(
        AccessPoint::new(dest),
        hops.iter().map(|hop| AccessPoint::new(*hop)).collect(),
    )
}

fn physical(peer: &PeerId) -> String {
    let addr = pid_to_addr(peer);
    format!("{}://{}", addr.protocol(), addr.protocol_address())
}

// ----------------------------------------------------------------------------
// Adding Routes
// ----------------------------------------------------------------------------

#[test]
fn test_route_to_self_already_exists() {
    let fx = create_fixture();
    assert_eq!(fx.control.add_route(direct_route(fx.local)), RouteStatus::AlreadyExist);
    assert_eq!(fx.factory.connect_count(), 0);
}

#[test]
fn test_direct_route_connects_once() {
    let fx = create_fixture();
    let peer = random_peer();

    assert_eq!(fx.control.add_route(direct_route(peer)), RouteStatus::Ok);
    assert!(fx.router.is_local_route(&peer));
    assert_eq!(fx.control.add_route(direct_route(peer)), RouteStatus::AlreadyExist);
    assert_eq!(fx.factory.connect_count(), 1);
}

#[test]
fn test_unreachable_direct_route_fails() {
    let fx = create_fixture();
    let peer = random_peer();
    fx.factory.mark_unreachable(pid_to_addr(&peer));

    assert_eq!(fx.control.add_route(direct_route(peer)), RouteStatus::Failed);
    assert!(!fx.router.is_local_route(&peer));
}

#[test]
fn test_long_route_publishes_unknown_first_hop() {
    let fx = create_fixture();
    let (dest, hop) = (random_peer(), random_peer());

    assert_eq!(fx.control.add_route(long_route(dest, &[hop])), RouteStatus::Ok);
    assert!(fx.router.is_routed_route(&dest));
    assert!(fx.router.is_local_route(&hop));

    let published = fx.advertiser.published.lock();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].dest_peer(), hop);
    assert!(published[0].is_direct());
}

#[test]
fn test_long_route_over_known_hop_is_not_published() {
    let fx = create_fixture();
    let (dest, hop) = (random_peer(), random_peer());

    assert_eq!(fx.control.add_route(direct_route(hop)), RouteStatus::Ok);
    assert_eq!(fx.control.add_route(long_route(dest, &[hop])), RouteStatus::Ok);
    assert!(fx.advertiser.published.lock().is_empty());
}

#[test]
fn test_long_route_with_unreachable_hop_fails() {
    let fx = create_fixture();
    let (dest, hop) = (random_peer(), random_peer());
    fx.factory.mark_unreachable(pid_to_addr(&hop));

    assert_eq!(fx.control.add_route(long_route(dest, &[hop])), RouteStatus::Failed);
    assert!(fx.router.get_route(&dest).is_none());
}

#[test]
fn test_local_first_hop_is_dropped() {
    let fx = create_fixture();
    let dest = random_peer();

    assert_eq!(fx.control.add_route(long_route(dest, &[fx.local])), RouteStatus::Ok);
    assert!(fx.router.is_local_route(&dest));
    assert!(!fx.router.is_routed_route(&dest));
}

// ----------------------------------------------------------------------------
// Deleting Routes
// ----------------------------------------------------------------------------

#[test]
fn test_delete_route_codes() {
    let fx = create_fixture();
    let (direct, dest, hop) = (random_peer(), random_peer(), random_peer());
    fx.control.add_route(direct_route(direct));
    fx.control.add_route(long_route(dest, &[hop]));

    assert_eq!(fx.control.delete_route(&fx.local), RouteStatus::InvalidRoute);
    assert_eq!(fx.control.delete_route(&direct), RouteStatus::DirectRoute);
    assert_eq!(fx.control.delete_route(&dest), RouteStatus::Ok);
    assert!(!fx.router.is_routed_route(&dest));
    assert_eq!(fx.control.delete_route(&random_peer()), RouteStatus::Ok);
}

// ----------------------------------------------------------------------------
// Route Descriptions
// ----------------------------------------------------------------------------

#[test]
fn test_direct_route_takes_precedence() {
    let fx = create_fixture();
    let (dest, hop) = (random_peer(), random_peer());
    fx.control.add_route(direct_route(dest));
    assert!(fx.router.set_route(long_route(dest, &[hop])));

    let info = fx.control.get_route_info(&dest);
    assert_eq!(info.dest_peer(), dest);
    assert!(info.is_direct());
    assert_eq!(info.dest_addresses(), &[physical(&dest)]);
}

#[test]
fn test_route_info_falls_back_through_classes() {
    let fx = create_fixture();
    let (dest, hop, queried) = (random_peer(), random_peer(), random_peer());
    fx.control.add_route(long_route(dest, &[hop]));

    assert_eq!(fx.control.get_route_info(&dest), long_route(dest, &[hop]));

    fx.router.register_pending(queried);
    assert_eq!(
        fx.control.get_route_info(&queried).dest_addresses(),
        &["pending (new)".to_string()]
    );
    fx.router.fail_pending(&queried);
    assert_eq!(
        fx.control.get_route_info(&queried).dest_addresses(),
        &["pending (failed)".to_string()]
    );

    assert_eq!(
        fx.control.get_route_info(&random_peer()).dest_addresses(),
        &[UNKNOWN_ROUTE.to_string()]
    );
}

#[test]
fn test_connection_clears_pending_query() {
    let fx = create_fixture();
    let peer = random_peer();
    fx.router.register_pending(peer);

    assert_eq!(fx.control.add_route(direct_route(peer)), RouteStatus::Ok);
    assert!(fx.router.get_pending(&peer).is_none());
}

#[test]
fn test_all_routes_snapshot() {
    let fx = create_fixture();
    let (direct, dest, hop, queried) = (random_peer(), random_peer(), random_peer(), random_peer());
    fx.control.add_route(direct_route(direct));
    fx.control.add_route(long_route(dest, &[hop]));
    fx.router.register_pending(queried);

    let routes = fx.control.get_all_routes_info();
    // direct, first hop of the long route, long route, pending
    assert_eq!(routes.len(), 4);
    assert!(routes.contains(&long_route(dest, &[hop])));
    assert!(routes
        .iter()
        .any(|r| r.dest_peer() == queried && r.dest_addresses() == ["pending (new)".to_string()]));
    assert!(routes
        .iter()
        .any(|r| r.dest_peer() == direct && r.dest_addresses() == [physical(&direct)]));
}

#[test]
fn test_local_route_and_resolver_switch() {
    let fx = create_fixture();
    let local = fx.control.local_route();
    assert_eq!(local.dest_peer(), fx.local);
    assert_eq!(local.dest_addresses(), &["tcp://10.0.0.1:9701".to_string()]);

    assert!(fx.control.use_route_resolver());
    fx.control.disable_route_resolver();
    assert!(!fx.control.use_route_resolver());
    fx.control.enable_route_resolver();
    assert!(fx.control.use_route_resolver());
}

// ----------------------------------------------------------------------------
// Flooding Over Router Messengers
// ----------------------------------------------------------------------------

#[test]
fn test_walk_uses_router_messengers() {
    let fx = create_fixture();
    let propagator = MessengerPropagator::new(fx.local, fx.router.clone());
    let peers = [random_peer(), random_peer()];
    for peer in peers {
        propagator.add_peer(peer);
    }

    let msg: Arc<Message> = Arc::new(text_message("flood"));
    propagator
        .walk(&msg, WIRE_SERVICE_NAME, "pipe-param", 200)
        .unwrap();

    let transports = fx.factory.transports.lock();
    for peer in peers {
        let transport = transports.get(&pid_to_addr(&peer)).unwrap();
        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0.service(), Some(WIRE_SERVICE_NAME));
        assert_eq!(sent[0].0.param(), Some("pipe-param"));
        assert_eq!(payload(&sent[0].1).as_deref(), Some("flood"));
    }
}

#[test]
fn test_shutdown_closes_router_messengers() {
    let fx = create_fixture();
    let peer = random_peer();
    fx.control.add_route(direct_route(peer));
    let messenger = fx.router.get_cached_messenger(&pid_to_addr(&peer)).unwrap();

    fx.router.shutdown();
    assert!(messenger.is_closed());
    assert!(!fx.router.is_local_route(&peer));
}
