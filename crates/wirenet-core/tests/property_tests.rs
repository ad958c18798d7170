//! Property-based tests for peer view iteration, duplicate suppression and
//! identifier encodings

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use proptest::prelude::*;
use wirenet_core::{
    protocol::{PeerViewStrategy, SeenMessageCache, SequentialStrategy},
    EndpointAddress, PeerGroupId, PeerId, PipeId, WireHeader,
};

/// Generate arbitrary PeerId for property tests
fn arb_peer_id() -> impl Strategy<Value = PeerId> {
    (any::<[u8; 16]>(), any::<[u8; 16]>()).prop_map(|(g, v)| PeerId::from_parts(g, v))
}

/// Generate arbitrary ordinary group ids
fn arb_group_id() -> impl Strategy<Value = PeerGroupId> {
    (any::<[u8; 16]>(), any::<[u8; 16]>())
        .prop_map(|(group, parent)| PeerGroupId::Group { group, parent })
}

/// Generate distinct message ids
fn arb_distinct_ids(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::hash_set("[a-z0-9]{1,12}", 1..max)
        .prop_map(|set| set.into_iter().collect())
}

proptest! {
    /// Property: without mutation, a full pass visits every element exactly
    /// once in ascending order, then repeats
    #[test]
    fn sequential_strategy_visits_each_once(peers in prop::collection::btree_set(arb_peer_id(), 0..40)) {
        let view = Arc::new(Mutex::new(peers.clone()));
        let mut strategy = SequentialStrategy::new(view);

        if peers.is_empty() {
            prop_assert_eq!(strategy.next(), None);
        } else {
            let first_pass: Vec<_> = (0..peers.len()).filter_map(|_| strategy.next()).collect();
            let expected: Vec<_> = peers.iter().copied().collect();
            prop_assert_eq!(&first_pass, &expected);

            // wraps back to the smallest element
            prop_assert_eq!(strategy.next(), peers.iter().next().copied());
        }
    }

    /// Property: concurrent removal never breaks iteration and never returns
    /// a removed element
    #[test]
    fn sequential_strategy_tolerates_removal(
        peers in prop::collection::btree_set(0u32..1000, 1..40),
        steps in 1usize..20,
        victim_index in any::<prop::sample::Index>(),
    ) {
        let view = Arc::new(Mutex::new(peers.clone()));
        let mut strategy = SequentialStrategy::new(view.clone());
        for _ in 0..steps {
            strategy.next();
        }

        let victim = *victim_index.get(&peers.iter().copied().collect::<Vec<_>>());
        view.lock().remove(&victim);
        let remaining: BTreeSet<u32> = view.lock().clone();

        match strategy.next() {
            Some(next) => prop_assert!(remaining.contains(&next)),
            None => prop_assert!(remaining.is_empty()),
        }
    }

    /// Property: inserting N+1 distinct ids into a cache of capacity N forgets
    /// the first while the most recent N are still duplicates
    #[test]
    fn seen_cache_is_strict_fifo(ids in arb_distinct_ids(64)) {
        prop_assume!(ids.len() >= 2);
        let capacity = ids.len() - 1;
        let mut cache = SeenMessageCache::new(capacity);

        for id in &ids {
            prop_assert!(cache.record(id));
        }

        prop_assert!(!cache.contains(&ids[0]));
        for id in &ids[1..] {
            prop_assert!(cache.contains(id));
        }
        prop_assert_eq!(cache.len(), capacity);
    }

    /// Property: a repeated id is a duplicate while within capacity
    #[test]
    fn seen_cache_detects_repeats(ids in arb_distinct_ids(32)) {
        let mut cache = SeenMessageCache::new(ids.len());
        for id in &ids {
            cache.record(id);
        }
        for id in &ids {
            prop_assert!(!cache.record(id));
        }
    }

    /// Property: identifiers survive their textual form
    #[test]
    fn identifiers_parse_back(group in arb_group_id(), peer in arb_peer_id()) {
        prop_assert_eq!(group.to_string().parse::<PeerGroupId>().unwrap(), group);
        prop_assert_eq!(peer.to_string().parse::<PeerId>().unwrap(), peer);
    }

    /// Property: parent is None iff the parent field is all zero
    #[test]
    fn parent_is_none_iff_zero(group in any::<[u8; 16]>(), parent in any::<[u8; 16]>()) {
        let id = PeerGroupId::Group { group, parent };
        prop_assert_eq!(id.parent().is_none(), parent.iter().all(|b| *b == 0));
    }

    /// Property: addresses survive their textual form
    #[test]
    fn addresses_parse_back(
        proto in "[a-z]{1,8}",
        addr in "[a-z0-9.:]{1,20}",
        service in proptest::option::of("[A-Za-z:]{1,12}"),
        param in proptest::option::of("[a-z0-9/]{1,12}"),
    ) {
        let address = EndpointAddress::new(proto, addr)
            .with_service(service.as_deref(), param.as_deref());
        prop_assert_eq!(address.to_string().parse::<EndpointAddress>().unwrap(), address);
    }
}

#[test]
fn test_wire_header_carries_all_fields() {
    let group = PeerGroupId::DefaultNet;
    let origin = PeerId::new_random(&group);
    let relay = PeerId::new_random(&group);
    let header = WireHeader::new(PipeId::new_random(&group), "legacy-id".into(), 7, origin)
        .next_hop(relay);

    let bytes = header.to_json().unwrap();
    let back = WireHeader::from_json(&bytes).unwrap();
    assert_eq!(back.pipe_id, header.pipe_id);
    assert_eq!(back.msg_id, "legacy-id");
    assert_eq!(back.ttl, 6);
    assert_eq!(back.path.as_slice(), &[origin, relay]);
}
