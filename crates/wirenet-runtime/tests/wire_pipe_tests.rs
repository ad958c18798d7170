//! Wire pipe integration tests
//!
//! Flood header handling, loopback and duplicate suppression, relay
//! repropagation, listener registration and the output worker lifecycle.


use std::sync::Arc;
use std::time::{Duration, Instant};

use proptest::prelude::*;
use test_utils::{
    init_tracing, random_peer, random_pipe, text_message, wait_until, RecordingDirectory,
    RecordingDispatch, RecordingListener, RecordingRendezvous,
};
use wirenet_core::protocol::WireHeader;
use wirenet_core::{Message, PeerId, PipeError, PipeId, WirePipeConfig, WIRE_SERVICE_NAME};
use wirenet_runtime::{InputPipeListener, WirePipe, WirePipeContext, WorkerState};

struct Fixture {
    local: PeerId,
    pipe_id: PipeId,
    pipe: Arc<WirePipe>,
    rendezvous: Arc<RecordingRendezvous>,
    dispatch: Arc<RecordingDispatch>,
    directory: Arc<RecordingDirectory>,
}

impl Fixture {
    fn param(&self) -> String {
        self.pipe_id.to_string()
    }

    /// Deliver a flood message through endpoint dispatch
    fn deliver(&self, msg: Message) -> bool {
        self.dispatch.deliver(WIRE_SERVICE_NAME, &self.param(), msg)
    }

    fn flood(&self, src: PeerId, msg_id: &str, ttl: u32, text: &str) -> Message {
        let mut msg = text_message(text);
        WireHeader::new(self.pipe_id, msg_id.to_string(), ttl, src)
            .attach(&mut msg)
            .unwrap();
        msg
    }
}

fn create_fixture_with(rendezvous: Arc<RecordingRendezvous>, config: WirePipeConfig) -> Fixture {
    init_tracing();
    let local = random_peer();
    let pipe_id = random_pipe();
    let dispatch = RecordingDispatch::new();
    let directory = RecordingDirectory::new();

    let context = WirePipeContext {
        local_peer: local,
        rendezvous: rendezvous.clone(),
        dispatch: dispatch.clone(),
        directory: directory.clone(),
    };
    let pipe = WirePipe::new(pipe_id, context, config);

    Fixture {
        local,
        pipe_id,
        pipe,
        rendezvous,
        dispatch,
        directory,
    }
}

fn create_fixture(relay: bool) -> Fixture {
    create_fixture_with(RecordingRendezvous::new(relay), WirePipeConfig::testing())
}

fn as_input(listener: &Arc<RecordingListener>) -> Arc<dyn InputPipeListener> {
    listener.clone()
}

// ----------------------------------------------------------------------------
// Registration
// ----------------------------------------------------------------------------

#[test]
fn test_registration_follows_listener_count() {
    let fx = create_fixture(false);
    let first = as_input(&RecordingListener::new());
    let second = as_input(&RecordingListener::new());

    fx.pipe.register(first.clone());
    assert!(fx.dispatch.is_registered(WIRE_SERVICE_NAME, &fx.param()));
    assert_eq!(fx.directory.announcements(), vec![true]);

    fx.pipe.register(second.clone());
    assert_eq!(fx.pipe.listener_count(), 2);
    assert_eq!(fx.directory.announcements(), vec![true]);

    fx.pipe.forget(&first);
    assert!(fx.dispatch.is_registered(WIRE_SERVICE_NAME, &fx.param()));

    fx.pipe.forget(&second);
    assert!(!fx.dispatch.is_registered(WIRE_SERVICE_NAME, &fx.param()));
    assert_eq!(fx.directory.announcements(), vec![true, false]);

    // count never goes negative
    fx.pipe.forget(&second);
    assert_eq!(fx.pipe.listener_count(), 0);
    fx.pipe.register(first);
    assert_eq!(fx.directory.announcements(), vec![true, false, true]);
    fx.pipe.close();
}

// ----------------------------------------------------------------------------
// Incoming Messages
// ----------------------------------------------------------------------------

#[test]
fn test_non_relay_delivers_once() {
    let fx = create_fixture(false);
    let listener = RecordingListener::new();
    fx.pipe.register(as_input(&listener));
    let remote = random_peer();

    assert!(fx.deliver(fx.flood(remote, "m-1", 10, "hello")));
    assert!(fx.deliver(fx.flood(remote, "m-1", 10, "hello")));
    assert_eq!(listener.payloads(), vec!["hello".to_string()]);

    fx.deliver(fx.flood(remote, "m-2", 10, "again"));
    assert_eq!(listener.count(), 2);
    assert!(fx.rendezvous.calls().is_empty());
    fx.pipe.close();
}

#[test]
fn test_message_without_header_is_discarded() {
    let fx = create_fixture(false);
    let listener = RecordingListener::new();
    fx.pipe.register(as_input(&listener));

    fx.deliver(text_message("no header"));
    let mut garbled = text_message("bad header");
    garbled.replace_element("wirenet", "WireHeader", b"not json".to_vec());
    fx.deliver(garbled);

    assert_eq!(listener.count(), 0);
    fx.pipe.close();
}

#[test]
fn test_loopback_is_checked_before_dedup() {
    let fx = create_fixture(false);
    let listener = RecordingListener::new();
    fx.pipe.register(as_input(&listener));

    fx.deliver(fx.flood(fx.local, "m-1", 10, "mine"));
    assert_eq!(listener.count(), 0);

    // the loopback copy did not mark the id as seen
    fx.deliver(fx.flood(random_peer(), "m-1", 10, "relayed"));
    assert_eq!(listener.payloads(), vec!["relayed".to_string()]);
    fx.pipe.close();
}

#[test]
fn test_each_listener_gets_own_copy_and_failures_are_isolated() {
    let fx = create_fixture(false);
    let failing = RecordingListener::failing();
    let healthy = RecordingListener::new();
    fx.pipe.register(as_input(&failing));
    fx.pipe.register(as_input(&healthy));

    fx.deliver(fx.flood(random_peer(), "m-1", 10, "x"));
    assert_eq!(failing.count(), 1);
    assert_eq!(healthy.count(), 1);
    assert!(!Arc::ptr_eq(
        &failing.received.lock()[0],
        &healthy.received.lock()[0]
    ));
    fx.pipe.close();
}

// ----------------------------------------------------------------------------
// Relay Repropagation
// ----------------------------------------------------------------------------

#[test]
fn test_relay_repropagates_with_next_hop_header() {
    let fx = create_fixture(true);
    let listener = RecordingListener::new();
    fx.pipe.register(as_input(&listener));
    let remote = random_peer();

    fx.deliver(fx.flood(remote, "m-1", 5, "relay me"));
    assert!(wait_until(|| fx.rendezvous.calls().len() == 1));
    assert!(wait_until(|| listener.count() == 1));

    let call = &fx.rendezvous.calls()[0];
    assert!(call.peers.is_empty());
    assert_eq!(call.service, WIRE_SERVICE_NAME);
    assert_eq!(call.param, fx.param());
    assert_eq!(call.payload.as_deref(), Some("relay me"));

    let header = call.header.clone().unwrap();
    assert_eq!(header.ttl, 4);
    assert_eq!(header.msg_id, "m-1");
    assert_eq!(header.path.to_vec(), vec![remote, fx.local]);

    // duplicates are not repropagated
    fx.deliver(fx.flood(remote, "m-1", 5, "relay me"));
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(fx.rendezvous.calls().len(), 1);
    fx.pipe.close();
}

#[test]
fn test_relay_with_exhausted_ttl_only_delivers_locally() {
    let fx = create_fixture(true);
    let listener = RecordingListener::new();
    fx.pipe.register(as_input(&listener));

    fx.deliver(fx.flood(random_peer(), "m-1", 1, "last hop"));
    assert_eq!(listener.payloads(), vec!["last hop".to_string()]);
    assert_eq!(fx.pipe.repropagater().stats().enqueued, 0);
    assert!(fx.rendezvous.calls().is_empty());
    fx.pipe.close();
}

/// A stalled downstream fills the relay queue; further repropagation is
/// refused without holding up delivery
#[test]
fn test_relay_drops_repropagation_when_queue_full() {
    let mut config = WirePipeConfig::testing();
    config.output.queue_capacity = 1;
    let fx = create_fixture_with(RecordingRendezvous::gated_relay(), config);
    fx.pipe.register(as_input(&RecordingListener::new()));
    let remote = random_peer();

    assert!(fx.deliver(fx.flood(remote, "m-1", 5, "one")));
    assert!(wait_until(|| fx.rendezvous.calls().len() == 1));
    assert!(fx.deliver(fx.flood(remote, "m-2", 5, "two")));
    assert!(wait_until(|| fx.pipe.repropagater().stats().in_queue == 1));

    let started = Instant::now();
    assert!(fx.deliver(fx.flood(remote, "m-3", 5, "three")));
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(fx.pipe.repropagater().stats().enqueued, 2);

    fx.rendezvous.release();
    assert!(wait_until(|| fx.rendezvous.calls().len() == 2));
    std::thread::sleep(Duration::from_millis(50));
    let relayed: Vec<_> = fx
        .rendezvous
        .calls()
        .iter()
        .filter_map(|call| call.payload.clone())
        .collect();
    assert_eq!(relayed, vec!["one", "two"]);
    fx.pipe.close();
}

// ----------------------------------------------------------------------------
// Output Pipes
// ----------------------------------------------------------------------------

#[test]
fn test_output_pipe_floods_to_group() {
    let fx = create_fixture(false);
    let listener = RecordingListener::new();
    fx.pipe.register(as_input(&listener));

    let output = fx.pipe.create_output_pipe(Vec::new()).unwrap();
    output.send(&text_message("to all")).unwrap();

    assert!(wait_until(|| fx.rendezvous.calls().len() == 1));
    let call = &fx.rendezvous.calls()[0];
    assert!(call.peers.is_empty());
    assert_eq!(call.ttl, WirePipeConfig::default().default_ttl);

    let header = call.header.clone().unwrap();
    assert_eq!(header.ttl, WirePipeConfig::default().default_ttl);
    assert_eq!(header.src_peer(), Some(&fx.local));
    assert_eq!(listener.payloads(), vec!["to all".to_string()]);
    fx.pipe.close();
}

#[test]
fn test_output_pipe_to_explicit_peers() {
    let fx = create_fixture(false);
    let listener = RecordingListener::new();
    fx.pipe.register(as_input(&listener));
    let remote = random_peer();

    let remote_only = fx.pipe.create_output_pipe(vec![remote]).unwrap();
    remote_only.send(&text_message("remote")).unwrap();
    assert!(wait_until(|| fx.rendezvous.calls().len() == 1));

    let call = &fx.rendezvous.calls()[0];
    assert_eq!(call.peers, vec![remote]);
    assert_eq!(call.ttl, 1);
    assert_eq!(call.header.as_ref().map(|h| h.ttl), Some(1));
    assert_eq!(listener.count(), 0);

    let with_local = fx.pipe.create_output_pipe(vec![remote, fx.local]).unwrap();
    with_local.send(&text_message("both")).unwrap();
    assert!(wait_until(|| fx.rendezvous.calls().len() == 2));
    assert_eq!(listener.payloads(), vec!["both".to_string()]);
    fx.pipe.close();
}

#[test]
fn test_closed_pipe_refuses_output_pipes() {
    let fx = create_fixture(false);
    let listener = RecordingListener::new();
    fx.pipe.register(as_input(&listener));

    fx.pipe.close();
    fx.pipe.close();
    assert!(fx.pipe.is_closed());
    assert!(!fx.dispatch.is_registered(WIRE_SERVICE_NAME, &fx.param()));
    assert_eq!(fx.directory.announcements(), vec![true, false]);
    assert!(fx.pipe.repropagater().is_closed());
    assert!(matches!(
        fx.pipe.create_output_pipe(Vec::new()),
        Err(PipeError::Closed)
    ));
}

/// Three messages on a pipe whose relay is offline: the worker stays in
/// the send state, tries each in order, and exits only after lingering idle
#[test]
fn test_worker_survives_offline_relay() {
    let mut config = WirePipeConfig::testing();
    config.output.idle_linger = Duration::from_secs(1);
    let fx = create_fixture_with(RecordingRendezvous::offline_relay(), config);

    let output = fx.pipe.create_output_pipe(Vec::new()).unwrap();
    for text in ["A", "B", "C"] {
        assert_eq!(output.send(&text_message(text)), Ok(true));
    }

    assert!(wait_until(|| fx.rendezvous.calls().len() == 3));
    let order: Vec<_> = fx
        .rendezvous
        .calls()
        .iter()
        .filter_map(|call| call.payload.clone())
        .collect();
    assert_eq!(order, vec!["A", "B", "C"]);

    assert!(output.is_worker_running());
    assert_eq!(output.worker_state(), WorkerState::SendMessages);

    assert!(wait_until(|| !output.is_worker_running()));
    assert_eq!(output.worker_state(), WorkerState::SendMessages);
    let stats = output.stats();
    assert_eq!((stats.enqueued, stats.dequeued, stats.in_queue), (3, 3, 0));
    fx.pipe.close();
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Property: a flood from the local peer is discarded whatever the
    /// duplicate cache already holds
    #[test]
    fn loopback_discarded_regardless_of_cache(
        seen in prop::collection::vec("[a-z]{4,8}", 0..20),
        reuse_seen in any::<bool>(),
    ) {
        let fx = create_fixture(false);
        let listener = RecordingListener::new();
        fx.pipe.register(as_input(&listener));
        let remote = random_peer();

        for id in &seen {
            fx.deliver(fx.flood(remote, id, 10, "remote"));
        }
        let before = listener.count();

        let loop_id = match (reuse_seen, seen.first()) {
            (true, Some(id)) => id.clone(),
            _ => "loopback-only".to_string(),
        };
        fx.deliver(fx.flood(fx.local, &loop_id, 10, "mine"));

        prop_assert_eq!(listener.count(), before);
        fx.pipe.close();
    }
}
