//! Rendezvous propagation over messengers
//!
//! [`MessengerPropagator`] floods a message by handing a fresh copy to the
//! messenger of every peer in the shared peer view. Each walk starts where
//! the previous one stopped so no peer is always served first.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};
use wirenet_core::protocol::SharedPeerView;
use wirenet_core::{Message, PeerId, SequentialStrategy, TransportError};

use crate::messenger::Messenger;
use crate::transport::RendezvousService;

/// Source of messengers for peers
pub trait MessengerProvider: Send + Sync {
    fn messenger_for(&self, peer: &PeerId) -> Option<Arc<dyn Messenger>>;
}

/// Flood transport sending through provider messengers
pub struct MessengerPropagator {
    local_peer: PeerId,
    view: SharedPeerView<PeerId>,
    strategy: Mutex<SequentialStrategy<PeerId>>,
    provider: Arc<dyn MessengerProvider>,
    relay: AtomicBool,
}

impl MessengerPropagator {
    pub fn new(local_peer: PeerId, provider: Arc<dyn MessengerProvider>) -> Self {
        let view: SharedPeerView<PeerId> = Arc::new(Mutex::new(BTreeSet::new()));
        Self {
            local_peer,
            strategy: Mutex::new(SequentialStrategy::new(view.clone())),
            view,
            provider,
            relay: AtomicBool::new(false),
        }
    }

    /// Shared peer view walked by floods
    pub fn view(&self) -> &SharedPeerView<PeerId> {
        &self.view
    }

    pub fn add_peer(&self, peer: PeerId) -> bool {
        if peer == self.local_peer {
            return false;
        }
        self.view.lock().insert(peer)
    }

    pub fn remove_peer(&self, peer: &PeerId) -> bool {
        self.view.lock().remove(peer)
    }

    pub fn peers(&self) -> Vec<PeerId> {
        self.view.lock().iter().copied().collect()
    }

    pub fn set_rendezvous(&self, relay: bool) {
        self.relay.store(relay, Ordering::SeqCst);
    }

    /// Send a copy of `msg` to each target; fails only if every target failed
    fn send_to(
        &self,
        targets: &[PeerId],
        msg: &Arc<Message>,
        service: &str,
        param: &str,
    ) -> Result<(), TransportError> {
        let mut delivered = 0usize;
        let mut attempted = 0usize;

        for peer in targets.iter().filter(|p| **p != self.local_peer) {
            attempted += 1;
            let Some(messenger) = self.provider.messenger_for(peer) else {
                debug!(peer = %peer.short(), "No messenger for peer");
                continue;
            };

            let copy = Arc::new(msg.clone_message());
            match messenger.send_blocking(copy, Some(service), Some(param)) {
                Ok(()) => {
                    trace!(peer = %peer.short(), "Propagated message");
                    delivered += 1;
                }
                Err(err) => warn!(peer = %peer.short(), %err, "Failed propagating to peer"),
            }
        }

        if attempted > 0 && delivered == 0 {
            return Err(TransportError::Unreachable {
                destination: format!("{} peers", attempted),
            });
        }
        Ok(())
    }
}

impl RendezvousService for MessengerPropagator {
    fn walk(
        &self,
        msg: &Arc<Message>,
        service: &str,
        param: &str,
        ttl: u32,
    ) -> Result<(), TransportError> {
        if ttl == 0 {
            return Ok(());
        }
        let round = self.strategy.lock().round();
        debug!(peers = round.len(), ttl, "Walking peer view");
        self.send_to(&round, msg, service, param)
    }

    fn propagate(
        &self,
        peers: &[PeerId],
        msg: &Arc<Message>,
        service: &str,
        param: &str,
        ttl: u32,
    ) -> Result<(), TransportError> {
        if ttl == 0 {
            return Ok(());
        }
        self.send_to(peers, msg, service, param)
    }

    fn is_rendezvous(&self) -> bool {
        self.relay.load(Ordering::SeqCst)
    }
}
