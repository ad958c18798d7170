//! Wire propagation pipe
//!
//! Flood delivery of one logical pipe across a group. Incoming messages are
//! checked for a flood header, for loopback and for duplicates before local
//! listeners see them. A relay peer puts each fresh message back on the wire
//! through its own repropagation queue; the local listeners are reached when
//! the queue hands the message back to [`WirePipe::send_message`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};
use wirenet_core::protocol::{WireHeader, DIRECT_TTL};
use wirenet_core::{
    EndpointAddress, Message, PeerId, PipeError, PipeId, SeenMessageCache, WirePipeConfig,
};

use super::output::{NonBlockingWireOutputPipe, PropagationSink, SinkRef};
use crate::transport::{
    same_object, EndpointDispatch, EndpointListener, InputPipeListener, PipeDirectory,
    RendezvousService,
};

/// Collaborators a wire pipe talks to
#[derive(Clone)]
pub struct WirePipeContext {
    pub local_peer: PeerId,
    pub rendezvous: Arc<dyn RendezvousService>,
    pub dispatch: Arc<dyn EndpointDispatch>,
    pub directory: Arc<dyn PipeDirectory>,
}

#[derive(Default)]
struct ListenerTable {
    listeners: Vec<Arc<dyn InputPipeListener>>,
    count: usize,
}

/// Flood pipe shared by every local input pipe bound to one pipe id
pub struct WirePipe {
    pipe_id: PipeId,
    context: WirePipeContext,
    config: WirePipeConfig,
    seen: Mutex<SeenMessageCache>,
    listeners: Mutex<ListenerTable>,
    // serializes dispatch registration with the count transitions
    registration: Mutex<()>,
    closed: AtomicBool,
    repropagater: NonBlockingWireOutputPipe,
    this: Weak<WirePipe>,
}

impl WirePipe {
    pub fn new(pipe_id: PipeId, context: WirePipeContext, config: WirePipeConfig) -> Arc<Self> {
        info!(pipe = %pipe_id, peer = %context.local_peer.short(), "Creating wire pipe");

        Arc::new_cyclic(|this: &Weak<WirePipe>| {
            let sink: Weak<dyn PropagationSink> = this.clone();
            let repropagater = NonBlockingWireOutputPipe::new(
                pipe_id,
                context.local_peer,
                Vec::new(),
                SinkRef::Weak(sink),
                config.default_ttl,
                config.output.clone(),
            );

            Self {
                pipe_id,
                seen: Mutex::new(SeenMessageCache::new(config.seen_cache_capacity)),
                listeners: Mutex::new(ListenerTable::default()),
                registration: Mutex::new(()),
                closed: AtomicBool::new(false),
                repropagater,
                this: this.clone(),
                context,
                config,
            }
        })
    }

    pub fn pipe_id(&self) -> &PipeId {
        &self.pipe_id
    }

    pub fn local_peer(&self) -> &PeerId {
        &self.context.local_peer
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of live registrations
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().count
    }

    /// The queue used for relay repropagation
    pub fn repropagater(&self) -> &NonBlockingWireOutputPipe {
        &self.repropagater
    }

    fn dispatch_param(&self) -> String {
        self.pipe_id.to_string()
    }

    // ------------------------------------------------------------------------
    // Incoming
    // ------------------------------------------------------------------------

    /// Whether `msg_id` was already seen; records it otherwise
    fn is_duplicate(&self, msg_id: &str) -> bool {
        !self.seen.lock().record(msg_id)
    }

    fn process_with_header(
        &self,
        msg: &Arc<Message>,
        header: WireHeader,
        src: Option<&EndpointAddress>,
        dst: Option<&EndpointAddress>,
    ) {
        if header.src_peer() == Some(&self.context.local_peer) {
            debug!(pipe = %self.pipe_id, msg_id = %header.msg_id, "Loopback detected, discarding");
            return;
        }

        if self.is_duplicate(&header.msg_id) {
            debug!(pipe = %self.pipe_id, msg_id = %header.msg_id, "Discarding duplicate");
            return;
        }

        debug!(pipe = %self.pipe_id, msg_id = %header.msg_id, ttl = header.ttl, "Processing message");
        if self.context.rendezvous.is_rendezvous() {
            self.repropagate(msg, &header);
        } else {
            self.call_local_listeners(msg, src, dst);
        }
    }

    /// Put a fresh copy of `msg` back on the wire.
    ///
    /// A message that fails to enqueue is dropped; it is already marked seen
    /// and will not be repropagated if it arrives again.
    fn repropagate(&self, msg: &Arc<Message>, header: &WireHeader) {
        let next = header.next_hop(self.context.local_peer);
        if next.ttl == 0 {
            debug!(pipe = %self.pipe_id, msg_id = %header.msg_id, "TTL exhausted, delivering locally");
            self.call_local_listeners(msg, None, None);
            return;
        }

        let mut copy = msg.clone_message();
        if let Err(err) = next.attach(&mut copy) {
            warn!(pipe = %self.pipe_id, msg_id = %header.msg_id, %err, "Failure repropagating");
            return;
        }

        debug!(pipe = %self.pipe_id, msg_id = %header.msg_id, "Repropagating");
        match self.repropagater.enqueue(Arc::new(copy)) {
            Ok(true) => {}
            Ok(false) => warn!(
                pipe = %self.pipe_id,
                msg_id = %header.msg_id,
                "Failure repropagating, could not queue message"
            ),
            Err(err) => warn!(pipe = %self.pipe_id, msg_id = %header.msg_id, %err, "Failure repropagating"),
        }
    }

    /// Hand each registered listener its own copy of `msg`
    fn call_local_listeners(
        &self,
        msg: &Message,
        src: Option<&EndpointAddress>,
        dst: Option<&EndpointAddress>,
    ) {
        let listeners = self.listeners.lock().listeners.clone();
        for listener in listeners {
            let copy = Arc::new(msg.clone_message());
            if let Err(err) = listener.process_incoming_message(copy, src, dst) {
                error!(pipe = %self.pipe_id, %err, "Listener failed processing message");
            }
        }
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    /// Add a local input pipe listener.
    ///
    /// The first registration subscribes the pipe with endpoint dispatch and
    /// announces it to the directory.
    pub fn register(&self, listener: Arc<dyn InputPipeListener>) -> bool {
        let _registration = self.registration.lock();

        let first = {
            let mut table = self.listeners.lock();
            if !table.listeners.iter().any(|l| Arc::ptr_eq(l, &listener)) {
                table.listeners.push(listener);
            }
            table.count += 1;
            table.count == 1
        };

        if first {
            info!(pipe = %self.pipe_id, "Registering wire pipe");
            if let Some(this) = self.this.upgrade() {
                let endpoint: Arc<dyn EndpointListener> = this;
                if !self.context.dispatch.add_listener(
                    &self.config.service_name,
                    &self.dispatch_param(),
                    endpoint,
                ) {
                    warn!(pipe = %self.pipe_id, "Existing endpoint listener for pipe");
                }
            }
            self.context.directory.announce(&self.pipe_id, true);
        }
        true
    }

    /// Remove a local input pipe listener.
    ///
    /// The last removal unsubscribes from endpoint dispatch and withdraws the
    /// directory announcement. Forgetting with no registrations is a no-op.
    pub fn forget(&self, listener: &Arc<dyn InputPipeListener>) -> bool {
        let _registration = self.registration.lock();

        let last = {
            let mut table = self.listeners.lock();
            if table.count == 0 {
                warn!(pipe = %self.pipe_id, "Forget without registered listeners");
                return true;
            }
            table.listeners.retain(|l| !Arc::ptr_eq(l, listener));
            table.count -= 1;
            table.count == 0
        };

        if last {
            info!(pipe = %self.pipe_id, "Deregistering wire pipe");
            self.unsubscribe();
            self.context.directory.announce(&self.pipe_id, false);
        }
        true
    }

    fn unsubscribe(&self) {
        let service = &self.config.service_name;
        let param = self.dispatch_param();

        for _ in 0..2 {
            match self.context.dispatch.remove_listener(service, &param) {
                Some(removed) if same_object(&*removed, self) => return,
                _ => {}
            }
        }
        warn!(pipe = %self.pipe_id, "Endpoint dispatch did not remove this pipe");
    }

    /// Withdraw every registration and close the repropagation queue
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let registered = {
            let _registration = self.registration.lock();
            let mut table = self.listeners.lock();
            let registered = table.count > 0;
            table.listeners.clear();
            table.count = 0;
            registered
        };

        if registered {
            self.unsubscribe();
            self.context.directory.announce(&self.pipe_id, false);
        }
        self.repropagater.close();
        info!(pipe = %self.pipe_id, "Wire pipe closed");
    }

    /// Application output pipe sending through this pipe
    pub fn create_output_pipe(
        &self,
        peers: Vec<PeerId>,
    ) -> Result<NonBlockingWireOutputPipe, PipeError> {
        if self.is_closed() {
            return Err(PipeError::Closed);
        }

        let this = self.this.upgrade().ok_or(PipeError::Closed)?;
        let sink: Arc<dyn PropagationSink> = this;
        Ok(NonBlockingWireOutputPipe::new(
            self.pipe_id,
            self.context.local_peer,
            peers,
            SinkRef::Strong(sink),
            self.config.default_ttl,
            self.config.output.clone(),
        ))
    }
}

impl EndpointListener for WirePipe {
    fn process_incoming_message(
        &self,
        msg: Arc<Message>,
        src: Option<&EndpointAddress>,
        dst: Option<&EndpointAddress>,
    ) {
        let header = match WireHeader::from_message(&msg) {
            Ok(header) => header,
            Err(PipeError::MissingHeader) => {
                debug!(pipe = %self.pipe_id, "No wire header, discarding");
                return;
            }
            Err(err) => {
                debug!(pipe = %self.pipe_id, %err, "Bad wire header, discarding");
                return;
            }
        };

        self.process_with_header(&msg, header, src, dst);
    }
}

impl PropagationSink for WirePipe {
    /// Deliver locally when addressed, then flood or propagate to `peers`
    fn send_message(&self, msg: &Arc<Message>, peers: &[PeerId]) -> Result<(), PipeError> {
        if peers.is_empty() || peers.contains(&self.context.local_peer) {
            self.call_local_listeners(msg, None, None);
        }

        let service = &self.config.service_name;
        let param = self.dispatch_param();

        if peers.is_empty() {
            debug!(pipe = %self.pipe_id, "Propagating to whole group");
            self.context
                .rendezvous
                .walk(msg, service, &param, self.config.default_ttl)?;
        } else {
            debug!(pipe = %self.pipe_id, peers = peers.len(), "Propagating to peers");
            self.context
                .rendezvous
                .propagate(peers, msg, service, &param, DIRECT_TTL)?;
        }
        Ok(())
    }
}

impl Drop for WirePipe {
    fn drop(&mut self) {
        if !self.is_closed() {
            warn!(pipe = %self.pipe_id, "Wire pipe dropped without being closed");
            self.close();
        }
    }
}
