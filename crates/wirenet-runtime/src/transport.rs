//! Collaborator traits
//!
//! The runtime drives external services only through these seams: the
//! physical transport behind a messenger, the rendezvous flood layer, the
//! endpoint dispatch table for incoming messages, and the pipe directory that
//! learns which pipes have local listeners.

use std::sync::Arc;

use wirenet_core::{EndpointAddress, Message, PeerId, PipeError, PipeId, TransportError};

// ----------------------------------------------------------------------------
// Physical Transport
// ----------------------------------------------------------------------------

/// One-message-at-a-time synchronous send primitive behind a messenger
pub trait MessageTransport: Send + Sync {
    /// Send one message to `dest`, returning once the transport accepted it
    fn send_message(&self, msg: &Message, dest: &EndpointAddress) -> Result<(), TransportError>;

    /// Whether the connection has been idle long enough to be torn down
    fn is_idle(&self) -> bool;

    /// Break the connection; an in-flight send fails
    fn close(&self);

    /// Logical address of the remote end, if known
    fn logical_destination(&self) -> Option<EndpointAddress>;
}

// ----------------------------------------------------------------------------
// Rendezvous Flood Transport
// ----------------------------------------------------------------------------

/// Flood layer used by wire pipes
pub trait RendezvousService: Send + Sync {
    /// Flood `msg` to the whole reachable group
    fn walk(
        &self,
        msg: &Arc<Message>,
        service: &str,
        param: &str,
        ttl: u32,
    ) -> Result<(), TransportError>;

    /// Flood `msg` to an explicit peer subset
    fn propagate(
        &self,
        peers: &[PeerId],
        msg: &Arc<Message>,
        service: &str,
        param: &str,
        ttl: u32,
    ) -> Result<(), TransportError>;

    /// Whether this peer relays floods for the group
    fn is_rendezvous(&self) -> bool;
}

// ----------------------------------------------------------------------------
// Incoming Dispatch
// ----------------------------------------------------------------------------

/// Receiver of messages addressed to a `(service, param)` pair
pub trait EndpointListener: Send + Sync {
    fn process_incoming_message(
        &self,
        msg: Arc<Message>,
        src: Option<&EndpointAddress>,
        dst: Option<&EndpointAddress>,
    );
}

/// Table routing incoming messages to listeners
pub trait EndpointDispatch: Send + Sync {
    /// Register `listener`; `false` if the pair is already taken
    fn add_listener(&self, service: &str, param: &str, listener: Arc<dyn EndpointListener>)
        -> bool;

    /// Remove and return the listener registered for the pair
    fn remove_listener(&self, service: &str, param: &str) -> Option<Arc<dyn EndpointListener>>;
}

/// Application-side receiver of pipe messages
pub trait InputPipeListener: Send + Sync {
    fn process_incoming_message(
        &self,
        msg: Arc<Message>,
        src: Option<&EndpointAddress>,
        dst: Option<&EndpointAddress>,
    ) -> Result<(), PipeError>;
}

// ----------------------------------------------------------------------------
// Pipe Directory
// ----------------------------------------------------------------------------

/// Directory learning which pipes have listeners on this peer
pub trait PipeDirectory: Send + Sync {
    /// Announce presence (`true`) or absence (`false`) of local listeners
    fn announce(&self, pipe_id: &PipeId, present: bool);
}

/// Whether two trait objects are the same allocation
pub(crate) fn same_object<A: ?Sized, B: ?Sized>(a: &A, b: &B) -> bool {
    core::ptr::eq(a as *const A as *const (), b as *const B as *const ())
}
