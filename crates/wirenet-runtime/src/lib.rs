//! Wirenet Runtime
//!
//! The threaded half of the wirenet substrate:
//! - `messenger`: the messenger state machine, blocking messengers, channel
//!   views and the canonical messenger cache with its idle reaper
//! - `pipe`: wire propagation pipes and their non-blocking output workers
//! - `rendezvous`: flood propagation over router-provided messengers
//! - `router`: direct, long and pending route tables and route control
//! - `group`: the group registry and reference-counted peer groups
//!
//! Collaborators outside the substrate (physical transports, endpoint
//! dispatch, pipe directory) are reached through the traits in `transport`.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod group;
pub mod messenger;
pub mod pipe;
pub mod rendezvous;
pub mod router;
pub mod transport;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use group::{GroupInterface, GroupRegistry, PeerGroup, Service};
pub use messenger::{
    BlockingMessenger, ChannelMessenger, DeferredAction, Messenger, MessengerCache,
    MessengerEvent, MessengerListener, MessengerState, Transition,
};
pub use pipe::{
    NonBlockingWireOutputPipe, PropagationSink, QueueStats, SinkRef, WirePipe, WirePipeContext,
    WorkerState,
};
pub use rendezvous::{MessengerPropagator, MessengerProvider};
pub use router::{
    EndpointRouter, MessengerFactory, PendingQuery, RouteAdvertiser, RouteControl,
};
pub use transport::{
    EndpointDispatch, EndpointListener, InputPipeListener, MessageTransport, PipeDirectory,
    RendezvousService,
};

// Re-export core types for convenience
pub use wirenet_core::{
    EndpointAddress, GroupError, Message, MessengerError, PeerGroupId, PeerId, PipeError, PipeId,
    RouteAdvertisement, RouteStatus, SendOutcome, TransportError, WirenetConfig, WirenetError,
};
