//! Messengers
//!
//! A messenger is the ability to send to one resolved destination, one
//! message at a time. [`BlockingMessenger`] turns a synchronous transport
//! primitive into blocking and non-blocking sends driven by the
//! [`MessengerState`] machine; [`ChannelMessenger`] is a view over a shared
//! messenger that rewrites the destination service; [`MessengerCache`] keeps
//! canonical messengers per destination and reaps idle ones.

pub mod blocking;
pub mod cache;
pub mod channel;
pub mod state;

pub use blocking::BlockingMessenger;
pub use cache::MessengerCache;
pub use channel::ChannelMessenger;
pub use state::{DeferredAction, MessengerEvent, MessengerState, Transition};

use std::sync::Arc;

use wirenet_core::{EndpointAddress, Message, MessengerError};

/// Common send contract of messengers and channel views
pub trait Messenger: Send + Sync {
    /// Send and wait for the outcome.
    ///
    /// Waits for the slot if a message is in flight. Fails with
    /// `MessengerError::Closed` once the messenger no longer accepts input.
    fn send_blocking(
        &self,
        msg: Arc<Message>,
        service: Option<&str>,
        param: Option<&str>,
    ) -> Result<(), MessengerError>;

    /// Send without waiting for a free slot.
    ///
    /// Returns `true` whenever the message took the slot; the outcome of the
    /// send itself is attached to the message. Returns `false` with an
    /// `Overflow` or `Failed(Closed)` outcome attached otherwise.
    fn send_non_blocking(&self, msg: Arc<Message>, service: Option<&str>, param: Option<&str>)
        -> bool;

    /// Orderly, owner-initiated close
    fn close(&self);

    fn state(&self) -> MessengerState;

    /// Whether the messenger reached a terminal state
    fn is_closed(&self) -> bool {
        self.state().is_terminal()
    }

    /// Messengers are born resolved; kept for callers written against
    /// resolving messengers
    fn resolve(&self) {}

    fn destination_address(&self) -> EndpointAddress;

    fn logical_destination_address(&self) -> Option<EndpointAddress>;
}

/// Observer of messenger state changes
pub trait MessengerListener: Send + Sync {
    fn state_changed(&self, state: MessengerState);
}

impl<F> MessengerListener for F
where
    F: Fn(MessengerState) + Send + Sync,
{
    fn state_changed(&self, state: MessengerState) {
        self(state)
    }
}
