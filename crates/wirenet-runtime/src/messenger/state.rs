//! Messenger State Machine
//!
//! Pure transition function for a messenger. Each transition yields the new
//! state, the synchronous actions the messenger must apply (close input,
//! close output, fail the pending message) and at most one deferred action
//! that must run after the state lock is released.

use core::fmt;
use serde::{Deserialize, Serialize};
use wirenet_core::StateTransitionError;

// ----------------------------------------------------------------------------
// States and Events
// ----------------------------------------------------------------------------

/// Messenger lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessengerState {
    /// Connected, no message in flight
    Connected,
    /// One message in flight
    Sending,
    /// Transport reported the connection lost while idle
    Disconnected,
    /// Connection lost, reconnection pending
    Reconnecting,
    /// Input closed, waiting for the in-flight message
    Closing,
    /// Closed by its owner or the transport (terminal)
    Closed,
    /// Failed for good (terminal)
    Broken,
}

/// Input to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessengerEvent {
    /// A message was stored in the slot
    Saturated,
    /// The in-flight message was sent
    Idle,
    /// The transport failed, or a connection attempt failed
    Down,
    /// Owner-initiated close
    Close,
    /// Transport-initiated close
    Shutdown,
}

/// Work to perform once the state lock is released
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeferredAction {
    #[default]
    None,
    /// Hand the pending message to the transport
    Send,
    /// (Re)establish the connection
    Connect,
}

// ----------------------------------------------------------------------------
// Transition Results
// ----------------------------------------------------------------------------

/// Result of a state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub new_state: MessengerState,
    pub deferred: DeferredAction,
    /// Stop accepting new messages
    pub close_input: bool,
    /// Break the transport
    pub close_output: bool,
    /// Fail the pending message, if any
    pub fail_all: bool,
}

impl Transition {
    fn to(new_state: MessengerState) -> Self {
        Self {
            new_state,
            deferred: DeferredAction::None,
            close_input: false,
            close_output: false,
            fail_all: false,
        }
    }

    fn with(mut self, deferred: DeferredAction) -> Self {
        self.deferred = deferred;
        self
    }

    fn closing(mut self) -> Self {
        self.close_input = true;
        self.close_output = true;
        self
    }

    fn failing(mut self) -> Self {
        self.fail_all = true;
        self
    }
}

// ----------------------------------------------------------------------------
// State Machine Implementation
// ----------------------------------------------------------------------------

impl MessengerState {
    /// Get current state name for logging
    pub fn state_name(&self) -> &'static str {
        match self {
            MessengerState::Connected => "Connected",
            MessengerState::Sending => "Sending",
            MessengerState::Disconnected => "Disconnected",
            MessengerState::Reconnecting => "Reconnecting",
            MessengerState::Closing => "Closing",
            MessengerState::Closed => "Closed",
            MessengerState::Broken => "Broken",
        }
    }

    /// Whether no further transitions can happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, MessengerState::Closed | MessengerState::Broken)
    }

    /// Whether a message is in flight or awaiting connection
    pub fn is_saturated(&self) -> bool {
        matches!(
            self,
            MessengerState::Sending | MessengerState::Reconnecting | MessengerState::Closing
        )
    }

    /// Process an event and compute the transition
    pub fn transition(self, event: MessengerEvent) -> Result<Transition, StateTransitionError> {
        use MessengerEvent::*;
        use MessengerState::*;

        let transition = match (self, event) {
            // Terminal states ignore everything
            (Closed, _) | (Broken, _) => Transition::to(self),

            (Connected, Saturated) => Transition::to(Sending).with(DeferredAction::Send),
            (Connected, Down) => Transition::to(Disconnected),
            (Connected, Close) => Transition::to(Closed).closing(),
            (Connected, Shutdown) => Transition::to(Closed).closing().failing(),

            (Sending, Idle) => Transition::to(Connected),
            (Sending, Down) => Transition::to(Reconnecting).with(DeferredAction::Connect),
            (Sending, Close) => Transition::to(Closing).closing(),
            (Sending, Shutdown) => Transition::to(Closing).closing().failing(),

            (Disconnected, Saturated) => {
                Transition::to(Reconnecting).with(DeferredAction::Connect)
            }
            (Disconnected, Close) => Transition::to(Closed).closing(),
            (Disconnected, Shutdown) => Transition::to(Closed).closing().failing(),

            (Reconnecting, Down) => Transition::to(Broken).closing().failing(),
            (Reconnecting, Close) => Transition::to(Closing).closing(),
            (Reconnecting, Shutdown) => Transition::to(Closing).closing().failing(),

            (Closing, Idle) => Transition::to(Closed),
            (Closing, Down) => Transition::to(Closed).failing(),
            (Closing, Close) | (Closing, Shutdown) => Transition::to(Closing),

            (from, event) => {
                return Err(StateTransitionError::InvalidTransition {
                    from_state: from.state_name(),
                    event: event.event_name(),
                })
            }
        };

        Ok(transition)
    }
}

impl MessengerEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            MessengerEvent::Saturated => "Saturated",
            MessengerEvent::Idle => "Idle",
            MessengerEvent::Down => "Down",
            MessengerEvent::Close => "Close",
            MessengerEvent::Shutdown => "Shutdown",
        }
    }
}

impl fmt::Display for MessengerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.state_name())
    }
}
