//! Error types for the wirenet substrate
//!
//! This module contains the error taxonomy shared by the core and runtime
//! crates: transport failures, messenger failures, pipe failures, group
//! registry violations, state machine violations, and the `WirenetError`
//! type that unifies them all.
//!
//! Protocol-level discards (missing flood header, loopback, duplicates) are
//! not errors and never appear here; route operations report `RouteStatus`
//! codes instead of failing.

use std::io;

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Failures reported by a physical transport primitive
///
/// `Clone` so that a single failure can be raised to a blocking caller and
/// attached to a message as its outcome at the same time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed to {destination}: {reason}")]
    ConnectionFailed { destination: String, reason: String },
    #[error("Network I/O error ({kind:?}): {message}")]
    Io { kind: io::ErrorKind, message: String },
    #[error("Send failed: {reason}")]
    SendFailed { reason: String },
    #[error("Destination unreachable: {destination}")]
    Unreachable { destination: String },
    #[error("Transport shutdown: {reason}")]
    Shutdown { reason: String },
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        TransportError::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Failures of a messenger send
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessengerError {
    /// The messenger no longer accepts messages
    #[error("Messenger is closed")]
    Closed,
    /// The transport failed while sending this message
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),
    /// The message was dispatched but no outcome was recorded for it
    #[error("Unknown error while sending")]
    Unknown,
    /// The transport shut the messenger down while the message was pending
    #[error("Messenger unexpectedly closed")]
    UnexpectedlyClosed,
}

/// Failures of pipe operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipeError {
    #[error("Pipe is closed")]
    Closed,
    #[error("Message has no flood header")]
    MissingHeader,
    #[error("Invalid flood header: {reason}")]
    InvalidHeader { reason: String },
    #[error("Propagation failed: {0}")]
    Transport(#[from] TransportError),
    #[error("Messenger failure: {0}")]
    Messenger(#[from] MessengerError),
}

/// Failures of group lifecycle and service table operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GroupError {
    #[error("Service not found: {name}")]
    ServiceNotFound { name: String },
    #[error("Violation: {reason}")]
    Violation { reason: String },
    #[error("Group already instantiated: {group_id}")]
    AlreadyInstantiated { group_id: String },
    #[error("Service {name} failed: {reason}")]
    ServiceFailed { name: String, reason: String },
}

/// State machine violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateTransitionError {
    /// The event is not accepted in the current state
    #[error("Invalid transition from {from_state} on event {event}")]
    InvalidTransition {
        from_state: &'static str,
        event: &'static str,
    },
}

// ----------------------------------------------------------------------------
// Main Error Type
// ----------------------------------------------------------------------------

/// Umbrella error for the wirenet substrate
#[derive(Debug, thiserror::Error)]
pub enum WirenetError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Messenger error: {0}")]
    Messenger(#[from] MessengerError),

    #[error("Pipe error: {0}")]
    Pipe(#[from] PipeError),

    #[error("Group error: {0}")]
    Group(#[from] GroupError),

    #[error("State transition error: {0}")]
    StateTransition(#[from] StateTransitionError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Malformed identifier or address text
    #[error("Invalid identifier: {reason}")]
    InvalidId { reason: String },

    /// Configuration error
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl WirenetError {
    /// Create a configuration error with a reason
    pub fn config_error<T: Into<String>>(reason: T) -> Self {
        WirenetError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create an invalid identifier error with a reason
    pub fn invalid_id<T: Into<String>>(reason: T) -> Self {
        WirenetError::InvalidId {
            reason: reason.into(),
        }
    }

    /// Create an invalid flood header error with a reason
    pub fn invalid_header<T: Into<String>>(reason: T) -> Self {
        WirenetError::Pipe(PipeError::InvalidHeader {
            reason: reason.into(),
        })
    }

    /// Create a transport connection failed error
    pub fn connection_failed<D: Into<String>, R: Into<String>>(destination: D, reason: R) -> Self {
        WirenetError::Transport(TransportError::ConnectionFailed {
            destination: destination.into(),
            reason: reason.into(),
        })
    }

    /// Create a group violation error
    pub fn violation<T: Into<String>>(reason: T) -> Self {
        WirenetError::Group(GroupError::Violation {
            reason: reason.into(),
        })
    }
}

impl TransportError {
    /// Create a send failure with a reason
    pub fn send_failed<T: Into<String>>(reason: T) -> Self {
        TransportError::SendFailed {
            reason: reason.into(),
        }
    }
}

impl GroupError {
    /// Create a service not found error
    pub fn service_not_found<T: Into<String>>(name: T) -> Self {
        GroupError::ServiceNotFound { name: name.into() }
    }

    /// Create a violation error
    pub fn violation<T: Into<String>>(reason: T) -> Self {
        GroupError::Violation {
            reason: reason.into(),
        }
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = std::result::Result<T, WirenetError>;
pub type WirenetResult<T> = Result<T>;
