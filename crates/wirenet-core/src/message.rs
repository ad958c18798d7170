//! Messages and send outcomes
//!
//! A message is an ordered list of named elements. Messages travel as
//! `Arc<Message>` once handed to a messenger; a messenger reports how the send
//! went by attaching a [`SendOutcome`] to the message itself, and callers
//! match outcomes to their own message by pointer identity (`Arc::ptr_eq`),
//! never by content.

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::errors::MessengerError;

// ----------------------------------------------------------------------------
// Send Outcome
// ----------------------------------------------------------------------------

/// Completion indicator attached to a message by a messenger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The transport accepted the message
    Success,
    /// The messenger was saturated and rejected the message
    Overflow,
    /// The send failed, or the messenger was closed
    Failed(MessengerError),
}

impl SendOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SendOutcome::Success)
    }

    pub fn is_overflow(&self) -> bool {
        matches!(self, SendOutcome::Overflow)
    }

    /// The failure, if any
    pub fn failure(&self) -> Option<&MessengerError> {
        match self {
            SendOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

// ----------------------------------------------------------------------------
// Message Elements
// ----------------------------------------------------------------------------

/// One named element of a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageElement {
    pub namespace: String,
    pub name: String,
    pub data: Vec<u8>,
}

// ----------------------------------------------------------------------------
// Message
// ----------------------------------------------------------------------------

/// An ordered collection of named elements plus an outcome side-channel
#[derive(Debug, Default)]
pub struct Message {
    elements: SmallVec<[MessageElement; 4]>,
    outcome: Mutex<Option<SendOutcome>>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Message::replace_element`]
    pub fn with_element<N: Into<String>, E: Into<String>>(
        mut self,
        namespace: N,
        name: E,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        self.replace_element(namespace, name, data);
        self
    }

    /// Add or replace the element `(namespace, name)`, returning the previous data.
    ///
    /// A replaced element keeps its position.
    pub fn replace_element<N: Into<String>, E: Into<String>>(
        &mut self,
        namespace: N,
        name: E,
        data: impl Into<Vec<u8>>,
    ) -> Option<Vec<u8>> {
        let namespace = namespace.into();
        let name = name.into();
        let data = data.into();

        if let Some(existing) = self
            .elements
            .iter_mut()
            .find(|e| e.namespace == namespace && e.name == name)
        {
            return Some(core::mem::replace(&mut existing.data, data));
        }

        self.elements.push(MessageElement {
            namespace,
            name,
            data,
        });
        None
    }

    /// Remove the element `(namespace, name)`
    pub fn remove_element(&mut self, namespace: &str, name: &str) -> Option<Vec<u8>> {
        let index = self
            .elements
            .iter()
            .position(|e| e.namespace == namespace && e.name == name)?;
        Some(self.elements.remove(index).data)
    }

    /// Data of the element `(namespace, name)`
    pub fn element(&self, namespace: &str, name: &str) -> Option<&[u8]> {
        self.elements
            .iter()
            .find(|e| e.namespace == namespace && e.name == name)
            .map(|e| e.data.as_slice())
    }

    pub fn elements(&self) -> impl Iterator<Item = &MessageElement> {
        self.elements.iter()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Copy of the elements with a fresh identity and no outcome
    pub fn clone_message(&self) -> Message {
        Message {
            elements: self.elements.clone(),
            outcome: Mutex::new(None),
        }
    }

    /// Attach a send outcome, replacing any earlier one
    pub fn set_outcome(&self, outcome: SendOutcome) {
        *self.outcome.lock() = Some(outcome);
    }

    /// The outcome attached by the last messenger that handled this message
    pub fn outcome(&self) -> Option<SendOutcome> {
        self.outcome.lock().clone()
    }

    pub fn clear_outcome(&self) {
        *self.outcome.lock() = None;
    }
}
