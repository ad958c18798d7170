//! Blocking Messenger
//!
//! Wraps a synchronous, one-message-at-a-time [`MessageTransport`] with a
//! single message slot guarded by the state lock. Every event runs the state
//! machine under the lock and latches at most one deferred action; the caller
//! releases the lock, breaks the transport if asked to, notifies listeners and
//! only then performs the action. Transport calls therefore never happen
//! while the state lock is held.
//!
//! Outcomes are matched to callers by message identity: the caller whose
//! message still occupies the slot after the deferred action collects the
//! recorded failure; if the slot was emptied (or reused by another sender),
//! the send succeeded.

use core::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};
use wirenet_core::{
    EndpointAddress, Message, MessengerConfig, MessengerError, PeerGroupId, SendOutcome,
};

use super::channel::ChannelMessenger;
use super::state::{DeferredAction, MessengerEvent, MessengerState};
use super::{Messenger, MessengerListener};
use crate::transport::MessageTransport;

// ----------------------------------------------------------------------------
// Slot and Lock-Protected State
// ----------------------------------------------------------------------------

/// The message currently owned by the messenger
struct PendingMessage {
    msg: Arc<Message>,
    service: Option<String>,
    param: Option<String>,
    /// Set at most once per pending message
    failure: Option<MessengerError>,
}

struct MessengerInner {
    state: MessengerState,
    pending: Option<PendingMessage>,
    input_closed: bool,
    deferred: DeferredAction,
}

/// What an event left to do once the lock is released
#[must_use]
struct EventOutcome {
    action: DeferredAction,
    close_output: bool,
    state: MessengerState,
}

// ----------------------------------------------------------------------------
// Blocking Messenger
// ----------------------------------------------------------------------------

/// Messenger over a synchronous transport primitive
pub struct BlockingMessenger {
    home_group: PeerGroupId,
    destination: EndpointAddress,
    self_destruct: bool,
    transport: Arc<dyn MessageTransport>,
    inner: Mutex<MessengerInner>,
    slot_freed: Condvar,
    listeners: Mutex<Vec<Arc<dyn MessengerListener>>>,
}

impl BlockingMessenger {
    /// Create a connected messenger for `destination`
    pub fn new(
        home_group: PeerGroupId,
        destination: EndpointAddress,
        transport: Arc<dyn MessageTransport>,
        config: &MessengerConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            home_group,
            destination,
            self_destruct: config.self_destruct,
            transport,
            inner: Mutex::new(MessengerInner {
                state: MessengerState::Connected,
                pending: None,
                input_closed: false,
                deferred: DeferredAction::None,
            }),
            slot_freed: Condvar::new(),
            listeners: Mutex::new(Vec::new()),
        })
    }

    /// Group this messenger was created in
    pub fn home_group(&self) -> &PeerGroupId {
        &self.home_group
    }

    /// Whether the messenger may be closed once its transport is idle
    pub fn self_destructs(&self) -> bool {
        self.self_destruct
    }

    /// Idleness as reported by the transport
    pub fn is_idle(&self) -> bool {
        self.transport.is_idle()
    }

    /// Destination narrowed to `service`/`param`
    pub fn dest_address_to_use(&self, service: Option<&str>, param: Option<&str>) -> EndpointAddress {
        self.destination.with_service(service, param)
    }

    /// View of this messenger sending to a fixed service.
    ///
    /// A redirection equal to the home group is ignored.
    pub fn channel(
        self: &Arc<Self>,
        redirection: Option<&PeerGroupId>,
        service: Option<&str>,
        param: Option<&str>,
    ) -> ChannelMessenger {
        let redirection = redirection.filter(|group| **group != self.home_group).copied();
        ChannelMessenger::new(self.clone(), redirection, service, param)
    }

    pub fn register_listener(&self, listener: Arc<dyn MessengerListener>) {
        self.listeners.lock().push(listener);
    }

    /// Remove a listener, returning `true` if it was registered
    pub fn unregister_listener(&self, listener: &Arc<dyn MessengerListener>) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    /// Transport-initiated close; a pending message fails as unexpectedly closed
    pub fn shutdown(&self) {
        let outcome = {
            let mut inner = self.inner.lock();
            self.event_called(&mut inner, MessengerEvent::Shutdown)
        };
        self.finish_event(outcome);
    }

    /// Transport lost its connection. An idle messenger becomes
    /// `Disconnected`; nothing reconnects, so the next send breaks it.
    pub fn connection_lost(&self) {
        let outcome = {
            let mut inner = self.inner.lock();
            self.event_called(&mut inner, MessengerEvent::Down)
        };
        self.finish_event(outcome);
    }

    // ------------------------------------------------------------------------
    // Event plumbing
    // ------------------------------------------------------------------------

    /// Run `event` through the state machine. Must be called with the lock held.
    fn event_called(&self, inner: &mut MessengerInner, event: MessengerEvent) -> EventOutcome {
        let from = inner.state;
        let mut close_output = false;

        match from.transition(event) {
            Ok(transition) => {
                inner.state = transition.new_state;
                if transition.close_input {
                    inner.input_closed = true;
                }
                if transition.fail_all {
                    Self::fail_all(inner);
                }
                if transition.deferred != DeferredAction::None {
                    inner.deferred = transition.deferred;
                }
                close_output = transition.close_output;

                if from != transition.new_state {
                    debug!(
                        destination = %self.destination,
                        from = from.state_name(),
                        to = transition.new_state.state_name(),
                        event = event.event_name(),
                        "Messenger state change"
                    );
                }
            }
            Err(err) => {
                warn!(destination = %self.destination, %err, "Ignoring messenger event");
            }
        }

        let action = core::mem::take(&mut inner.deferred);
        self.slot_freed.notify_all();

        EventOutcome {
            action,
            close_output,
            state: inner.state,
        }
    }

    fn fail_all(inner: &mut MessengerInner) {
        if let Some(pending) = inner.pending.as_mut() {
            if pending.failure.is_none() {
                pending.failure = Some(MessengerError::UnexpectedlyClosed);
            }
        }
    }

    /// Everything an event requires once the lock is released
    fn finish_event(&self, outcome: EventOutcome) {
        if outcome.close_output {
            self.transport.close();
        }
        self.notify_change(outcome.state);
        self.perform_deferred_action(outcome.action);
    }

    fn notify_change(&self, state: MessengerState) {
        let listeners = self.listeners.lock().clone();
        for listener in listeners {
            listener.state_changed(state);
        }
    }

    fn perform_deferred_action(&self, action: DeferredAction) {
        match action {
            DeferredAction::None => {}
            DeferredAction::Send => self.send_it(),
            DeferredAction::Connect => self.cant_connect(),
        }
    }

    /// Hand the pending message to the transport
    fn send_it(&self) {
        let (msg, dest) = {
            let inner = self.inner.lock();
            match inner.pending.as_ref() {
                Some(pending) => (
                    pending.msg.clone(),
                    self.dest_address_to_use(pending.service.as_deref(), pending.param.as_deref()),
                ),
                None => return,
            }
        };

        trace!(destination = %dest, "Sending message");
        let result = self.transport.send_message(&msg, &dest);

        let outcome = {
            let mut inner = self.inner.lock();
            match result {
                Ok(()) => {
                    inner.pending = None;
                    self.event_called(&mut inner, MessengerEvent::Idle)
                }
                Err(err) => {
                    debug!(destination = %dest, %err, "Transport send failed");
                    if let Some(pending) = inner.pending.as_mut() {
                        if Arc::ptr_eq(&pending.msg, &msg) {
                            pending.failure = Some(MessengerError::Transport(err));
                        }
                    }
                    self.event_called(&mut inner, MessengerEvent::Down)
                }
            }
        };
        self.finish_event(outcome);
    }

    /// Connection cannot be re-established; report down
    fn cant_connect(&self) {
        let outcome = {
            let mut inner = self.inner.lock();
            self.event_called(&mut inner, MessengerEvent::Down)
        };
        self.finish_event(outcome);
    }

    /// Take the failure recorded for `msg` if it still occupies the slot
    fn collect_failure(&self, msg: &Arc<Message>) -> Option<MessengerError> {
        let mut inner = self.inner.lock();
        let ours = matches!(inner.pending.as_ref(), Some(p) if Arc::ptr_eq(&p.msg, msg));
        if !ours {
            return None;
        }

        let failure = inner
            .pending
            .take()
            .and_then(|p| p.failure)
            .unwrap_or(MessengerError::Unknown);
        self.slot_freed.notify_all();
        Some(failure)
    }

    fn store(msg: &Arc<Message>, service: Option<&str>, param: Option<&str>) -> PendingMessage {
        PendingMessage {
            msg: msg.clone(),
            service: service.map(str::to_string),
            param: param.map(str::to_string),
            failure: None,
        }
    }
}

impl Messenger for BlockingMessenger {
    fn send_blocking(
        &self,
        msg: Arc<Message>,
        service: Option<&str>,
        param: Option<&str>,
    ) -> Result<(), MessengerError> {
        let outcome = {
            let mut inner = self.inner.lock();
            while inner.pending.is_some() && !inner.input_closed {
                self.slot_freed.wait(&mut inner);
            }
            if inner.input_closed {
                return Err(MessengerError::Closed);
            }
            inner.pending = Some(Self::store(&msg, service, param));
            self.event_called(&mut inner, MessengerEvent::Saturated)
        };
        self.finish_event(outcome);

        match self.collect_failure(&msg) {
            None => {
                msg.set_outcome(SendOutcome::Success);
                Ok(())
            }
            Some(err) => {
                msg.set_outcome(SendOutcome::Failed(err.clone()));
                Err(err)
            }
        }
    }

    fn send_non_blocking(&self, msg: Arc<Message>, service: Option<&str>, param: Option<&str>) -> bool {
        let (closed, outcome) = {
            let mut inner = self.inner.lock();
            let closed = inner.input_closed;
            if !closed && inner.pending.is_none() {
                inner.pending = Some(Self::store(&msg, service, param));
                (closed, Some(self.event_called(&mut inner, MessengerEvent::Saturated)))
            } else {
                (closed, None)
            }
        };

        if let Some(outcome) = outcome {
            self.finish_event(outcome);
            match self.collect_failure(&msg) {
                None => msg.set_outcome(SendOutcome::Success),
                Some(err) => msg.set_outcome(SendOutcome::Failed(err)),
            }
            return true;
        }

        msg.set_outcome(if closed {
            SendOutcome::Failed(MessengerError::Closed)
        } else {
            SendOutcome::Overflow
        });
        false
    }

    fn close(&self) {
        let outcome = {
            let mut inner = self.inner.lock();
            self.event_called(&mut inner, MessengerEvent::Close)
        };
        self.finish_event(outcome);
    }

    fn state(&self) -> MessengerState {
        self.inner.lock().state
    }

    fn destination_address(&self) -> EndpointAddress {
        self.destination.clone()
    }

    fn logical_destination_address(&self) -> Option<EndpointAddress> {
        self.transport.logical_destination()
    }
}

impl fmt::Debug for BlockingMessenger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingMessenger")
            .field("destination", &self.destination)
            .field("home_group", &self.home_group)
            .field("state", &self.state())
            .finish()
    }
}
