//! Channel views over a shared messenger
//!
//! Several logical conversations can share one physical connection. A
//! channel view fixes the destination service and param used when a caller
//! does not name one, and optionally redirects every send to the endpoint
//! service of another group: the service becomes
//! `EndpointService:<group unique value>` and the requested service is folded
//! into the param as `<service>/<param>`.

use std::sync::Arc;

use wirenet_core::{EndpointAddress, Message, MessengerError, PeerGroupId};

use super::blocking::BlockingMessenger;
use super::state::MessengerState;
use super::{Messenger, MessengerListener};

/// Service prefix used for cross-group redirection
pub const ENDPOINT_SERVICE_PREFIX: &str = "EndpointService:";

/// Address-rewriting view of a [`BlockingMessenger`]
#[derive(Debug, Clone)]
pub struct ChannelMessenger {
    shared: Arc<BlockingMessenger>,
    redirection: Option<PeerGroupId>,
    orig_service: Option<String>,
    orig_param: Option<String>,
}

impl ChannelMessenger {
    pub(crate) fn new(
        shared: Arc<BlockingMessenger>,
        redirection: Option<PeerGroupId>,
        service: Option<&str>,
        param: Option<&str>,
    ) -> Self {
        Self {
            shared,
            redirection,
            orig_service: service.map(str::to_string),
            orig_param: param.map(str::to_string),
        }
    }

    /// The messenger this view sends through
    pub fn shared(&self) -> &Arc<BlockingMessenger> {
        &self.shared
    }

    pub fn redirection(&self) -> Option<&PeerGroupId> {
        self.redirection.as_ref()
    }

    /// Service and param actually handed to the shared messenger
    pub fn effective_destination(
        &self,
        service: Option<&str>,
        param: Option<&str>,
    ) -> (Option<String>, Option<String>) {
        let (service, param) = match service {
            Some(service) => (Some(service), param),
            None => (self.orig_service.as_deref(), self.orig_param.as_deref()),
        };

        match &self.redirection {
            None => (service.map(str::to_string), param.map(str::to_string)),
            Some(group) => {
                let redirected_service =
                    format!("{}{}", ENDPOINT_SERVICE_PREFIX, group.unique_value());
                let folded = match (service, param) {
                    (Some(s), Some(p)) => Some(format!("{}/{}", s, p)),
                    (Some(s), None) => Some(s.to_string()),
                    (None, Some(p)) => Some(format!("/{}", p)),
                    (None, None) => None,
                };
                (Some(redirected_service), folded)
            }
        }
    }

    pub fn register_listener(&self, listener: Arc<dyn MessengerListener>) {
        self.shared.register_listener(listener);
    }
}

impl Messenger for ChannelMessenger {
    fn send_blocking(
        &self,
        msg: Arc<Message>,
        service: Option<&str>,
        param: Option<&str>,
    ) -> Result<(), MessengerError> {
        let (service, param) = self.effective_destination(service, param);
        self.shared
            .send_blocking(msg, service.as_deref(), param.as_deref())
    }

    fn send_non_blocking(&self, msg: Arc<Message>, service: Option<&str>, param: Option<&str>) -> bool {
        let (service, param) = self.effective_destination(service, param);
        self.shared
            .send_non_blocking(msg, service.as_deref(), param.as_deref())
    }

    fn close(&self) {
        self.shared.close();
    }

    fn state(&self) -> MessengerState {
        self.shared.state()
    }

    fn resolve(&self) {
        self.shared.resolve();
    }

    fn destination_address(&self) -> EndpointAddress {
        self.shared.destination_address()
    }

    fn logical_destination_address(&self) -> Option<EndpointAddress> {
        self.shared
            .logical_destination_address()
            .map(|raw| raw.with_service(self.orig_service.as_deref(), self.orig_param.as_deref()))
    }
}
