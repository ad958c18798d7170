//! Endpoint addresses
//!
//! An endpoint address names a destination as `protocol://address`, optionally
//! narrowed to a service and a service parameter:
//! `protocol://address/service/param`. Addresses are plain values and key the
//! messenger cache.

use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::errors::WirenetError;

/// Destination descriptor for messengers and listeners
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct EndpointAddress {
    protocol: String,
    address: String,
    service: Option<String>,
    param: Option<String>,
}

impl EndpointAddress {
    /// Create an address without service or param
    pub fn new<P: Into<String>, A: Into<String>>(protocol: P, address: A) -> Self {
        Self {
            protocol: protocol.into(),
            address: address.into(),
            service: None,
            param: None,
        }
    }

    /// Copy of this address with the service and param replaced
    pub fn with_service(&self, service: Option<&str>, param: Option<&str>) -> Self {
        Self {
            protocol: self.protocol.clone(),
            address: self.address.clone(),
            service: service.map(str::to_string),
            param: param.map(str::to_string),
        }
    }

    /// Copy of this address with service and param removed
    pub fn base(&self) -> Self {
        self.with_service(None, None)
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn protocol_address(&self) -> &str {
        &self.address
    }

    pub fn service(&self) -> Option<&str> {
        self.service.as_deref()
    }

    pub fn param(&self) -> Option<&str> {
        self.param.as_deref()
    }
}

impl fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.protocol, self.address)?;
        match (&self.service, &self.param) {
            (Some(service), Some(param)) => write!(f, "/{}/{}", service, param),
            (Some(service), None) => write!(f, "/{}", service),
            (None, Some(param)) => write!(f, "//{}", param),
            (None, None) => Ok(()),
        }
    }
}

impl FromStr for EndpointAddress {
    type Err = WirenetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (protocol, rest) = s
            .split_once("://")
            .ok_or_else(|| WirenetError::invalid_id(format!("missing protocol in address: {}", s)))?;
        if protocol.is_empty() {
            return Err(WirenetError::invalid_id(format!("empty protocol in address: {}", s)));
        }

        // The param keeps any further '/' so redirected params survive parsing.
        let mut parts = rest.splitn(3, '/');
        let address = parts.next().unwrap_or_default();
        let service = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
        let param = parts.next().map(str::to_string);

        Ok(Self {
            protocol: protocol.to_string(),
            address: address.to_string(),
            service,
            param,
        })
    }
}

impl From<EndpointAddress> for String {
    fn from(addr: EndpointAddress) -> Self {
        addr.to_string()
    }
}

impl TryFrom<String> for EndpointAddress {
    type Error = WirenetError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}
