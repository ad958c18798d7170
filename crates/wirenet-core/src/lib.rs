//! Wirenet Core
//!
//! Foundational types for the wirenet overlay messaging substrate: group,
//! peer and pipe identifiers, endpoint addresses, messages with their send
//! outcome side-channel, the wire flood header, the seen message cache, route
//! descriptors, peer view iteration, configuration and the error taxonomy.
//!
//! Threads, locks held across calls and I/O live in `wirenet-runtime`.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod address;
pub mod config;
pub mod errors;
pub mod ids;
pub mod message;
pub mod protocol;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use address::EndpointAddress;
pub use config::{
    MessengerCacheConfig, MessengerConfig, OutputPipeConfig, WirePipeConfig, WirenetConfig,
    WIRE_SERVICE_NAME,
};
pub use errors::{
    GroupError, MessengerError, PipeError, Result, StateTransitionError, TransportError,
    WirenetError, WirenetResult,
};
pub use ids::{PeerGroupId, PeerId, PipeId};
pub use message::{Message, MessageElement, SendOutcome};
pub use protocol::{
    AccessPoint, PeerViewStrategy, RouteAdvertisement, RouteStatus, SeenMessageCache,
    SequentialStrategy, WireHeader,
};
