//! Centralized Configuration Management
//!
//! Tunables for messengers, the messenger cache, the output worker and wire
//! pipes. Defaults carry the reference constants of the protocol; `testing()`
//! presets shrink every timer so tests finish quickly.

use core::time::Duration;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, WirenetError};

/// Service name wire pipes register under
pub const WIRE_SERVICE_NAME: &str = "PipeService";

// ----------------------------------------------------------------------------
// Messenger Configuration
// ----------------------------------------------------------------------------

/// Configuration for a blocking messenger
///
/// Idleness is polled by the messenger cache reaper, see
/// [`MessengerCacheConfig::reaper_period`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessengerConfig {
    /// Close the messenger once the transport reports idle
    pub self_destruct: bool,
}

impl MessengerConfig {
    /// Messenger that closes itself once idle
    pub fn self_destructing() -> Self {
        Self {
            self_destruct: true,
        }
    }

    pub fn testing() -> Self {
        Self::self_destructing()
    }
}

// ----------------------------------------------------------------------------
// Messenger Cache Configuration
// ----------------------------------------------------------------------------

/// Configuration for the canonical messenger cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessengerCacheConfig {
    /// Period of the idle reaper thread
    pub reaper_period: Duration,
}

impl Default for MessengerCacheConfig {
    fn default() -> Self {
        Self {
            reaper_period: Duration::from_secs(60),
        }
    }
}

impl MessengerCacheConfig {
    pub fn testing() -> Self {
        Self {
            reaper_period: Duration::from_millis(50),
        }
    }
}

// ----------------------------------------------------------------------------
// Output Pipe Configuration
// ----------------------------------------------------------------------------

/// Configuration for the non-blocking output worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputPipeConfig {
    /// Bounded queue capacity
    pub queue_capacity: usize,
    /// How long an idle worker waits for work before exiting
    pub idle_linger: Duration,
    /// How long an enqueue waits for room in a full queue
    pub enqueue_wait: Duration,
}

impl Default for OutputPipeConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 50,                         // messages per pipe
            idle_linger: Duration::from_secs(10),       // worker exits after this
            enqueue_wait: Duration::from_millis(250),   // then the message is refused
        }
    }
}

impl OutputPipeConfig {
    pub fn testing() -> Self {
        Self {
            queue_capacity: 50,
            idle_linger: Duration::from_millis(200),
            enqueue_wait: Duration::from_millis(10),
        }
    }
}

// ----------------------------------------------------------------------------
// Wire Pipe Configuration
// ----------------------------------------------------------------------------

/// Configuration for a wire propagation pipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirePipeConfig {
    /// Capacity of the recently-seen message id cache
    pub seen_cache_capacity: usize,
    /// Hop budget for messages flooded to the whole group
    pub default_ttl: u32,
    /// Service name used for dispatch registration and propagation
    pub service_name: String,
    /// Output worker settings
    pub output: OutputPipeConfig,
}

impl Default for WirePipeConfig {
    fn default() -> Self {
        Self {
            seen_cache_capacity: 250,
            default_ttl: 200,
            service_name: WIRE_SERVICE_NAME.to_string(),
            output: OutputPipeConfig::default(),
        }
    }
}

impl WirePipeConfig {
    pub fn testing() -> Self {
        Self {
            output: OutputPipeConfig::testing(),
            ..Self::default()
        }
    }
}

// ----------------------------------------------------------------------------
// Aggregate Configuration
// ----------------------------------------------------------------------------

/// Complete runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WirenetConfig {
    pub messenger: MessengerConfig,
    pub messenger_cache: MessengerCacheConfig,
    pub wire_pipe: WirePipeConfig,
}

impl WirenetConfig {
    /// Fast timers for tests
    pub fn testing() -> Self {
        Self {
            messenger: MessengerConfig::testing(),
            messenger_cache: MessengerCacheConfig::testing(),
            wire_pipe: WirePipeConfig::testing(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.messenger_cache.reaper_period.is_zero() {
            return Err(WirenetError::config_error("Reaper period cannot be zero"));
        }
        if self.wire_pipe.seen_cache_capacity == 0 {
            return Err(WirenetError::config_error(
                "Seen message cache capacity cannot be zero",
            ));
        }
        if self.wire_pipe.default_ttl == 0 {
            return Err(WirenetError::config_error("Default TTL cannot be zero"));
        }
        if self.wire_pipe.service_name.is_empty() {
            return Err(WirenetError::config_error("Service name cannot be empty"));
        }
        self.wire_pipe.output.validate()
    }
}

impl OutputPipeConfig {
    /// Validate the output worker settings
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(WirenetError::config_error("Queue capacity cannot be zero"));
        }
        if self.idle_linger.is_zero() {
            return Err(WirenetError::config_error("Idle linger cannot be zero"));
        }
        if self.enqueue_wait.is_zero() {
            return Err(WirenetError::config_error("Enqueue wait cannot be zero"));
        }
        Ok(())
    }
}
