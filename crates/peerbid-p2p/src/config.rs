//! Tunables for the RPC server, broadcast fan-out, and gossip.

use std::time::Duration;

/// Default per-call deadline for outbound RPCs.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Default maximum inbound message size: 1MB.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Default number of bootstrap attempts.
pub const DEFAULT_JOIN_ATTEMPTS: u32 = 3;

/// Default pause between bootstrap attempts.
pub const DEFAULT_JOIN_BACKOFF: Duration = Duration::from_secs(1);

/// Default number of finished forward outcomes kept between drains.
pub const DEFAULT_RETAINED_FORWARDS: usize = 256;

/// Configuration for the inbound RPC listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerConfig {
    /// Messages larger than this are answered with an error.
    pub max_message_size: usize,
    /// Deadline for the WebSocket handshake of a new connection.
    pub handshake_timeout: Duration,
}

impl ServerConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            handshake_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Set the maximum message size.
    #[must_use]
    pub const fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Set the handshake timeout.
    #[must_use]
    pub const fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Check if a message size is within the allowed limit.
    #[must_use]
    pub const fn is_message_size_valid(&self, size: usize) -> bool {
        size <= self.max_message_size
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for broadcast fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Deadline for each peer's call.
    pub call_timeout: Duration,
}

impl DispatchConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Set the per-peer call timeout.
    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for membership gossip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GossipConfig {
    /// Deadline for each ping, joining or forwarded.
    pub call_timeout: Duration,
    /// How many times to try the bootstrap peer.
    pub join_attempts: u32,
    /// Pause between bootstrap attempts.
    pub join_backoff: Duration,
    /// Finished forward outcomes kept for the next drain; older ones are dropped.
    pub retained_forwards: usize,
}

impl GossipConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            join_attempts: DEFAULT_JOIN_ATTEMPTS,
            join_backoff: DEFAULT_JOIN_BACKOFF,
            retained_forwards: DEFAULT_RETAINED_FORWARDS,
        }
    }

    /// Set the per-ping timeout.
    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Set the number of bootstrap attempts. Zero is treated as one.
    #[must_use]
    pub const fn with_join_attempts(mut self, attempts: u32) -> Self {
        self.join_attempts = attempts;
        self
    }

    /// Set the pause between bootstrap attempts.
    #[must_use]
    pub const fn with_join_backoff(mut self, backoff: Duration) -> Self {
        self.join_backoff = backoff;
        self
    }

    /// Set how many finished forward outcomes are kept between drains.
    #[must_use]
    pub const fn with_retained_forwards(mut self, limit: usize) -> Self {
        self.retained_forwards = limit;
        self
    }
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_reference_values() {
        assert_eq!(DispatchConfig::default().call_timeout, Duration::from_secs(10));
        let gossip = GossipConfig::default();
        assert_eq!(gossip.join_attempts, 3);
        assert_eq!(gossip.join_backoff, Duration::from_secs(1));
    }

    #[test]
    fn builders_override_fields() {
        let gossip = GossipConfig::new()
            .with_call_timeout(Duration::from_millis(50))
            .with_join_attempts(5)
            .with_join_backoff(Duration::ZERO);
        assert_eq!(gossip.call_timeout, Duration::from_millis(50));
        assert_eq!(gossip.join_attempts, 5);
        assert_eq!(gossip.join_backoff, Duration::ZERO);
    }

    #[test]
    fn message_size_limit() {
        let config = ServerConfig::new().with_max_message_size(16);
        assert!(config.is_message_size_valid(16));
        assert!(!config.is_message_size_valid(17));
    }
}
