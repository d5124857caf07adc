//! Node configuration.
//!
//! A node is configured from a JSON file, with command-line flags layered on
//! top. Every field has a default, so an empty object is a valid file.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use peerbid_core::Peer;
use peerbid_market::ReplicaConfig;
use peerbid_p2p::{DispatchConfig, GossipConfig};
use serde::{Deserialize, Serialize};

use crate::error::NodeError;

/// Main node configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NodeConfig {
    /// Display name, used as seller and bidder identity.
    pub name: String,
    /// Host other nodes use to reach this one.
    pub host: String,
    /// RPC listen port. `0` picks a free port.
    pub port: u16,
    /// `host:port` of a peer to join through.
    pub bootstrap: Option<String>,
    /// Directory for the JSON store. In-memory storage when unset.
    pub data_dir: Option<PathBuf>,
    /// Deadline for each outbound RPC, in seconds.
    pub rpc_timeout_secs: u64,
    /// Bootstrap attempts before giving up.
    pub join_attempts: u32,
    /// Pause between bootstrap attempts, in milliseconds.
    pub join_backoff_ms: u64,
    /// Replica entry lifetime, in seconds.
    pub cache_ttl_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "peer".to_string(),
            host: "127.0.0.1".to_string(),
            port: 5001,
            bootstrap: None,
            data_dir: None,
            rpc_timeout_secs: 10,
            join_attempts: 3,
            join_backoff_ms: 1000,
            cache_ttl_secs: 24 * 60 * 60,
        }
    }
}

impl NodeConfig {
    /// Load configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            NodeError::Config(format!(
                "failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_json(&content)
    }

    /// Parse configuration from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or fails validation.
    pub fn from_json(content: &str) -> Result<Self, NodeError> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| NodeError::Config(format!("invalid JSON: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), NodeError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| NodeError::Config(format!("failed to encode config: {e}")))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.name.trim().is_empty() {
            return Err(NodeError::Config("name cannot be empty".to_string()));
        }

        if self.name.len() > 64 {
            return Err(NodeError::Config(
                "name cannot exceed 64 characters".to_string(),
            ));
        }

        if self.host.is_empty() || self.host.contains(char::is_whitespace) {
            return Err(NodeError::Config(format!("invalid host '{}'", self.host)));
        }

        if let Some(bootstrap) = &self.bootstrap {
            Peer::new(bootstrap.clone(), "bootstrap").map_err(|_| {
                NodeError::Config(format!("bootstrap must be host:port, got '{bootstrap}'"))
            })?;
        }

        if self.rpc_timeout_secs == 0 {
            return Err(NodeError::Config(
                "rpc_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.join_attempts == 0 {
            return Err(NodeError::Config(
                "join_attempts must be greater than 0".to_string(),
            ));
        }

        if self.cache_ttl_secs == 0 {
            return Err(NodeError::Config(
                "cache_ttl_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Resolves the listen address.
    ///
    /// # Errors
    ///
    /// Returns an error if the host does not resolve.
    pub fn bind_addr(&self) -> Result<SocketAddr, NodeError> {
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| NodeError::Config(format!("cannot resolve host '{}': {e}", self.host)))?
            .next()
            .ok_or_else(|| NodeError::Config(format!("host '{}' has no address", self.host)))
    }

    /// Identity advertised to peers once listening on `port`.
    ///
    /// # Errors
    ///
    /// Returns an error if host and port do not form a valid address.
    pub fn local_peer(&self, port: u16) -> Result<Peer, NodeError> {
        Ok(Peer::new(Peer::address_for(&self.host, port), self.name.clone())?)
    }

    /// Per-call deadline for outbound RPCs.
    #[must_use]
    pub const fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    /// Gossip settings derived from this configuration.
    #[must_use]
    pub const fn gossip_config(&self) -> GossipConfig {
        GossipConfig::new()
            .with_call_timeout(self.rpc_timeout())
            .with_join_attempts(self.join_attempts)
            .with_join_backoff(Duration::from_millis(self.join_backoff_ms))
    }

    /// Broadcast settings derived from this configuration.
    #[must_use]
    pub const fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig::new().with_call_timeout(self.rpc_timeout())
    }

    /// Replica settings derived from this configuration.
    #[must_use]
    pub const fn replica_config(&self) -> ReplicaConfig {
        ReplicaConfig::new().with_ttl(Duration::from_secs(self.cache_ttl_secs))
    }
}
