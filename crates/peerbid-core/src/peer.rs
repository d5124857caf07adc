//! Peer identity.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// A node in the marketplace, identified by its `host:port` address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Peer {
    /// Unique `host:port` address.
    pub address: String,
    /// Human-readable display name.
    pub name: String,
}

impl Peer {
    /// Creates a peer after checking the address shape.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not `host:port` with a numeric port.
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Result<Self, CoreError> {
        let address = address.into();
        validate_address(&address)?;
        Ok(Self {
            address,
            name: name.into(),
        })
    }

    /// Builds the address for a host and port.
    #[must_use]
    pub fn address_for(host: &str, port: u16) -> String {
        format!("{host}:{port}")
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.name, self.address)
    }
}

fn validate_address(address: &str) -> Result<(), CoreError> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| CoreError::InvalidAddress(address.to_string()))?;
    if host.is_empty() || port.parse::<u16>().is_err() {
        return Err(CoreError::InvalidAddress(address.to_string()));
    }
    Ok(())
}
