//! Error types for peerbid-p2p.

use std::net::SocketAddr;

use thiserror::Error;

/// Errors that can occur in P2P operations.
#[derive(Debug, Error)]
pub enum P2pError {
    /// The peer could not be reached or the connection broke.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The call did not finish within its deadline.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The peer answered with something the protocol does not allow here.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A message could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The peer answered with an error reply.
    #[error("peer rejected request: {0}")]
    Remote(String),

    /// Failed to bind the RPC listener.
    #[error("failed to bind to {0}: {1}")]
    BindFailed(SocketAddr, std::io::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for P2pError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for P2pError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Connection(err.to_string())
    }
}

/// Result type for P2P operations.
pub type P2pResult<T> = Result<T, P2pError>;
