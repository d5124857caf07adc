//! Error types for peerbid-node.

use peerbid_core::CoreError;
use peerbid_market::MarketError;
use peerbid_p2p::P2pError;
use peerbid_store::StoreError;
use thiserror::Error;

/// Errors that can occur while running a node.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Networking failed.
    #[error(transparent)]
    P2p(#[from] P2pError),

    /// Storage failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A marketplace operation was refused or failed.
    #[error(transparent)]
    Market(#[from] MarketError),

    /// A domain value was malformed.
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for node operations.
pub type NodeResult<T> = Result<T, NodeError>;
