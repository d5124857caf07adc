//! Error types for peerbid-core.

use thiserror::Error;

/// Errors that can occur when building PeerBid primitives.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Invalid price (overflow, negative, or malformed).
    #[error("invalid price: {0}")]
    InvalidPrice(String),

    /// Invalid peer address.
    #[error("invalid peer address: {0}")]
    InvalidAddress(String),

    /// Invalid auction identifier.
    #[error("invalid auction id: {0}")]
    InvalidAuctionId(String),
}
