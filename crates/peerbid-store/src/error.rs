//! Error types for peerbid-store.

use peerbid_core::AuctionId;
use thiserror::Error;

/// Errors that can occur in persistence operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No auction with this identifier is stored.
    #[error("auction not found: {0}")]
    NotFound(AuctionId),

    /// Reading or writing the backing file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    /// Returns true if this error means the auction does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for persistence operations.
pub type StoreResult<T> = Result<T, StoreError>;
