//! Error types for peerbid-market.

use peerbid_core::{AuctionId, AuctionStatus, Price};
use peerbid_store::StoreError;
use thiserror::Error;

/// Errors that can occur in marketplace operations.
#[derive(Debug, Error)]
pub enum MarketError {
    /// The item name is empty.
    #[error("item name must not be empty")]
    EmptyItem,

    /// A price or bid amount is zero.
    #[error("amount must be positive, got {0}")]
    NonPositivePrice(Price),

    /// The bid does not beat the current floor.
    #[error("bid {amount} must exceed {floor}")]
    BidTooLow {
        /// The rejected amount.
        amount: Price,
        /// Starting price or current leading bid.
        floor: Price,
    },

    /// No such auction is known to this node.
    #[error("auction not found: {0}")]
    NotFound(AuctionId),

    /// The auction does not accept this operation in its current state.
    #[error("auction {auction_id} is {status}, not open")]
    NotOpen {
        /// The auction.
        auction_id: AuctionId,
        /// Its current status.
        status: AuctionStatus,
    },

    /// Only the seller may complete an auction.
    #[error("{caller} is not the seller of auction {auction_id}")]
    NotSeller {
        /// The auction.
        auction_id: AuctionId,
        /// Who tried to complete it.
        caller: String,
    },

    /// An auction without bids cannot be completed.
    #[error("auction {0} has no bids")]
    NoBids(AuctionId),

    /// Persistence failed.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl MarketError {
    /// Returns true for input errors that are rejected before any lookup.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptyItem | Self::NonPositivePrice(_) | Self::BidTooLow { .. }
        )
    }

    /// Returns true if the auction is unknown.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for marketplace operations.
pub type MarketResult<T> = Result<T, MarketError>;
