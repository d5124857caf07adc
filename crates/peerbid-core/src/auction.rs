//! Auction and bid domain types.
//!
//! These are the values every node replicates. An [`AuctionRecord`] is the
//! merged snapshot of an auction and its bid history; the leading bid is
//! always derived from the bids, never stored separately.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CoreError, Price};

/// Globally unique auction identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuctionId(String);

impl AuctionId {
    /// Generates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps an existing identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is empty or contains whitespace.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        let raw = raw.trim();
        if raw.is_empty() || raw.chars().any(char::is_whitespace) {
            return Err(CoreError::InvalidAuctionId(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AuctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle status of an auction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionStatus {
    /// Status could not be determined. Never reached by a valid transition.
    #[default]
    Unknown,
    /// Accepting bids.
    Open,
    /// Completed; no further bids accepted.
    Closed,
}

impl AuctionStatus {
    /// Returns true if bids may be placed.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }

    /// Returns true if moving from `self` to `next` is a valid transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!((self, next), (Self::Open, Self::Closed))
    }
}

impl fmt::Display for AuctionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Open => "open",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// A single accepted bid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidRecord {
    /// Auction this bid belongs to.
    pub auction_id: AuctionId,
    /// Display name of the bidder.
    pub bidder: String,
    /// Bid amount.
    pub amount: Price,
    /// When the bid was placed at its origin node.
    pub placed_at: DateTime<Utc>,
}

impl BidRecord {
    /// Creates a bid stamped with the current time.
    pub fn new(auction_id: AuctionId, bidder: impl Into<String>, amount: Price) -> Self {
        Self {
            auction_id,
            bidder: bidder.into(),
            amount,
            placed_at: Utc::now(),
        }
    }

    /// Overrides the placement timestamp.
    #[must_use]
    pub const fn at(mut self, placed_at: DateTime<Utc>) -> Self {
        self.placed_at = placed_at;
        self
    }

    /// Ranks two bids: higher amount wins, then the earlier bid, then the
    /// lexically smaller bidder name.
    fn rank(&self, other: &Self) -> Ordering {
        self.amount
            .cmp(&other.amount)
            .then_with(|| other.placed_at.cmp(&self.placed_at))
            .then_with(|| other.bidder.cmp(&self.bidder))
    }
}

/// Returns the leading bid of a bid set.
///
/// The result depends only on the set of bids, not on their order.
#[must_use]
pub fn leading_bid(bids: &[BidRecord]) -> Option<&BidRecord> {
    bids.iter().max_by(|a, b| a.rank(b))
}

/// Winner and hammer price of a closed auction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionOutcome {
    /// Name of the winning bidder.
    pub winner: String,
    /// Final price paid.
    pub price: Price,
}

/// Merged snapshot of an auction and its bids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionRecord {
    /// Immutable identifier.
    pub auction_id: AuctionId,
    /// Item being sold.
    pub item: String,
    /// Floor every bid must exceed.
    pub starting_price: Price,
    /// Display name of the seller.
    pub seller: String,
    /// Lifecycle status.
    pub status: AuctionStatus,
    /// Known bids, in arrival order.
    #[serde(default)]
    pub bids: Vec<BidRecord>,
    /// Set once the auction is closed.
    #[serde(default)]
    pub outcome: Option<AuctionOutcome>,
}

impl AuctionRecord {
    /// Creates an open auction with no bids.
    pub fn open(
        auction_id: AuctionId,
        item: impl Into<String>,
        starting_price: Price,
        seller: impl Into<String>,
    ) -> Self {
        Self {
            auction_id,
            item: item.into(),
            starting_price,
            seller: seller.into(),
            status: AuctionStatus::Open,
            bids: Vec::new(),
            outcome: None,
        }
    }

    /// Returns the current leading bid, if any.
    #[must_use]
    pub fn leading_bid(&self) -> Option<&BidRecord> {
        leading_bid(&self.bids)
    }

    /// Returns the amount a new bid must strictly exceed.
    #[must_use]
    pub fn bid_floor(&self) -> Price {
        self.leading_bid()
            .map_or(self.starting_price, |bid| bid.amount.max(self.starting_price))
    }

    /// Returns true if the auction accepts bids.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// Closes the auction with the given outcome.
    ///
    /// Returns false and leaves the record untouched if the auction is not
    /// open.
    pub fn close(&mut self, outcome: AuctionOutcome) -> bool {
        if !self.status.can_transition_to(AuctionStatus::Closed) {
            return false;
        }
        self.status = AuctionStatus::Closed;
        self.outcome = Some(outcome);
        true
    }
}
