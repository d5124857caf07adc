//! Storage rows and their conversions to domain records.
//!
//! Rows mirror the persisted layout (integer status codes, a denormalised
//! product name on each bid). Conversions are plain functions with no
//! lookups, so the same row always maps to the same record.

use chrono::{DateTime, Utc};
use peerbid_core::{AuctionId, AuctionOutcome, AuctionRecord, AuctionStatus, BidRecord, Price};
use serde::{Deserialize, Serialize};

/// Stored code for [`AuctionStatus::Unknown`].
pub const STATUS_UNKNOWN: u8 = 0;
/// Stored code for [`AuctionStatus::Open`].
pub const STATUS_OPEN: u8 = 1;
/// Stored code for [`AuctionStatus::Closed`].
pub const STATUS_CLOSED: u8 = 2;

/// Encodes a status for storage.
#[must_use]
pub const fn status_to_code(status: AuctionStatus) -> u8 {
    match status {
        AuctionStatus::Unknown => STATUS_UNKNOWN,
        AuctionStatus::Open => STATUS_OPEN,
        AuctionStatus::Closed => STATUS_CLOSED,
    }
}

/// Decodes a stored status. Unrecognised codes decode to `Unknown`.
#[must_use]
pub const fn status_from_code(code: u8) -> AuctionStatus {
    match code {
        STATUS_OPEN => AuctionStatus::Open,
        STATUS_CLOSED => AuctionStatus::Closed,
        _ => AuctionStatus::Unknown,
    }
}

/// Input for creating an auction; the gateway assigns the identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuction {
    /// Item being sold.
    pub item: String,
    /// Starting price.
    pub price: Price,
    /// Seller display name.
    pub seller: String,
}

/// A persisted auction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionRow {
    /// Auction identifier.
    pub auction_id: AuctionId,
    /// Item being sold.
    pub item: String,
    /// Starting price.
    pub price: Price,
    /// Seller display name.
    pub seller: String,
    /// Encoded status, see [`status_to_code`].
    pub status: u8,
    /// Hammer price once closed.
    #[serde(default)]
    pub final_price: Option<Price>,
    /// Winning bidder once closed.
    #[serde(default)]
    pub winner: Option<String>,
    /// When the auction was created.
    pub start_time: DateTime<Utc>,
}

impl AuctionRow {
    /// Builds the row for a new open auction.
    #[must_use]
    pub fn open(auction_id: AuctionId, auction: NewAuction) -> Self {
        Self {
            auction_id,
            item: auction.item,
            price: auction.price,
            seller: auction.seller,
            status: STATUS_OPEN,
            final_price: None,
            winner: None,
            start_time: Utc::now(),
        }
    }

    /// Decoded status of this row.
    #[must_use]
    pub const fn status(&self) -> AuctionStatus {
        status_from_code(self.status)
    }

    /// Converts the row plus its bid history into one record.
    #[must_use]
    pub fn into_record(self, bids: Vec<BidRow>) -> AuctionRecord {
        let status = self.status();
        let outcome = match (self.winner, self.final_price) {
            (Some(winner), Some(price)) => Some(AuctionOutcome { winner, price }),
            _ => None,
        };
        AuctionRecord {
            auction_id: self.auction_id,
            item: self.item,
            starting_price: self.price,
            seller: self.seller,
            status,
            bids: bids.into_iter().map(BidRecord::from).collect(),
            outcome,
        }
    }
}

impl From<AuctionRow> for AuctionRecord {
    fn from(row: AuctionRow) -> Self {
        row.into_record(Vec::new())
    }
}

/// A persisted bid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidRow {
    /// Auction the bid belongs to.
    pub auction_id: AuctionId,
    /// Bidder display name.
    pub bidder: String,
    /// Item name copied from the auction.
    pub product: String,
    /// Bid amount.
    pub amount: Price,
    /// When the bid was placed.
    pub timestamp: DateTime<Utc>,
}

impl BidRow {
    /// Builds a row from a bid and the item it was placed on.
    #[must_use]
    pub fn from_record(bid: &BidRecord, product: &str) -> Self {
        Self {
            auction_id: bid.auction_id.clone(),
            bidder: bid.bidder.clone(),
            product: product.to_string(),
            amount: bid.amount,
            timestamp: bid.placed_at,
        }
    }
}

impl From<BidRow> for BidRecord {
    fn from(row: BidRow) -> Self {
        Self {
            auction_id: row.auction_id,
            bidder: row.bidder,
            amount: row.amount,
            placed_at: row.timestamp,
        }
    }
}
