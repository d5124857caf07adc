//! RPC messages exchanged between nodes.
//!
//! Every call is one JSON request answered by one JSON response, tagged by a
//! `"type"` field:
//!
//! | request | response |
//! |---|---|
//! | `ping {requesting_peer}` | `pong {known_peers}` |
//! | `initialize {auction_id, item, price, author}` | `ack` |
//! | `place_bid {auction_id, amount, bidder, placed_at?}` | `ack` |
//! | `complete {auction_id, highest_bidder, price}` | `ack` |
//!
//! Any request may be answered with `error {message}`.

use chrono::{DateTime, Utc};
use peerbid_core::{AuctionId, AuctionOutcome, AuctionRecord, BidRecord, Peer, Price};
use serde::{Deserialize, Serialize};

use crate::error::P2pResult;

/// Announcement of a newly created auction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionData {
    /// Auction identifier.
    pub auction_id: AuctionId,
    /// Item being sold.
    pub item: String,
    /// Starting price.
    pub price: Price,
    /// Seller display name.
    pub author: String,
}

impl From<&AuctionRecord> for AuctionData {
    fn from(record: &AuctionRecord) -> Self {
        Self {
            auction_id: record.auction_id.clone(),
            item: record.item.clone(),
            price: record.starting_price,
            author: record.seller.clone(),
        }
    }
}

impl AuctionData {
    /// Builds an open record with no bids from this announcement.
    #[must_use]
    pub fn into_record(self) -> AuctionRecord {
        AuctionRecord::open(self.auction_id, self.item, self.price, self.author)
    }
}

/// Announcement of an accepted bid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidData {
    /// Auction the bid is for.
    pub auction_id: AuctionId,
    /// Bid amount.
    pub amount: Price,
    /// Bidder display name.
    pub bidder: String,
    /// When the originating node accepted the bid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placed_at: Option<DateTime<Utc>>,
}

impl From<&BidRecord> for BidData {
    fn from(bid: &BidRecord) -> Self {
        Self {
            auction_id: bid.auction_id.clone(),
            amount: bid.amount,
            bidder: bid.bidder.clone(),
            placed_at: Some(bid.placed_at),
        }
    }
}

impl BidData {
    /// Converts to a bid record, stamping the receive time if none was sent.
    #[must_use]
    pub fn into_record(self) -> BidRecord {
        let bid = BidRecord::new(self.auction_id, self.bidder, self.amount);
        match self.placed_at {
            Some(placed_at) => bid.at(placed_at),
            None => bid,
        }
    }
}

/// Announcement that an auction closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionData {
    /// Auction identifier.
    pub auction_id: AuctionId,
    /// Winning bidder.
    pub highest_bidder: String,
    /// Hammer price.
    pub price: Price,
}

impl CompletionData {
    /// Builds the announcement for a closed auction.
    #[must_use]
    pub fn new(auction_id: AuctionId, outcome: &AuctionOutcome) -> Self {
        Self {
            auction_id,
            highest_bidder: outcome.winner.clone(),
            price: outcome.price,
        }
    }

    /// The outcome carried by this announcement.
    #[must_use]
    pub fn outcome(&self) -> AuctionOutcome {
        AuctionOutcome {
            winner: self.highest_bidder.clone(),
            price: self.price,
        }
    }
}

/// Requests a node can send to a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RpcRequest {
    /// Membership handshake.
    Ping {
        /// The peer that is joining.
        requesting_peer: Peer,
    },
    /// A new auction was created.
    Initialize(AuctionData),
    /// A bid was accepted.
    PlaceBid(BidData),
    /// An auction closed.
    Complete(CompletionData),
}

impl RpcRequest {
    /// Short name used in logs.
    #[must_use]
    pub const fn request_type(&self) -> &'static str {
        match self {
            Self::Ping { .. } => "ping",
            Self::Initialize(_) => "initialize",
            Self::PlaceBid(_) => "place_bid",
            Self::Complete(_) => "complete",
        }
    }

    /// Serialize to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> P2pResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid request.
    pub fn from_json(json: &str) -> P2pResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Replies to [`RpcRequest`]s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RpcResponse {
    /// Reply to `ping`: the responder's full membership.
    Pong {
        /// Every peer the responder knows, itself included.
        known_peers: Vec<Peer>,
    },
    /// The request was applied.
    Ack,
    /// The request was refused.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

impl RpcResponse {
    /// Builds an error reply.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Serialize to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> P2pResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid response.
    pub fn from_json(json: &str) -> P2pResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
