//! In-process gateway with no durability.

use std::cmp::Reverse;

use parking_lot::RwLock;
use peerbid_core::{AuctionId, AuctionOutcome, AuctionStatus};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::gateway::{BoxFuture, PersistenceGateway};
use crate::records::{status_to_code, AuctionRow, BidRow, NewAuction};

/// Auction and bid tables shared by the gateway implementations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Tables {
    #[serde(default)]
    auctions: Vec<AuctionRow>,
    #[serde(default)]
    bids: Vec<BidRow>,
}

impl Tables {
    pub(crate) fn create_auction(&mut self, auction: NewAuction) -> AuctionId {
        let auction_id = AuctionId::generate();
        self.auctions.push(AuctionRow::open(auction_id.clone(), auction));
        auction_id
    }

    pub(crate) fn insert_bid(&mut self, bid: BidRow) {
        self.bids.push(bid);
    }

    pub(crate) fn auction(&self, auction_id: &AuctionId) -> StoreResult<AuctionRow> {
        self.auctions
            .iter()
            .find(|row| &row.auction_id == auction_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(auction_id.clone()))
    }

    pub(crate) fn auctions(&self) -> Vec<AuctionRow> {
        self.auctions.clone()
    }

    pub(crate) fn bids(&self, auction_id: &AuctionId) -> Vec<BidRow> {
        self.bids
            .iter()
            .filter(|row| &row.auction_id == auction_id)
            .cloned()
            .collect()
    }

    /// Highest amount wins; ties go to the earliest bid.
    pub(crate) fn highest_bid(&self, auction_id: &AuctionId) -> Option<BidRow> {
        self.bids
            .iter()
            .filter(|row| &row.auction_id == auction_id)
            .max_by_key(|row| (row.amount, Reverse(row.timestamp), Reverse(row.bidder.clone())))
            .cloned()
    }

    pub(crate) fn update_status(
        &mut self,
        auction_id: &AuctionId,
        status: AuctionStatus,
        outcome: Option<AuctionOutcome>,
    ) -> StoreResult<()> {
        let row = self
            .auctions
            .iter_mut()
            .find(|row| &row.auction_id == auction_id)
            .ok_or_else(|| StoreError::NotFound(auction_id.clone()))?;
        row.status = status_to_code(status);
        if let Some(outcome) = outcome {
            row.final_price = Some(outcome.price);
            row.winner = Some(outcome.winner);
        }
        Ok(())
    }

    pub(crate) fn delete_auction(&mut self, auction_id: &AuctionId) -> StoreResult<()> {
        let before = self.auctions.len();
        self.auctions.retain(|row| &row.auction_id != auction_id);
        if self.auctions.len() == before {
            return Err(StoreError::NotFound(auction_id.clone()));
        }
        Ok(())
    }

    pub(crate) fn delete_bids(&mut self, auction_id: &AuctionId) -> usize {
        let before = self.bids.len();
        self.bids.retain(|row| &row.auction_id != auction_id);
        before - self.bids.len()
    }
}

/// Gateway that keeps all rows in memory.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    tables: RwLock<Tables>,
}

impl MemoryGateway {
    /// Creates an empty gateway.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored auctions.
    #[must_use]
    pub fn auction_count(&self) -> usize {
        self.tables.read().auctions.len()
    }

    /// Returns the number of stored bids across all auctions.
    #[must_use]
    pub fn bid_count(&self) -> usize {
        self.tables.read().bids.len()
    }
}

impl PersistenceGateway for MemoryGateway {
    fn create_auction(&self, auction: NewAuction) -> BoxFuture<'_, StoreResult<AuctionId>> {
        Box::pin(async move { Ok(self.tables.write().create_auction(auction)) })
    }

    fn insert_bid(&self, bid: BidRow) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            self.tables.write().insert_bid(bid);
            Ok(())
        })
    }

    fn fetch_auction<'a>(
        &'a self,
        auction_id: &'a AuctionId,
    ) -> BoxFuture<'a, StoreResult<AuctionRow>> {
        Box::pin(async move { self.tables.read().auction(auction_id) })
    }

    fn fetch_all_auctions(&self) -> BoxFuture<'_, StoreResult<Vec<AuctionRow>>> {
        Box::pin(async move { Ok(self.tables.read().auctions()) })
    }

    fn fetch_bids<'a>(&'a self, auction_id: &'a AuctionId) -> BoxFuture<'a, StoreResult<Vec<BidRow>>> {
        Box::pin(async move { Ok(self.tables.read().bids(auction_id)) })
    }

    fn fetch_highest_bid<'a>(
        &'a self,
        auction_id: &'a AuctionId,
    ) -> BoxFuture<'a, StoreResult<Option<BidRow>>> {
        Box::pin(async move { Ok(self.tables.read().highest_bid(auction_id)) })
    }

    fn update_status<'a>(
        &'a self,
        auction_id: &'a AuctionId,
        status: AuctionStatus,
        outcome: Option<AuctionOutcome>,
    ) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move { self.tables.write().update_status(auction_id, status, outcome) })
    }

    fn delete_auction<'a>(&'a self, auction_id: &'a AuctionId) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move { self.tables.write().delete_auction(auction_id) })
    }

    fn delete_bids<'a>(&'a self, auction_id: &'a AuctionId) -> BoxFuture<'a, StoreResult<usize>> {
        Box::pin(async move { Ok(self.tables.write().delete_bids(auction_id)) })
    }
}
