//! The persistence gateway contract.

use std::future::Future;
use std::pin::Pin;

use peerbid_core::{AuctionId, AuctionOutcome, AuctionStatus};

use crate::error::StoreResult;
use crate::records::{AuctionRow, BidRow, NewAuction};

/// Boxed future type for async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Durable storage for auctions and bids.
///
/// Lookups by id return [`StoreError::NotFound`](crate::StoreError::NotFound)
/// rather than an empty value.
pub trait PersistenceGateway: Send + Sync {
    /// Stores a new open auction and returns its freshly assigned id.
    fn create_auction(&self, auction: NewAuction) -> BoxFuture<'_, StoreResult<AuctionId>>;

    /// Appends a bid.
    fn insert_bid(&self, bid: BidRow) -> BoxFuture<'_, StoreResult<()>>;

    /// Fetches an auction by id.
    fn fetch_auction<'a>(&'a self, auction_id: &'a AuctionId)
        -> BoxFuture<'a, StoreResult<AuctionRow>>;

    /// Fetches every stored auction.
    fn fetch_all_auctions(&self) -> BoxFuture<'_, StoreResult<Vec<AuctionRow>>>;

    /// Fetches the bid history of an auction, oldest first.
    fn fetch_bids<'a>(&'a self, auction_id: &'a AuctionId) -> BoxFuture<'a, StoreResult<Vec<BidRow>>>;

    /// Fetches the highest stored bid of an auction, if any.
    fn fetch_highest_bid<'a>(
        &'a self,
        auction_id: &'a AuctionId,
    ) -> BoxFuture<'a, StoreResult<Option<BidRow>>>;

    /// Updates the status and, for closed auctions, the outcome.
    fn update_status<'a>(
        &'a self,
        auction_id: &'a AuctionId,
        status: AuctionStatus,
        outcome: Option<AuctionOutcome>,
    ) -> BoxFuture<'a, StoreResult<()>>;

    /// Deletes an auction row. Its bids are left untouched.
    fn delete_auction<'a>(&'a self, auction_id: &'a AuctionId) -> BoxFuture<'a, StoreResult<()>>;

    /// Deletes all bids of an auction and returns how many were removed.
    fn delete_bids<'a>(&'a self, auction_id: &'a AuctionId) -> BoxFuture<'a, StoreResult<usize>>;
}
