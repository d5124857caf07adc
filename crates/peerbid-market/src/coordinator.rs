//! Auction lifecycle driven by local actions.
//!
//! Every operation validates and commits under one lifecycle lock, then
//! broadcasts after the lock is released. The local commit is authoritative
//! as soon as it returns; peers mirror it if and when the broadcast reaches
//! them.

use std::sync::Arc;

use peerbid_core::{AuctionId, AuctionOutcome, AuctionRecord, AuctionStatus, BidRecord, Price};
use peerbid_p2p::{AuctionData, BidData, BroadcastDispatcher, BroadcastReport, CompletionData, RpcRequest};
use peerbid_store::{BidRow, NewAuction, PersistenceGateway};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{MarketError, MarketResult};
use crate::replica::LocalReplica;

/// A committed local change and the report of its propagation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed<T> {
    /// What was committed locally.
    pub value: T,
    /// Per-peer result of the broadcast that followed.
    pub broadcast: BroadcastReport,
}

/// Runs the Open to Closed auction state machine for this node.
pub struct AuctionCoordinator {
    gateway: Arc<dyn PersistenceGateway>,
    replica: Arc<LocalReplica>,
    dispatcher: Arc<BroadcastDispatcher>,
    lifecycle: Mutex<()>,
}

impl std::fmt::Debug for AuctionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuctionCoordinator")
            .field("replica", &self.replica)
            .finish_non_exhaustive()
    }
}

impl AuctionCoordinator {
    /// Creates a coordinator over the node's shared services.
    #[must_use]
    pub fn new(
        gateway: Arc<dyn PersistenceGateway>,
        replica: Arc<LocalReplica>,
        dispatcher: Arc<BroadcastDispatcher>,
    ) -> Self {
        Self {
            gateway,
            replica,
            dispatcher,
            lifecycle: Mutex::new(()),
        }
    }

    /// Opens a new auction and announces it.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty item or a zero price, or a
    /// storage error if the auction could not be persisted.
    pub async fn initialize(
        &self,
        item: &str,
        price: Price,
        seller: &str,
    ) -> MarketResult<Committed<AuctionRecord>> {
        let item = item.trim();
        if item.is_empty() {
            return Err(MarketError::EmptyItem);
        }
        if !price.is_positive() {
            return Err(MarketError::NonPositivePrice(price));
        }

        let record = {
            let _guard = self.lifecycle.lock().await;
            let auction_id = self
                .gateway
                .create_auction(NewAuction {
                    item: item.to_string(),
                    price,
                    seller: seller.to_string(),
                })
                .await?;
            let record = AuctionRecord::open(auction_id, item, price, seller);
            self.replica.upsert(record.clone());
            record
        };

        info!(auction_id = %record.auction_id, item = %record.item, price = %price, seller, "auction opened");
        let broadcast = self
            .dispatcher
            .broadcast(RpcRequest::Initialize(AuctionData::from(&record)))
            .await;
        Ok(Committed {
            value: record,
            broadcast,
        })
    }

    /// Places a bid that must beat both the starting price and the current
    /// leading bid.
    ///
    /// # Errors
    ///
    /// Returns an error if the auction is unknown or not open, if the
    /// amount is too low, or if the bid could not be persisted. Rejected
    /// bids change nothing.
    pub async fn place_bid(
        &self,
        auction_id: &AuctionId,
        amount: Price,
        bidder: &str,
    ) -> MarketResult<Committed<BidRecord>> {
        if !amount.is_positive() {
            return Err(MarketError::NonPositivePrice(amount));
        }

        let bid = {
            let _guard = self.lifecycle.lock().await;
            let record = self.require(auction_id).await?;
            require_open(&record)?;

            let floor = record.bid_floor();
            if amount <= floor {
                debug!(auction_id = %auction_id, amount = %amount, floor = %floor, "bid rejected");
                return Err(MarketError::BidTooLow { amount, floor });
            }

            let bid = BidRecord::new(auction_id.clone(), bidder, amount);
            self.gateway
                .insert_bid(BidRow::from_record(&bid, &record.item))
                .await?;
            self.replica.append_bid(bid.clone());
            bid
        };

        info!(auction_id = %auction_id, bidder, amount = %amount, "bid accepted");
        let broadcast = self
            .dispatcher
            .broadcast(RpcRequest::PlaceBid(BidData::from(&bid)))
            .await;
        Ok(Committed {
            value: bid,
            broadcast,
        })
    }

    /// Closes an auction, awarding it to the leading bid.
    ///
    /// Only the seller may complete an auction, and only once it has at
    /// least one bid. After the broadcast the persisted bid history is
    /// pruned; the closed auction itself stays queryable.
    ///
    /// # Errors
    ///
    /// Returns an error if the auction is unknown, the caller is not the
    /// seller, the auction is not open or has no bids, or storage fails.
    pub async fn complete(
        &self,
        auction_id: &AuctionId,
        caller: &str,
    ) -> MarketResult<Committed<AuctionRecord>> {
        let (record, outcome) = {
            let _guard = self.lifecycle.lock().await;
            let mut record = self.require(auction_id).await?;
            if record.seller != caller {
                return Err(MarketError::NotSeller {
                    auction_id: auction_id.clone(),
                    caller: caller.to_string(),
                });
            }
            require_open(&record)?;
            let outcome = record
                .leading_bid()
                .map(|bid| AuctionOutcome {
                    winner: bid.bidder.clone(),
                    price: bid.amount,
                })
                .ok_or_else(|| MarketError::NoBids(auction_id.clone()))?;

            match self
                .gateway
                .update_status(auction_id, AuctionStatus::Closed, Some(outcome.clone()))
                .await
            {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    debug!(auction_id = %auction_id, "auction not persisted on this node");
                }
                Err(e) => return Err(e.into()),
            }
            self.replica.mark_closed(auction_id, outcome.clone());
            record.close(outcome.clone());
            (record, outcome)
        };

        info!(
            auction_id = %auction_id,
            winner = %outcome.winner,
            price = %outcome.price,
            "auction closed"
        );
        let broadcast = self
            .dispatcher
            .broadcast(RpcRequest::Complete(CompletionData::new(auction_id.clone(), &outcome)))
            .await;

        match self.gateway.delete_bids(auction_id).await {
            Ok(pruned) => debug!(auction_id = %auction_id, pruned, "bid history pruned"),
            Err(e) => warn!(auction_id = %auction_id, error = %e, "failed to prune bid history"),
        }

        Ok(Committed {
            value: record,
            broadcast,
        })
    }

    /// Returns an auction by id.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::NotFound`] if the auction is unknown.
    pub async fn auction(&self, auction_id: &AuctionId) -> MarketResult<AuctionRecord> {
        self.require(auction_id).await
    }

    /// Lists the auctions this node knows about.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage fallback fails.
    pub async fn auctions(&self) -> MarketResult<Vec<AuctionRecord>> {
        self.replica.list_all().await
    }

    /// Returns the leading bid of an auction, if it has any bids.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::NotFound`] if the auction is unknown.
    pub async fn leading_bid(&self, auction_id: &AuctionId) -> MarketResult<Option<BidRecord>> {
        let record = self.require(auction_id).await?;
        Ok(record.leading_bid().cloned())
    }

    async fn require(&self, auction_id: &AuctionId) -> MarketResult<AuctionRecord> {
        self.replica
            .get(auction_id)
            .await?
            .ok_or_else(|| MarketError::NotFound(auction_id.clone()))
    }
}

fn require_open(record: &AuctionRecord) -> MarketResult<()> {
    if record.is_open() {
        Ok(())
    } else {
        Err(MarketError::NotOpen {
            auction_id: record.auction_id.clone(),
            status: record.status,
        })
    }
}
