//! Applying lifecycle calls received from peers.
//!
//! Inbound calls are trusted: a bid is appended without checking it against
//! the local leading bid, and nothing received here is broadcast again.

use std::sync::Arc;

use peerbid_p2p::{AuctionData, BidData, CompletionData};
use peerbid_store::{BidRow, PersistenceGateway};
use tracing::{debug, info};

use crate::error::MarketResult;
use crate::replica::LocalReplica;

/// Mirrors remote auction mutations into this node's replica.
pub struct InboundAuctionHandler {
    gateway: Arc<dyn PersistenceGateway>,
    replica: Arc<LocalReplica>,
}

impl std::fmt::Debug for InboundAuctionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboundAuctionHandler")
            .field("replica", &self.replica)
            .finish_non_exhaustive()
    }
}

impl InboundAuctionHandler {
    /// Creates a handler over the node's storage and replica.
    #[must_use]
    pub fn new(gateway: Arc<dyn PersistenceGateway>, replica: Arc<LocalReplica>) -> Self {
        Self { gateway, replica }
    }

    /// Records an announced auction.
    ///
    /// A repeated announcement overwrites item, starting price, and seller
    /// but keeps known bids, and never reopens a closed auction.
    pub fn apply_initialize(&self, data: AuctionData) {
        let auction_id = data.auction_id.clone();
        let updated = self.replica.upsert_with(&auction_id, |record| {
            record.item.clone_from(&data.item);
            record.starting_price = data.price;
            record.seller.clone_from(&data.author);
        });

        if updated.is_some() {
            debug!(auction_id = %auction_id, "refreshed announced auction");
        } else {
            info!(auction_id = %auction_id, item = %data.item, seller = %data.author, "learned auction");
            self.replica.upsert(data.into_record());
        }
    }

    /// Appends an announced bid.
    ///
    /// Returns false if the auction is unknown here or no longer open, in
    /// which case the bid is dropped. If this node stores the auction, the
    /// bid is persisted too.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails.
    pub async fn apply_bid(&self, data: BidData) -> MarketResult<bool> {
        let bid = data.into_record();
        let Some(record) = self.replica.get(&bid.auction_id).await? else {
            debug!(auction_id = %bid.auction_id, bidder = %bid.bidder, "dropping bid for unknown auction");
            return Ok(false);
        };
        if !record.is_open() {
            debug!(
                auction_id = %bid.auction_id,
                bidder = %bid.bidder,
                status = %record.status,
                "dropping bid for auction that is not open"
            );
            return Ok(false);
        }

        match self.gateway.fetch_auction(&bid.auction_id).await {
            Ok(_) => {
                self.gateway
                    .insert_bid(BidRow::from_record(&bid, &record.item))
                    .await?;
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }

        debug!(auction_id = %bid.auction_id, bidder = %bid.bidder, amount = %bid.amount, "applied remote bid");
        Ok(self.replica.append_bid(bid))
    }

    /// Closes an auction announced as complete.
    ///
    /// Returns false if the auction is unknown here or already closed.
    ///
    /// # Errors
    ///
    /// Returns an error if storage fails while looking the auction up.
    pub async fn apply_complete(&self, data: CompletionData) -> MarketResult<bool> {
        if self.replica.get(&data.auction_id).await?.is_none() {
            debug!(auction_id = %data.auction_id, "dropping completion for unknown auction");
            return Ok(false);
        }

        let closed = self.replica.mark_closed(&data.auction_id, data.outcome());
        if closed {
            info!(
                auction_id = %data.auction_id,
                winner = %data.highest_bidder,
                price = %data.price,
                "remote auction closed"
            );
        } else {
            debug!(auction_id = %data.auction_id, "completion for auction that is not open");
        }
        Ok(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replica::ReplicaConfig;
    use chrono::{Duration, Utc};
    use peerbid_core::{AuctionId, AuctionOutcome, AuctionRecord, AuctionStatus, Price};
    use peerbid_store::{MemoryGateway, NewAuction};

    fn setup() -> (Arc<MemoryGateway>, Arc<LocalReplica>, InboundAuctionHandler) {
        let gateway = Arc::new(MemoryGateway::new());
        let replica = Arc::new(LocalReplica::new(gateway.clone(), ReplicaConfig::default()));
        let handler = InboundAuctionHandler::new(gateway.clone(), Arc::clone(&replica));
        (gateway, replica, handler)
    }

    fn announcement(id: &AuctionId, item: &str, units: u64) -> AuctionData {
        AuctionData {
            auction_id: id.clone(),
            item: item.into(),
            price: Price::from_units(units),
            author: "alice".into(),
        }
    }

    fn bid(id: &AuctionId, bidder: &str, units: u64) -> BidData {
        BidData {
            auction_id: id.clone(),
            amount: Price::from_units(units),
            bidder: bidder.into(),
            placed_at: Some(Utc::now()),
        }
    }

    #[test]
    fn initialize_creates_open_entry() {
        let (_, replica, handler) = setup();
        let id = AuctionId::generate();
        handler.apply_initialize(announcement(&id, "Vase", 10));

        let record = replica.peek(&id).unwrap();
        assert_eq!(record.status, AuctionStatus::Open);
        assert_eq!(record.seller, "alice");
    }

    #[tokio::test]
    async fn repeated_initialize_keeps_bids_and_closed_status() {
        let (_, replica, handler) = setup();
        let id = AuctionId::generate();
        handler.apply_initialize(announcement(&id, "Vase", 10));
        handler.apply_bid(bid(&id, "bob", 15)).await.unwrap();
        handler
            .apply_complete(CompletionData::new(
                id.clone(),
                &AuctionOutcome {
                    winner: "bob".into(),
                    price: Price::from_units(15),
                },
            ))
            .await
            .unwrap();

        handler.apply_initialize(announcement(&id, "Blue vase", 12));

        let record = replica.peek(&id).unwrap();
        assert_eq!(record.item, "Blue vase");
        assert_eq!(record.starting_price, Price::from_units(12));
        assert_eq!(record.bids.len(), 1);
        assert_eq!(record.status, AuctionStatus::Closed);
    }

    #[tokio::test]
    async fn bids_are_trusted_without_revalidation() {
        let (_, replica, handler) = setup();
        let id = AuctionId::generate();
        handler.apply_initialize(announcement(&id, "Vase", 10));

        assert!(handler.apply_bid(bid(&id, "bob", 20)).await.unwrap());
        assert!(handler.apply_bid(bid(&id, "carol", 12)).await.unwrap());

        let record = replica.peek(&id).unwrap();
        assert_eq!(record.bids.len(), 2);
        assert_eq!(record.leading_bid().unwrap().bidder, "bob");
    }

    #[tokio::test]
    async fn bid_for_unknown_auction_is_dropped() {
        let (gateway, replica, handler) = setup();
        let applied = handler.apply_bid(bid(&AuctionId::generate(), "bob", 20)).await.unwrap();
        assert!(!applied);
        assert!(replica.is_empty());
        assert_eq!(gateway.bid_count(), 0);
    }

    #[tokio::test]
    async fn bids_on_locally_stored_auction_are_persisted() {
        let (gateway, replica, handler) = setup();
        let id = gateway
            .create_auction(NewAuction {
                item: "Vase".into(),
                price: Price::from_units(10),
                seller: "alice".into(),
            })
            .await
            .unwrap();

        assert!(handler.apply_bid(bid(&id, "bob", 15)).await.unwrap());
        assert_eq!(gateway.bid_count(), 1);
        assert_eq!(replica.peek(&id).unwrap().bids.len(), 1);
    }

    #[tokio::test]
    async fn late_bid_after_close_is_dropped() {
        let (gateway, replica, handler) = setup();
        let id = gateway
            .create_auction(NewAuction {
                item: "Vase".into(),
                price: Price::from_units(10),
                seller: "alice".into(),
            })
            .await
            .unwrap();
        handler.apply_bid(bid(&id, "bob", 15)).await.unwrap();
        let outcome = AuctionOutcome {
            winner: "bob".into(),
            price: Price::from_units(15),
        };
        gateway
            .update_status(&id, AuctionStatus::Closed, Some(outcome.clone()))
            .await
            .unwrap();
        replica.mark_closed(&id, outcome.clone());
        gateway.delete_bids(&id).await.unwrap();

        let applied = handler.apply_bid(bid(&id, "mallory", 99)).await.unwrap();

        assert!(!applied);
        assert_eq!(gateway.bid_count(), 0);
        let record = replica.peek(&id).unwrap();
        assert_eq!(record.bids.len(), 1);
        assert_eq!(record.leading_bid().unwrap().bidder, "bob");
        assert_eq!(record.outcome, Some(outcome));
    }

    #[tokio::test]
    async fn remote_only_bids_are_not_persisted() {
        let (gateway, _, handler) = setup();
        let id = AuctionId::generate();
        handler.apply_initialize(announcement(&id, "Vase", 10));
        handler.apply_bid(bid(&id, "bob", 15)).await.unwrap();
        assert_eq!(gateway.bid_count(), 0);
    }

    #[tokio::test]
    async fn missing_timestamp_is_stamped_on_receipt() {
        let (_, replica, handler) = setup();
        let id = AuctionId::generate();
        handler.apply_initialize(announcement(&id, "Vase", 10));
        let before = Utc::now() - Duration::seconds(1);

        let mut data = bid(&id, "bob", 15);
        data.placed_at = None;
        handler.apply_bid(data).await.unwrap();

        let record = replica.peek(&id).unwrap();
        assert!(record.bids[0].placed_at > before);
    }

    #[tokio::test]
    async fn complete_for_unknown_auction_is_dropped() {
        let (_, _, handler) = setup();
        let data = CompletionData::new(
            AuctionId::generate(),
            &AuctionOutcome {
                winner: "bob".into(),
                price: Price::from_units(15),
            },
        );
        assert!(!handler.apply_complete(data).await.unwrap());
    }

    #[tokio::test]
    async fn complete_closes_cached_auction() {
        let (_, replica, handler) = setup();
        let record = AuctionRecord::open(AuctionId::generate(), "Vase", Price::from_units(10), "alice");
        replica.upsert(record.clone());
        let outcome = AuctionOutcome {
            winner: "bob".into(),
            price: Price::from_units(15),
        };

        let closed = handler
            .apply_complete(CompletionData::new(record.auction_id.clone(), &outcome))
            .await
            .unwrap();
        assert!(closed);
        assert_eq!(replica.peek(&record.auction_id).unwrap().outcome, Some(outcome));
    }
}
