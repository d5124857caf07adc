//! Per-node cached view of auction state.
//!
//! The replica merges two sources: rows read back from the persistence
//! gateway on a cache miss, and mutations applied directly by the local
//! coordinator or by inbound broadcasts. Entries expire after a TTL; an
//! expired entry is refetched from storage on the next [`LocalReplica::get`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use peerbid_core::{AuctionId, AuctionOutcome, AuctionRecord, BidRecord};
use peerbid_store::PersistenceGateway;
use tokio::time::Instant;
use tracing::debug;

use crate::error::MarketResult;

/// Default entry lifetime: 24 hours.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Configuration for [`LocalReplica`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicaConfig {
    /// How long an entry stays valid after its last write.
    pub ttl: Duration,
}

impl ReplicaConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ttl: DEFAULT_CACHE_TTL,
        }
    }

    /// Set the entry lifetime.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
struct Entry {
    record: AuctionRecord,
    expires_at: Instant,
    seq: u64,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Default)]
struct Cache {
    entries: HashMap<AuctionId, Entry>,
    next_seq: u64,
}

/// TTL cache of merged auction snapshots backed by a persistence gateway.
pub struct LocalReplica {
    gateway: Arc<dyn PersistenceGateway>,
    config: ReplicaConfig,
    cache: RwLock<Cache>,
}

impl std::fmt::Debug for LocalReplica {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalReplica")
            .field("config", &self.config)
            .field("entries", &self.cache.read().entries.len())
            .finish_non_exhaustive()
    }
}

impl LocalReplica {
    /// Creates an empty replica.
    #[must_use]
    pub fn new(gateway: Arc<dyn PersistenceGateway>, config: ReplicaConfig) -> Self {
        Self {
            gateway,
            config,
            cache: RwLock::new(Cache::default()),
        }
    }

    /// Looks an auction up, falling back to storage on a miss.
    ///
    /// A miss loads the auction row and its bid history and caches the
    /// merged record. Returns `None` if storage does not know the auction.
    pub async fn get(&self, auction_id: &AuctionId) -> MarketResult<Option<AuctionRecord>> {
        if let Some(record) = self.peek(auction_id) {
            return Ok(Some(record));
        }

        let row = match self.gateway.fetch_auction(auction_id).await {
            Ok(row) => row,
            Err(e) if e.is_not_found() => {
                debug!(auction_id = %auction_id, "auction unknown to storage");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        let bids = self.gateway.fetch_bids(auction_id).await?;
        let record = row.into_record(bids);

        debug!(auction_id = %auction_id, bids = record.bids.len(), "replica filled from storage");
        self.upsert(record.clone());
        Ok(Some(record))
    }

    /// Cache-only lookup.
    #[must_use]
    pub fn peek(&self, auction_id: &AuctionId) -> Option<AuctionRecord> {
        let now = Instant::now();
        self.cache
            .read()
            .entries
            .get(auction_id)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.record.clone())
    }

    /// Lists auctions.
    ///
    /// Returns the live cached entries in insertion order. If there are
    /// none, scans storage instead; those records carry no bids and are
    /// not cached.
    pub async fn list_all(&self) -> MarketResult<Vec<AuctionRecord>> {
        let now = Instant::now();
        let mut live: Vec<(u64, AuctionRecord)> = self
            .cache
            .read()
            .entries
            .values()
            .filter(|entry| entry.is_live(now))
            .map(|entry| (entry.seq, entry.record.clone()))
            .collect();

        if !live.is_empty() {
            live.sort_by_key(|(seq, _)| *seq);
            return Ok(live.into_iter().map(|(_, record)| record).collect());
        }

        let rows = self.gateway.fetch_all_auctions().await?;
        debug!(count = rows.len(), "listing auctions from storage");
        Ok(rows.into_iter().map(AuctionRecord::from).collect())
    }

    /// Inserts or replaces a record and restarts its TTL.
    pub fn upsert(&self, record: AuctionRecord) {
        let expires_at = Instant::now() + self.config.ttl;
        let mut cache = self.cache.write();
        let seq = match cache.entries.get(&record.auction_id) {
            Some(existing) => existing.seq,
            None => {
                cache.next_seq += 1;
                cache.next_seq
            }
        };
        cache.entries.insert(
            record.auction_id.clone(),
            Entry {
                record,
                expires_at,
                seq,
            },
        );
    }

    /// Applies `f` to a live entry and restarts its TTL.
    ///
    /// Returns the updated record, or `None` if the entry is absent or
    /// expired.
    pub fn upsert_with<F>(&self, auction_id: &AuctionId, f: F) -> Option<AuctionRecord>
    where
        F: FnOnce(&mut AuctionRecord),
    {
        let now = Instant::now();
        let mut cache = self.cache.write();
        let entry = cache
            .entries
            .get_mut(auction_id)
            .filter(|entry| entry.is_live(now))?;
        f(&mut entry.record);
        entry.expires_at = now + self.config.ttl;
        Some(entry.record.clone())
    }

    /// Appends a bid to its cached auction. Returns false if not cached.
    pub fn append_bid(&self, bid: BidRecord) -> bool {
        let auction_id = bid.auction_id.clone();
        self.upsert_with(&auction_id, move |record| record.bids.push(bid))
            .is_some()
    }

    /// Closes a cached auction. Returns false if it is not cached or not
    /// open.
    pub fn mark_closed(&self, auction_id: &AuctionId, outcome: AuctionOutcome) -> bool {
        let mut closed = false;
        self.upsert_with(auction_id, |record| closed = record.close(outcome));
        closed
    }

    /// Drops expired entries and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut cache = self.cache.write();
        let before = cache.entries.len();
        cache.entries.retain(|_, entry| entry.is_live(now));
        before - cache.entries.len()
    }

    /// Number of cached entries, expired ones included until purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cache.read().entries.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cache.read().entries.is_empty()
    }
}
