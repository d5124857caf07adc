//! Gateway backed by a single JSON file.
//!
//! Every mutation rewrites the whole file through a temporary sibling and a
//! rename, so a crash mid-write leaves the previous contents intact.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use peerbid_core::{AuctionId, AuctionOutcome, AuctionStatus};
use tracing::{debug, info};

use crate::error::StoreResult;
use crate::gateway::{BoxFuture, PersistenceGateway};
use crate::memory::Tables;
use crate::records::{AuctionRow, BidRow, NewAuction};

/// File name used inside the data directory.
pub const STORE_FILE_NAME: &str = "peerbid.json";

/// Write-through gateway persisting to `<data_dir>/peerbid.json`.
#[derive(Debug)]
pub struct JsonFileGateway {
    path: PathBuf,
    tables: Mutex<Tables>,
}

impl JsonFileGateway {
    /// Opens the store in `data_dir`, creating the directory if needed.
    ///
    /// A missing file starts an empty store.
    pub fn open(data_dir: impl AsRef<Path>) -> StoreResult<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)?;
        let path = data_dir.join(STORE_FILE_NAME);

        let tables = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                Tables::default()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            Tables::default()
        };

        info!(path = %path.display(), "opened auction store");
        Ok(Self {
            path,
            tables: Mutex::new(tables),
        })
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies a mutation and persists the result.
    ///
    /// The in-memory tables are only replaced once the file write succeeds.
    fn mutate<T>(&self, f: impl FnOnce(&mut Tables) -> StoreResult<T>) -> StoreResult<T> {
        let mut guard = self.tables.lock();
        let mut next = guard.clone();
        let value = f(&mut next)?;
        self.write(&next)?;
        *guard = next;
        Ok(value)
    }

    fn write(&self, tables: &Tables) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(tables)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "flushed auction store");
        Ok(())
    }
}

impl PersistenceGateway for JsonFileGateway {
    fn create_auction(&self, auction: NewAuction) -> BoxFuture<'_, StoreResult<AuctionId>> {
        Box::pin(async move { self.mutate(|t| Ok(t.create_auction(auction))) })
    }

    fn insert_bid(&self, bid: BidRow) -> BoxFuture<'_, StoreResult<()>> {
        Box::pin(async move {
            self.mutate(|t| {
                t.insert_bid(bid);
                Ok(())
            })
        })
    }

    fn fetch_auction<'a>(
        &'a self,
        auction_id: &'a AuctionId,
    ) -> BoxFuture<'a, StoreResult<AuctionRow>> {
        Box::pin(async move { self.tables.lock().auction(auction_id) })
    }

    fn fetch_all_auctions(&self) -> BoxFuture<'_, StoreResult<Vec<AuctionRow>>> {
        Box::pin(async move { Ok(self.tables.lock().auctions()) })
    }

    fn fetch_bids<'a>(&'a self, auction_id: &'a AuctionId) -> BoxFuture<'a, StoreResult<Vec<BidRow>>> {
        Box::pin(async move { Ok(self.tables.lock().bids(auction_id)) })
    }

    fn fetch_highest_bid<'a>(
        &'a self,
        auction_id: &'a AuctionId,
    ) -> BoxFuture<'a, StoreResult<Option<BidRow>>> {
        Box::pin(async move { Ok(self.tables.lock().highest_bid(auction_id)) })
    }

    fn update_status<'a>(
        &'a self,
        auction_id: &'a AuctionId,
        status: AuctionStatus,
        outcome: Option<AuctionOutcome>,
    ) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move { self.mutate(|t| t.update_status(auction_id, status, outcome)) })
    }

    fn delete_auction<'a>(&'a self, auction_id: &'a AuctionId) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move { self.mutate(|t| t.delete_auction(auction_id)) })
    }

    fn delete_bids<'a>(&'a self, auction_id: &'a AuctionId) -> BoxFuture<'a, StoreResult<usize>> {
        Box::pin(async move { self.mutate(|t| Ok(t.delete_bids(auction_id))) })
    }
}
