//! # peerbid-store
//!
//! Persistence gateway for the PeerBid auction network.
//!
//! The rest of the node only talks to storage through [`PersistenceGateway`].
//! Two implementations ship here:
//!
//! - [`MemoryGateway`]: everything in memory, used by tests and ephemeral nodes
//! - [`JsonFileGateway`]: write-through JSON file under a data directory
//!
//! Rows ([`AuctionRow`], [`BidRow`]) follow the stored layout and convert to
//! the domain records of `peerbid-core` through explicit functions.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod gateway;
pub mod json;
pub mod memory;
pub mod records;

pub use error::{StoreError, StoreResult};
pub use gateway::{BoxFuture, PersistenceGateway};
pub use json::{JsonFileGateway, STORE_FILE_NAME};
pub use memory::MemoryGateway;
pub use records::{
    status_from_code, status_to_code, AuctionRow, BidRow, NewAuction, STATUS_CLOSED, STATUS_OPEN,
    STATUS_UNKNOWN,
};
